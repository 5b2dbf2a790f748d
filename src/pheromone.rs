//! Pheromone entities and the creature-side emission/detection machinery.
//! Sixteen chemical channels exist; a creature interacts only with the
//! channels its genome has bound through pheromone brain modules.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::config::settings;
use crate::entity::{EntityCore, EntityKind};
use crate::geometry;
use crate::grid::EntityGrid;
use crate::neat::{Genome, MODULE_PHEROMONE, PHEROMONE_CHANNELS};
use crate::random;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pheromone {
    pub core: EntityCore,
    pub channel: u32,
    pub age: f64,
}

impl Pheromone {
    pub fn new(channel: u32, position: DVec2, size: f64) -> Self {
        Self {
            core: EntityCore::new(position, size.max(0.1)),
            channel,
            age: 0.0,
        }
    }

    pub fn update(&mut self, dt: f64) {
        if !self.core.is_alive() {
            return;
        }
        self.age += dt;
        if self.age > settings().environment.default_lifespan {
            self.core.die();
        }
    }
}

/// Per-creature pheromone interface: which channels the genome listens and
/// talks on, the detected densities, and the emission drive set by the brain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PheromoneSystem {
    pub densities: Vec<f64>,
    pub emissions: Vec<f64>,
    pub active_channels: Vec<bool>,
}

impl PheromoneSystem {
    pub fn new(genome: &Genome) -> Self {
        let mut active_channels = vec![false; PHEROMONE_CHANNELS];
        for module in genome.modules() {
            if module.module_id == MODULE_PHEROMONE {
                active_channels[module.channel as usize % PHEROMONE_CHANNELS] = true;
            }
        }
        Self {
            densities: vec![0.0; PHEROMONE_CHANNELS],
            emissions: vec![0.0; PHEROMONE_CHANNELS],
            active_channels,
        }
    }

    pub fn has_active_channel(&self) -> bool {
        self.active_channels.iter().any(|&active| active)
    }

    /// Sum `distance * size * sensitivity` over nearby pheromones on active
    /// channels. The reach scales with the creature's own size in grid cells.
    pub fn detect(
        &mut self,
        core: &EntityCore,
        grid: &EntityGrid,
        pheromones: &[Pheromone],
        width: f64,
        height: f64,
    ) {
        self.densities.iter_mut().for_each(|d| *d = 0.0);
        if !self.has_active_channel() {
            return;
        }

        let sensitivity = settings().physical_constraints.pheromone_detection_sensitivity;
        let reach = (core.size / grid.cell_size()).floor() as i32;
        let center = grid.cell_of(core.position);

        for cell in grid.neighbors(center, reach) {
            for entry in grid.entities_at(cell) {
                if entry.kind != EntityKind::Pheromone {
                    continue;
                }
                let Some(pheromone) = pheromones.get(entry.index as usize) else {
                    continue;
                };
                let channel = pheromone.channel as usize % PHEROMONE_CHANNELS;
                if !self.active_channels[channel] {
                    continue;
                }
                let distance = geometry::toroidal_distance(
                    core.position,
                    pheromone.core.position,
                    width,
                    height,
                );
                self.densities[channel] += distance * pheromone.core.size * sensitivity;
            }
        }
    }

    /// Probabilistically shed pheromone entities for every driven channel.
    /// The deposit lands scattered around the body and its size grows with
    /// the square root of the emitter's.
    pub fn emit(&self, core: &EntityCore, dt: f64) -> Vec<Pheromone> {
        let d_emission = settings().physical_constraints.d_pheromone_emission;
        let mut emitted = Vec::new();
        for (channel, &drive) in self.emissions.iter().enumerate() {
            if drive <= 0.0 {
                continue;
            }
            if random::bernoulli(drive * core.size * d_emission * dt) {
                let offset = DVec2::new(
                    random::normal(0.0, 1.0) * core.size,
                    random::normal(0.0, 1.0) * core.size,
                );
                emitted.push(Pheromone::new(
                    channel as u32,
                    core.position + offset,
                    core.size.sqrt(),
                ));
            }
        }
        emitted
    }
}
