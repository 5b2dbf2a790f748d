//! Eggs: the externalized tail end of gestation.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::creature::Creature;
use crate::entity::{EntityCore, Motion};
use crate::error::SimError;
use crate::mutable::Mutable;
use crate::neat::Genome;

/// The offspring being gestated: a finished genome and trait vector plus the
/// incubation clock. Lives inside the mother until birth, then inside an
/// [`Egg`] entity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GestatingEgg {
    pub genome: Genome,
    pub mutable: Mutable,
    pub generation: u32,
    pub age: f64,
    pub incubation_time: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Egg {
    pub core: EntityCore,
    pub motion: Motion,
    pub gestating: GestatingEgg,
    pub health: f64,
    pub nutritional_value: f64,
}

impl Egg {
    pub fn new(gestating: GestatingEgg, position: DVec2) -> Self {
        let mut core = EntityCore::new(position, 1.0);
        core.color = gestating.mutable.color;
        let health = gestating.mutable.integrity * gestating.mutable.baby_size.powi(2);
        let nutritional_value = crate::config::settings().environment.egg_nutritional_value;

        let mut egg = Self {
            core,
            motion: Motion::default(),
            gestating,
            health,
            nutritional_value,
        };
        egg.refresh_size();
        egg
    }

    /// While incubating the shell grows towards the hatchling's size.
    fn refresh_size(&mut self) {
        let progress = if self.gestating.incubation_time > 0.0 {
            (self.gestating.age / self.gestating.incubation_time).min(1.0)
        } else {
            1.0
        };
        self.core.size = (0.5 + progress) * self.gestating.mutable.baby_size;
    }

    pub fn update(&mut self, dt: f64) {
        if !self.core.is_alive() {
            return;
        }
        self.gestating.age += dt;
        self.refresh_size();
    }

    pub fn incubation_time(&self) -> f64 {
        self.gestating.incubation_time
    }

    pub fn age(&self) -> f64 {
        self.gestating.age
    }

    pub fn ready_to_hatch(&self) -> bool {
        self.core.is_alive() && self.gestating.age >= self.gestating.incubation_time
    }

    /// Crack the shell without hatching; the egg dies.
    pub fn break_open(&mut self) {
        self.core.die();
    }

    /// Hatch into a creature at the egg's position. Hatching a dead egg or
    /// one that has not finished incubating is an invariant breach.
    pub fn hatch(&mut self) -> Result<Creature, SimError> {
        if !self.core.is_alive() {
            return Err(SimError::HatchDeadEgg);
        }
        if self.gestating.age < self.gestating.incubation_time {
            return Err(SimError::HatchNotIncubated);
        }

        let mut creature = Creature::new(
            self.gestating.genome.clone(),
            self.gestating.mutable.clone(),
            self.core.position,
        );
        creature.generation = self.gestating.generation;
        self.core.die();
        Ok(creature)
    }
}
