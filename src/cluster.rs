//! Species clustering: DBSCAN over the combined genome/trait compatibility
//! distance, maintained incrementally between full recluster passes and
//! driven by its own thread on its own cadence.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::settings;
use crate::creature::Creature;
use crate::mutable::Mutable;
use crate::neat::Genome;
use crate::simulation::Simulation;

/// Label for unclassified points.
pub const NOISE: u32 = 0;

#[derive(Clone, Debug)]
pub struct CreaturePoint {
    pub genome: Genome,
    pub mutable: Mutable,
    pub alive: bool,
    pub hue: f64,
}

impl CreaturePoint {
    pub fn of(creature: &Creature) -> Self {
        Self {
            genome: creature.genome.clone(),
            mutable: creature.mutable.clone(),
            alive: creature.core.is_alive(),
            hue: creature.core.color,
        }
    }

    fn distance(&self, other: &CreaturePoint) -> f64 {
        self.genome.compatibility(&other.genome) + self.mutable.compatibility(&other.mutable)
    }
}

#[derive(Default)]
struct ClusterState {
    points: HashMap<u64, CreaturePoint>,
    species: HashMap<u64, u32>,
    core_points: Vec<u64>,
    species_colors: HashMap<u32, f64>,
    sync_passes: u64,
}

pub struct SpeciesCluster {
    epsilon: f64,
    min_pts: usize,
    state: Mutex<ClusterState>,
}

impl SpeciesCluster {
    pub fn new(epsilon: f64, min_pts: usize) -> Self {
        Self {
            epsilon,
            min_pts,
            state: Mutex::new(ClusterState::default()),
        }
    }

    /// The production configuration: epsilon is the mating compatibility
    /// threshold, a species needs at least ten dense members.
    pub fn with_settings() -> Self {
        Self::new(settings().compatibility.compatibility_threshold, 10)
    }

    /// Copy the population in and run one full DBSCAN pass.
    pub fn init(&self, creatures: &[Creature]) {
        let mut state = self.state.lock().expect("cluster lock poisoned");
        state.points = creatures
            .iter()
            .map(|c| (c.core.id, CreaturePoint::of(c)))
            .collect();
        self.dbscan(&mut state);
    }

    /// Assign each newborn the label of the first core point within epsilon,
    /// or noise when none matches.
    pub fn add_newborns(&self, newborns: &[Creature]) {
        let points: Vec<(u64, CreaturePoint)> = newborns
            .iter()
            .map(|c| (c.core.id, CreaturePoint::of(c)))
            .collect();
        self.add_newborn_points(points);
    }

    fn add_newborn_points(&self, newborns: Vec<(u64, CreaturePoint)>) {
        let mut state = self.state.lock().expect("cluster lock poisoned");
        for (id, point) in newborns {
            let label = state
                .core_points
                .iter()
                .find(|&&core_id| {
                    state
                        .points
                        .get(&core_id)
                        .is_some_and(|core| core.distance(&point) <= self.epsilon)
                })
                .and_then(|core_id| state.species.get(core_id).copied())
                .unwrap_or(NOISE);
            state.species.insert(id, label);
            state.points.insert(id, point);
        }
    }

    /// Mark creatures dead; their points are retained so later newborns can
    /// still inherit the species labels.
    pub fn update_dead_creatures(&self, dead_ids: &[u64]) {
        let mut state = self.state.lock().expect("cluster lock poisoned");
        for id in dead_ids {
            if let Some(point) = state.points.get_mut(id) {
                point.alive = false;
            }
        }
    }

    /// Re-run DBSCAN over every retained point.
    pub fn recluster(&self) {
        let mut state = self.state.lock().expect("cluster lock poisoned");
        self.dbscan(&mut state);
    }

    /// Alive member counts per label.
    pub fn species_sizes(&self) -> HashMap<u32, usize> {
        let state = self.state.lock().expect("cluster lock poisoned");
        let mut sizes = HashMap::new();
        for (id, label) in &state.species {
            if state.points.get(id).map(|p| p.alive).unwrap_or(false) {
                *sizes.entry(*label).or_insert(0) += 1;
            }
        }
        sizes
    }

    pub fn label_of(&self, id: u64) -> Option<u32> {
        self.state
            .lock()
            .expect("cluster lock poisoned")
            .species
            .get(&id)
            .copied()
    }

    pub fn species_color(&self, label: u32) -> Option<f64> {
        self.state
            .lock()
            .expect("cluster lock poisoned")
            .species_colors
            .get(&label)
            .copied()
    }

    fn neighbors_of(&self, state: &ClusterState, id: u64) -> Vec<u64> {
        let Some(point) = state.points.get(&id) else {
            return Vec::new();
        };
        state
            .points
            .iter()
            .filter(|(_, other)| point.distance(other) <= self.epsilon)
            .map(|(other_id, _)| *other_id)
            .collect()
    }

    fn dbscan(&self, state: &mut ClusterState) {
        state.species.clear();
        state.core_points.clear();
        state.species_colors.clear();

        // deterministic point order regardless of hash state
        let mut ids: Vec<u64> = state.points.keys().copied().collect();
        ids.sort_unstable();

        let mut next_label = NOISE;
        for id in ids {
            if state.species.contains_key(&id) {
                continue;
            }
            let neighbors = self.neighbors_of(state, id);
            if neighbors.len() < self.min_pts {
                state.species.insert(id, NOISE);
                continue;
            }
            next_label += 1;
            let hue = state.points[&id].hue;
            state.species_colors.insert(next_label, hue);
            self.expand_cluster(state, id, neighbors, next_label);
        }
    }

    fn expand_cluster(
        &self,
        state: &mut ClusterState,
        seed: u64,
        mut frontier: Vec<u64>,
        label: u32,
    ) {
        state.species.insert(seed, label);
        state.core_points.push(seed);

        let mut cursor = 0;
        while cursor < frontier.len() {
            let neighbor = frontier[cursor];
            cursor += 1;

            match state.species.get(&neighbor).copied() {
                Some(NOISE) => {
                    // a border point of this species, previously dismissed
                    state.species.insert(neighbor, label);
                }
                Some(_) => {}
                None => {
                    state.species.insert(neighbor, label);
                    let reachable = self.neighbors_of(state, neighbor);
                    if reachable.len() >= self.min_pts {
                        state.core_points.push(neighbor);
                        frontier.extend(reachable);
                    }
                }
            }
        }
    }

    /// Reconcile the cluster against the live simulation: pull a brief
    /// snapshot under the accessor, then fold the diff in under the
    /// cluster's own lock. Every few passes a full recluster runs.
    pub fn sync(&self, simulation: &Simulation) {
        let known: std::collections::HashSet<u64> = {
            let state = self.state.lock().expect("cluster lock poisoned");
            state.points.keys().copied().collect()
        };

        let (newborns, live_ids) = {
            let data = simulation.data();
            let newborns: Vec<(u64, CreaturePoint)> = data
                .creatures
                .iter()
                .filter(|c| !known.contains(&c.core.id))
                .map(|c| (c.core.id, CreaturePoint::of(c)))
                .collect();
            let live_ids: std::collections::HashSet<u64> =
                data.creatures.iter().map(|c| c.core.id).collect();
            (newborns, live_ids)
        };

        let dead: Vec<u64> = known
            .iter()
            .filter(|id| !live_ids.contains(id))
            .copied()
            .collect();

        self.add_newborn_points(newborns);
        self.update_dead_creatures(&dead);

        let recluster_due = {
            let mut state = self.state.lock().expect("cluster lock poisoned");
            state.sync_passes += 1;
            state.sync_passes % 8 == 0
        };
        if recluster_due {
            self.recluster();
        }
    }

    /// Run on the cluster's own cadence until the stop flag drops.
    pub fn run(
        self: Arc<Self>,
        simulation: Arc<Simulation>,
        running: Arc<AtomicBool>,
    ) -> std::thread::JoinHandle<()> {
        std::thread::spawn(move || {
            log::info!("species cluster thread started");
            while running.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(250));
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                self.sync(&simulation);
            }
            log::info!("species cluster thread stopped");
        })
    }
}
