//! The simulation state and the fixed-step tick.
//!
//! `SimulationData` uniquely owns every entity. All outside access goes
//! through [`Simulation::data`], a scoped lock that blocks until the data is
//! ready; cross-entity references are only valid while the accessor guard is
//! held.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};

use crate::collision;
use crate::creature::Creature;
use crate::creature_manager;
use crate::egg::Egg;
use crate::environment::Environment;
use crate::error::SimError;
use crate::food::Food;
use crate::food_manager;
use crate::grid::EntityGrid;
use crate::pheromone::Pheromone;
use crate::stats::Statistics;

use rayon::prelude::*;

pub struct SimulationData {
    pub environment: Environment,
    pub creatures: Vec<Creature>,
    pub food: Vec<Food>,
    pub eggs: Vec<Egg>,
    pub pheromones: Vec<Pheromone>,
    /// Pending fathers, by entity ID.
    pub reproduce: VecDeque<u64>,
    /// Pending mothers, by entity ID.
    pub new_reproduce: VecDeque<u64>,
    pub world_time: f64,
    pub statistics: Statistics,
}

impl SimulationData {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            creatures: Vec::new(),
            food: Vec::new(),
            eggs: Vec::new(),
            pheromones: Vec::new(),
            reproduce: VecDeque::new(),
            new_reproduce: VecDeque::new(),
            world_time: 0.0,
            statistics: Statistics::default(),
        }
    }
}

struct Guarded {
    ready: bool,
    data: SimulationData,
}

/// Scoped access to the simulation state: construction acquires the lock and
/// waits for `data_ready`, destruction releases it.
pub struct DataAccessor<'a> {
    guard: MutexGuard<'a, Guarded>,
}

impl Deref for DataAccessor<'_> {
    type Target = SimulationData;

    fn deref(&self) -> &SimulationData {
        &self.guard.data
    }
}

impl DerefMut for DataAccessor<'_> {
    fn deref_mut(&mut self) -> &mut SimulationData {
        &mut self.guard.data
    }
}

pub struct Simulation {
    guarded: Mutex<Guarded>,
    data_ready: Condvar,
    grid: Mutex<EntityGrid>,
    running: AtomicBool,
}

impl Simulation {
    pub fn new(environment: Environment) -> Self {
        let grid = EntityGrid::for_map(environment.width(), environment.height());
        Self {
            guarded: Mutex::new(Guarded {
                ready: false,
                data: SimulationData::new(environment),
            }),
            data_ready: Condvar::new(),
            grid: Mutex::new(grid),
            running: AtomicBool::new(true),
        }
    }

    /// Populate the world and open the accessor gate.
    pub fn start(&self) {
        let mut guard = self.guarded.lock().expect("simulation lock poisoned");
        food_manager::initialize_food(&mut guard.data);
        creature_manager::initialize_creatures(&mut guard.data);
        self.grid
            .lock()
            .expect("grid lock poisoned")
            .refresh(&mut guard.data);
        guard.ready = true;
        self.data_ready.notify_all();
    }

    /// Variable-rate hook driven by the engine between fixed steps. All
    /// simulation state advances in `fixed_update`.
    pub fn update(&self, _dt: f64) {}

    /// One fixed tick: food spawn/aging, grid rebuild, the parallel creature
    /// phase, hatching, reproduction pairing and the collision pass, in that
    /// order, each phase quiescing before the next begins.
    pub fn fixed_update(&self, dt: f64) -> Result<(), SimError> {
        let mut accessor = self.data();
        let data = &mut *accessor;

        food_manager::generate_more_food(data, dt);
        food_manager::update_all_food(data, dt);
        data.pheromones.par_iter_mut().for_each(|p| p.update(dt));

        let mut grid = self.grid.lock().expect("grid lock poisoned");
        grid.refresh(data);

        creature_manager::update_all_creatures(data, &grid, dt);
        creature_manager::hatch_eggs(data)?;
        creature_manager::reproduce_creatures(data)?;
        collision::check_collisions(data, &grid);

        data.world_time += dt;
        let world_time = data.world_time;
        let SimulationData {
            statistics,
            creatures,
            ..
        } = data;
        statistics.record(world_time, creatures);
        Ok(())
    }

    /// Scoped, blocking access to the simulation data.
    pub fn data(&self) -> DataAccessor<'_> {
        let mut guard = self.guarded.lock().expect("simulation lock poisoned");
        while !guard.ready {
            guard = self
                .data_ready
                .wait(guard)
                .expect("simulation lock poisoned");
        }
        DataAccessor { guard }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
