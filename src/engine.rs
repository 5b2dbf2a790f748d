//! The real-time driver: measures elapsed wall time, scales it by the speed
//! factor, and drains it into fixed-length simulation steps. The species
//! cluster runs beside it on its own thread.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cluster::SpeciesCluster;
use crate::config::settings;
use crate::environment::Environment;
use crate::error::SimError;
use crate::random;
use crate::simulation::Simulation;

/// Longest stretch of scaled time a single engine cycle may consume; keeps a
/// stalled process from spiralling into a catch-up storm.
const MAX_CYCLE_DELTA: f64 = 0.05;

pub struct Engine {
    simulation: Arc<Simulation>,
    cluster: Arc<SpeciesCluster>,
    running: Arc<AtomicBool>,
    paused: AtomicBool,
    /// Speed multiplier, stored as f64 bits.
    speed: AtomicU64,
}

impl Engine {
    pub fn new(width: f64, height: f64) -> Self {
        Self::build(Environment::new(width, height))
    }

    pub fn with_densities(
        width: f64,
        height: f64,
        food_density: f64,
        creature_density: f64,
    ) -> Self {
        Self::build(Environment::with_densities(
            width,
            height,
            food_density,
            creature_density,
        ))
    }

    fn build(environment: Environment) -> Self {
        let seed = if settings().random.input_seed {
            settings().random.seed
        } else {
            rand::random()
        };
        random::set_seed(seed);
        log::info!("simulation seed: {seed}");

        Self {
            simulation: Arc::new(Simulation::new(environment)),
            cluster: Arc::new(SpeciesCluster::with_settings()),
            running: Arc::new(AtomicBool::new(false)),
            paused: AtomicBool::new(false),
            speed: AtomicU64::new(1.0f64.to_bits()),
        }
    }

    /// Block and drive the simulation until [`Engine::stop`]. Returns the
    /// reason when a fatal invariant violation ends the run early.
    pub fn run(&self) -> Result<(), SimError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.simulation.start();
        self.cluster.init(&self.simulation.data().creatures);
        let cluster_handle = Arc::clone(&self.cluster).run(
            Arc::clone(&self.simulation),
            Arc::clone(&self.running),
        );

        let fixed_interval = settings().engine.fixed_update_interval;
        let mut last_update = Instant::now();
        let mut pending = 0.0f64;

        let result = loop {
            if !self.running.load(Ordering::SeqCst) {
                break Ok(());
            }
            if self.is_paused() {
                std::thread::sleep(Duration::from_millis(1));
                last_update = Instant::now();
                continue;
            }

            let now = Instant::now();
            let mut delta = now.duration_since(last_update).as_secs_f64() * self.get_speed();
            if delta > MAX_CYCLE_DELTA {
                delta = MAX_CYCLE_DELTA;
            }
            last_update = now;
            pending += delta;

            self.simulation.update(delta);

            let mut faulted = None;
            while pending >= fixed_interval {
                if !self.running.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(e) = self.simulation.fixed_update(fixed_interval) {
                    faulted = Some(e);
                    break;
                }
                pending -= fixed_interval;
            }
            if let Some(e) = faulted {
                log::error!("fatal simulation error, stopping engine: {e}");
                break Err(e);
            }

            std::thread::sleep(Duration::from_millis(1));
        };

        self.running.store(false, Ordering::SeqCst);
        self.simulation.stop();
        if cluster_handle.join().is_err() {
            log::warn!("species cluster thread panicked");
        }
        result
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn set_speed(&self, speed: f64) {
        self.speed.store(speed.max(0.0).to_bits(), Ordering::SeqCst);
    }

    pub fn get_speed(&self) -> f64 {
        f64::from_bits(self.speed.load(Ordering::SeqCst))
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    pub fn cluster(&self) -> &SpeciesCluster {
        &self.cluster
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_is_clamped_to_nonnegative() {
        let engine = Engine::with_densities(200.0, 200.0, 0.0, 0.0);
        assert_eq!(engine.get_speed(), 1.0);
        engine.set_speed(-3.0);
        assert_eq!(engine.get_speed(), 0.0);
        engine.set_speed(4.0);
        assert_eq!(engine.get_speed(), 4.0);
    }

    #[test]
    fn pause_and_resume_toggle_the_flag() {
        let engine = Engine::with_densities(200.0, 200.0, 0.0, 0.0);
        assert!(!engine.is_paused());
        engine.pause();
        assert!(engine.is_paused());
        engine.resume();
        assert!(!engine.is_paused());
    }

    #[test]
    fn run_advances_world_time_until_stopped() {
        let engine = Arc::new(Engine::with_densities(200.0, 200.0, 0.0, 0.0));
        let runner = {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || engine.run())
        };

        std::thread::sleep(Duration::from_millis(400));
        engine.stop();
        runner.join().unwrap().unwrap();

        let world_time = engine.simulation().data().world_time;
        assert!(world_time > 0.0);
    }

    #[test]
    fn paused_engine_does_not_advance_world_time() {
        let engine = Arc::new(Engine::with_densities(200.0, 200.0, 0.0, 0.0));
        engine.pause();
        let runner = {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || engine.run())
        };

        std::thread::sleep(Duration::from_millis(250));
        let frozen = engine.simulation().data().world_time;
        engine.stop();
        runner.join().unwrap().unwrap();

        assert_eq!(frozen, 0.0);
    }
}
