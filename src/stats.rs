//! Aggregate population statistics, sampled on world time.

use serde::{Deserialize, Serialize};

use crate::creature::Creature;

/// Per-metric time series appended once per second of world time.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Statistics {
    last_recorded: f64,
    pub sampled_at: Vec<f64>,
    pub creature_count: Vec<usize>,
    pub mean_size: Vec<f64>,
    pub mean_energy: Vec<f64>,
    pub mean_velocity: Vec<f64>,
    pub mean_diet: Vec<f64>,
    pub mean_offspring: Vec<f64>,
}

const SAMPLE_INTERVAL: f64 = 1.0;

impl Statistics {
    pub fn record(&mut self, world_time: f64, creatures: &[Creature]) {
        if world_time - self.last_recorded < SAMPLE_INTERVAL && !self.sampled_at.is_empty() {
            return;
        }
        self.last_recorded = world_time;

        let count = creatures.len();
        let inv = if count > 0 { 1.0 / count as f64 } else { 0.0 };
        let mut size = 0.0;
        let mut energy = 0.0;
        let mut velocity = 0.0;
        let mut diet = 0.0;
        let mut offspring = 0.0;
        for creature in creatures {
            size += creature.core.size;
            energy += creature.energy;
            velocity += creature.motion.velocity;
            diet += creature.mutable.diet;
            offspring += (creature.male.state.offspring_number
                + creature.female.state.offspring_number) as f64;
        }

        self.sampled_at.push(world_time);
        self.creature_count.push(count);
        self.mean_size.push(size * inv);
        self.mean_energy.push(energy * inv);
        self.mean_velocity.push(velocity * inv);
        self.mean_diet.push(diet * inv);
        self.mean_offspring.push(offspring * inv);
    }

    pub fn len(&self) -> usize {
        self.sampled_at.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sampled_at.is_empty()
    }
}
