//! Stomach state for creatures. The energy-touching operations (biting,
//! digesting, acid production) live on `Creature`, which owns both this
//! state and the energy pool they trade against.

use serde::{Deserialize, Serialize};

use crate::mutable::Mutable;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DigestiveSystem {
    /// Stomach area; tracks `stomach_capacity_factor * size^2`.
    pub stomach_capacity: f64,
    /// Occupied stomach area.
    pub stomach_fullness: f64,
    pub stomach_acid: f64,
    /// Energy waiting in the stomach, released by digestion.
    pub potential_energy_in_stomach: f64,
    /// Time left until the creature can bite again.
    pub eating_cooldown: f64,
    /// Bite radius; tracks `genetic_strength * size`.
    pub bite_strength: f64,
}

impl DigestiveSystem {
    pub fn new(mutable: &Mutable, size: f64) -> Self {
        let mut system = Self {
            eating_cooldown: mutable.eating_speed,
            ..Self::default()
        };
        system.refresh_for_size(mutable, size);
        system
    }

    /// Capacity and bite strength scale with the body as it grows.
    pub fn refresh_for_size(&mut self, mutable: &Mutable, size: f64) {
        self.stomach_capacity = mutable.stomach_capacity_factor * size.powi(2);
        self.bite_strength = mutable.genetic_strength * size;
        self.stomach_fullness = self.stomach_fullness.min(self.stomach_capacity);
        self.stomach_acid = self.stomach_acid.min(self.stomach_capacity);
    }

    pub fn available_space(&self) -> f64 {
        (self.stomach_capacity - self.stomach_fullness).max(0.0)
    }

    pub fn emptiness_percent(&self) -> f64 {
        if self.stomach_capacity <= 0.0 {
            return 100.0;
        }
        100.0 * (1.0 - self.stomach_fullness / self.stomach_capacity)
    }

    pub fn set_fullness(&mut self, value: f64) {
        self.stomach_fullness = value.clamp(0.0, self.stomach_capacity);
    }

    pub fn set_acid(&mut self, value: f64) {
        self.stomach_acid = value.clamp(0.0, self.stomach_capacity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_follows_size_squared() {
        let mutable = Mutable::default();
        let system = DigestiveSystem::new(&mutable, 3.0);
        assert!((system.stomach_capacity - mutable.stomach_capacity_factor * 9.0).abs() < 1e-12);
        assert!((system.bite_strength - mutable.genetic_strength * 3.0).abs() < 1e-12);
    }

    #[test]
    fn fullness_and_acid_are_clamped_to_capacity() {
        let mutable = Mutable::default();
        let mut system = DigestiveSystem::new(&mutable, 2.0);
        system.set_fullness(1e9);
        assert_eq!(system.stomach_fullness, system.stomach_capacity);
        system.set_acid(-5.0);
        assert_eq!(system.stomach_acid, 0.0);
    }

    #[test]
    fn shrinking_capacity_squeezes_contents() {
        let mutable = Mutable::default();
        let mut system = DigestiveSystem::new(&mutable, 4.0);
        system.set_fullness(system.stomach_capacity);
        system.refresh_for_size(&mutable, 2.0);
        assert!(system.stomach_fullness <= system.stomach_capacity);
    }

    #[test]
    fn emptiness_percent_spans_the_full_range() {
        let mutable = Mutable::default();
        let mut system = DigestiveSystem::new(&mutable, 2.0);
        assert_eq!(system.emptiness_percent(), 100.0);
        system.set_fullness(system.stomach_capacity);
        assert_eq!(system.emptiness_percent(), 0.0);
    }
}
