//! The heritable trait vector carried by every creature and egg, orthogonal
//! to the neural genome. Every trait has a default, a mutation step of one
//! twentieth of that default, and clamps that keep the physics sane.

use serde::{Deserialize, Serialize};

use crate::config::settings;
use crate::random;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mutable {
    pub energy_density: f64,
    pub energy_loss: f64,
    pub integrity: f64,
    pub strafing_difficulty: f64,
    pub max_size: f64,
    pub baby_size: f64,
    pub max_force: f64,
    pub growth_factor: f64,
    pub vision_factor: f64,
    pub gestation_ratio_to_incubation: f64,
    /// Hue in [0, 1), wrapping on mutation.
    pub color: f64,
    pub stomach_capacity_factor: f64,
    /// 0 = herbivore, 1 = carnivore.
    pub diet: f64,
    pub genetic_strength: f64,
    pub eating_speed: f64,
    pub pheromone_emission: f64,
}

impl Default for Mutable {
    fn default() -> Self {
        let pc = &settings().physical_constraints;
        Self {
            energy_density: pc.d_energy_density,
            energy_loss: pc.d_energy_loss,
            integrity: pc.d_integrity,
            strafing_difficulty: pc.d_strafing_difficulty,
            max_size: pc.d_max_size,
            baby_size: pc.d_baby_size,
            max_force: pc.d_max_force,
            growth_factor: pc.d_growth_factor,
            vision_factor: pc.d_vision_factor,
            gestation_ratio_to_incubation: pc.d_gestation_ratio_to_incubation,
            color: random::uniform_real(0.0, 1.0),
            stomach_capacity_factor: pc.d_stomach_capacity,
            diet: pc.d_diet,
            genetic_strength: pc.d_genetic_strength,
            eating_speed: pc.d_eating_speed,
            pheromone_emission: pc.d_pheromone_emission,
        }
    }
}

fn nudge(value: &mut f64, sigma: f64, low: f64, high: f64) {
    if random::bernoulli(settings().physical_constraints.mutation_rate) {
        *value = (*value + random::normal(0.0, sigma)).clamp(low, high);
    }
}

impl Mutable {
    /// Independently perturb each trait with the configured probability and a
    /// step of one twentieth of the trait default, then clamp.
    pub fn mutate(&mut self) {
        let pc = &settings().physical_constraints;
        let env = &settings().environment;

        nudge(
            &mut self.energy_density,
            pc.d_energy_density / 20.0,
            0.0,
            pc.max_energy_density,
        );
        nudge(
            &mut self.energy_loss,
            pc.d_energy_loss / 20.0,
            pc.min_energy_loss,
            f64::INFINITY,
        );
        nudge(&mut self.integrity, pc.d_integrity / 20.0, 0.0, f64::INFINITY);
        nudge(
            &mut self.strafing_difficulty,
            pc.d_strafing_difficulty / 20.0,
            0.0,
            f64::INFINITY,
        );
        nudge(
            &mut self.max_size,
            pc.d_max_size / 20.0,
            env.min_creature_size,
            env.max_creature_size,
        );
        nudge(
            &mut self.baby_size,
            pc.d_baby_size / 20.0,
            env.min_creature_size,
            self.max_size,
        );
        nudge(&mut self.max_force, pc.d_max_force / 20.0, 0.0, f64::INFINITY);
        nudge(
            &mut self.growth_factor,
            pc.d_growth_factor / 20.0,
            0.0,
            f64::INFINITY,
        );
        nudge(
            &mut self.vision_factor,
            pc.d_vision_factor / 20.0,
            0.1,
            f64::INFINITY,
        );
        nudge(
            &mut self.gestation_ratio_to_incubation,
            pc.d_gestation_ratio_to_incubation / 20.0,
            0.0,
            1.0,
        );
        if random::bernoulli(pc.mutation_rate) {
            self.color = (self.color + random::normal(0.0, pc.color_mutation_factor)).rem_euclid(1.0);
        }
        nudge(
            &mut self.stomach_capacity_factor,
            pc.d_stomach_capacity / 20.0,
            0.0,
            f64::INFINITY,
        );
        nudge(&mut self.diet, pc.d_diet / 20.0, 0.0, 1.0);
        nudge(
            &mut self.genetic_strength,
            pc.d_genetic_strength / 20.0,
            0.0,
            f64::INFINITY,
        );
        nudge(
            &mut self.eating_speed,
            pc.d_eating_speed / 20.0,
            0.0,
            f64::INFINITY,
        );
        nudge(
            &mut self.pheromone_emission,
            pc.d_pheromone_emission / 20.0,
            0.0,
            1.0,
        );
    }

    /// Monotonically scaled combination of the traits, used to derive the
    /// maturity age, reproduction cooldown and incubation time.
    pub fn complexity(&self) -> f64 {
        (self.energy_density * 10.0
            + 5.0 / self.energy_loss.max(1e-3)
            + self.integrity * 20.0
            + 5.0 / (1.0 + self.strafing_difficulty)
            + self.max_force * 2.0
            + 5.0 / self.growth_factor.max(1e-3))
            * self.baby_size
            / 10.0
    }

    pub fn maturity_age(&self) -> f64 {
        self.complexity()
            * (1.0 + self.max_size - self.baby_size)
            * settings().environment.maturity_age_multiplier
    }

    pub fn reproduction_cooldown(&self) -> f64 {
        self.complexity() * 0.5
    }

    pub fn incubation_time(&self) -> f64 {
        self.complexity() * settings().environment.egg_incubation_time_multiplier
    }

    /// Weighted sum of per-trait absolute differences. Each difference is
    /// normalized by the trait default so traits on different scales
    /// contribute comparably; hue uses the circular distance.
    pub fn compatibility(&self, other: &Mutable) -> f64 {
        let pc = &settings().physical_constraints;
        let weights = &settings().compatibility;

        let mut distance = 0.0;
        let mut term = |a: f64, b: f64, scale: f64| {
            distance += (a - b).abs() / scale.max(1e-9);
        };
        term(self.energy_density, other.energy_density, pc.d_energy_density);
        term(self.energy_loss, other.energy_loss, pc.d_energy_loss);
        term(self.integrity, other.integrity, pc.d_integrity);
        term(
            self.strafing_difficulty,
            other.strafing_difficulty,
            pc.d_strafing_difficulty,
        );
        term(self.max_size, other.max_size, pc.d_max_size);
        term(self.baby_size, other.baby_size, pc.d_baby_size);
        term(self.max_force, other.max_force, pc.d_max_force);
        term(self.growth_factor, other.growth_factor, pc.d_growth_factor);
        term(self.vision_factor, other.vision_factor, pc.d_vision_factor);
        term(
            self.gestation_ratio_to_incubation,
            other.gestation_ratio_to_incubation,
            pc.d_gestation_ratio_to_incubation,
        );
        term(
            self.stomach_capacity_factor,
            other.stomach_capacity_factor,
            pc.d_stomach_capacity,
        );
        term(self.diet, other.diet, pc.d_diet);
        term(self.genetic_strength, other.genetic_strength, pc.d_genetic_strength);
        term(self.eating_speed, other.eating_speed, pc.d_eating_speed);
        term(
            self.pheromone_emission,
            other.pheromone_emission,
            pc.d_pheromone_emission,
        );

        let hue_delta = (self.color - other.color).abs();
        let hue_distance = hue_delta.min(1.0 - hue_delta);

        weights.mutables_compatibility * distance + weights.color_compatibility * hue_distance
    }
}

/// Per-trait weighted average favoring the dominant (higher-energy) parent:
/// `(2 * dominant + recessive) / 3`.
pub fn crossover(dominant: &Mutable, recessive: &Mutable) -> Mutable {
    let mix = |d: f64, r: f64| (2.0 * d + r) / 3.0;
    Mutable {
        energy_density: mix(dominant.energy_density, recessive.energy_density),
        energy_loss: mix(dominant.energy_loss, recessive.energy_loss),
        integrity: mix(dominant.integrity, recessive.integrity),
        strafing_difficulty: mix(dominant.strafing_difficulty, recessive.strafing_difficulty),
        max_size: mix(dominant.max_size, recessive.max_size),
        baby_size: mix(dominant.baby_size, recessive.baby_size),
        max_force: mix(dominant.max_force, recessive.max_force),
        growth_factor: mix(dominant.growth_factor, recessive.growth_factor),
        vision_factor: mix(dominant.vision_factor, recessive.vision_factor),
        gestation_ratio_to_incubation: mix(
            dominant.gestation_ratio_to_incubation,
            recessive.gestation_ratio_to_incubation,
        ),
        color: mix(dominant.color, recessive.color),
        stomach_capacity_factor: mix(
            dominant.stomach_capacity_factor,
            recessive.stomach_capacity_factor,
        ),
        diet: mix(dominant.diet, recessive.diet),
        genetic_strength: mix(dominant.genetic_strength, recessive.genetic_strength),
        eating_speed: mix(dominant.eating_speed, recessive.eating_speed),
        pheromone_emission: mix(dominant.pheromone_emission, recessive.pheromone_emission),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings;

    #[test]
    fn mutation_respects_every_clamp() {
        let env = &settings().environment;
        let mut m = Mutable::default();
        for _ in 0..500 {
            m.mutate();
            assert!(m.energy_density >= 0.0);
            assert!(m.energy_density <= settings().physical_constraints.max_energy_density);
            assert!(m.energy_loss >= settings().physical_constraints.min_energy_loss);
            assert!(m.baby_size >= env.min_creature_size);
            assert!(m.baby_size <= m.max_size);
            assert!(m.vision_factor >= 0.1);
            assert!((0.0..=1.0).contains(&m.diet));
            assert!((0.0..=1.0).contains(&m.gestation_ratio_to_incubation));
            assert!((0.0..1.0).contains(&m.color));
        }
    }

    #[test]
    fn crossover_favors_the_dominant_parent() {
        let mut dominant = Mutable::default();
        dominant.max_force = 9.0;
        let mut recessive = Mutable::default();
        recessive.max_force = 3.0;

        let child = crossover(&dominant, &recessive);
        assert!((child.max_force - 7.0).abs() < 1e-12);
    }

    #[test]
    fn self_compatibility_is_zero() {
        let m = Mutable::default();
        assert_eq!(m.compatibility(&m), 0.0);
    }

    #[test]
    fn compatibility_grows_with_trait_distance() {
        let a = Mutable::default();
        let mut b = a.clone();
        b.diet = (a.diet + 0.4).min(1.0);
        let near = a.compatibility(&b);
        b.max_force += 5.0;
        let far = a.compatibility(&b);
        assert!(far > near);
        assert!(near > 0.0);
    }

    #[test]
    fn hue_distance_is_circular() {
        let mut a = Mutable::default();
        let mut b = a.clone();
        a.color = 0.02;
        b.color = 0.98;
        let mut c = a.clone();
        c.color = 0.5;
        assert!(a.compatibility(&b) < a.compatibility(&c));
    }

    #[test]
    fn derived_clocks_scale_with_complexity() {
        let m = Mutable::default();
        assert!(m.complexity() > 0.0);
        assert!(m.maturity_age() > 0.0);
        assert!((m.reproduction_cooldown() - m.complexity() * 0.5).abs() < 1e-12);
        assert!(m.incubation_time() > 0.0);
    }
}
