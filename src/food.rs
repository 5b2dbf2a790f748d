//! Food entities: plants that photosynthesize, meat that rots, and the
//! remains of broken eggs.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::config::settings;
use crate::entity::{EntityCore, Motion};
use crate::random;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FoodKind {
    Plant,
    Meat,
    Egg,
}

pub const PLANT_HUE: f64 = 0.32;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Food {
    pub core: EntityCore,
    pub motion: Motion,
    pub kind: FoodKind,
    /// Energy yielded per unit of bitten size.
    pub nutritional_value: f64,
    pub age: f64,
    pub lifespan: f64,
}

impl Food {
    pub fn plant(position: DVec2) -> Self {
        let env = &settings().environment;
        let mut core = EntityCore::new(position, random::uniform_real(1.0, env.max_food_size));
        core.color = PLANT_HUE;
        Self {
            core,
            motion: Motion::default(),
            kind: FoodKind::Plant,
            nutritional_value: env.plant_nutritional_value,
            age: 0.0,
            lifespan: env.default_lifespan,
        }
    }

    pub fn meat(position: DVec2, size: f64) -> Self {
        let env = &settings().environment;
        Self {
            core: EntityCore::new(position, size.max(1.0)),
            motion: Motion::default(),
            kind: FoodKind::Meat,
            nutritional_value: env.meat_nutritional_value,
            age: 0.0,
            lifespan: env.default_lifespan,
        }
    }

    /// Remains of a broken egg, edible like meat but richer.
    pub fn egg_remains(position: DVec2, size: f64) -> Self {
        let env = &settings().environment;
        Self {
            core: EntityCore::new(position, size.max(1.0)),
            motion: Motion::default(),
            kind: FoodKind::Egg,
            nutritional_value: env.egg_nutritional_value,
            age: 0.0,
            lifespan: env.default_lifespan,
        }
    }

    /// The whole item has been consumed.
    pub fn eaten(&mut self) {
        self.core.die();
    }

    pub fn update(&mut self, dt: f64) {
        if !self.core.is_alive() {
            return;
        }
        match self.kind {
            FoodKind::Plant => self.update_plant(dt),
            FoodKind::Meat | FoodKind::Egg => self.update_meat(dt),
        }
    }

    /// Plants regenerate nutrition up to a cap that decays with age.
    fn update_plant(&mut self, dt: f64) {
        let env = &settings().environment;
        let aging_factor = 0.002;

        let cap = env.max_nutritional_value * (-aging_factor * self.age).exp();
        let regrown = (self.nutritional_value + env.photosynthesis_factor * dt).min(cap);
        self.age += dt;

        if regrown < 0.01 {
            self.core.die();
            return;
        }
        self.nutritional_value = regrown;
        self.core.color =
            PLANT_HUE + (regrown / env.plant_nutritional_value - 1.0) * 0.06;
    }

    /// Meat rots linearly and dies a little past zero, so starving
    /// carnivores get one last worthless bite.
    fn update_meat(&mut self, dt: f64) {
        let env = &settings().environment;
        self.nutritional_value -= env.rot_factor * dt;
        self.age += dt;

        if self.nutritional_value < -0.5 || self.age > self.lifespan {
            self.core.die();
            return;
        }
        self.core.color = (1.0 - self.nutritional_value / env.meat_nutritional_value) / 7.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::dvec2;

    #[test]
    fn plants_regrow_towards_the_age_cap() {
        let mut plant = Food::plant(dvec2(10.0, 10.0));
        plant.nutritional_value = 0.5;
        let before = plant.nutritional_value;
        plant.update(1.0);
        assert!(plant.nutritional_value > before);
        assert!(plant.core.is_alive());

        // the cap decays with age, so a very old plant withers away
        plant.age = 10_000.0;
        plant.nutritional_value = settings().environment.max_nutritional_value;
        plant.update(1.0);
        assert!(!plant.core.is_alive());
    }

    #[test]
    fn meat_rots_linearly_and_dies_below_threshold() {
        let mut meat = Food::meat(dvec2(5.0, 5.0), 3.0);
        let before = meat.nutritional_value;
        meat.update(1.0);
        assert!(meat.nutritional_value < before);

        meat.nutritional_value = -0.49;
        meat.update(1.0);
        assert!(!meat.core.is_alive());
    }

    #[test]
    fn dead_food_stops_updating() {
        let mut plant = Food::plant(dvec2(1.0, 1.0));
        plant.eaten();
        let frozen = plant.nutritional_value;
        plant.update(5.0);
        assert_eq!(plant.nutritional_value, frozen);
    }

    #[test]
    fn spawned_food_has_positive_size() {
        for _ in 0..50 {
            let plant = Food::plant(dvec2(0.0, 0.0));
            assert!(plant.core.size >= 1.0);
        }
    }
}
