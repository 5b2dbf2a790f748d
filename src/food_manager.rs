//! Plant spawning and food aging.
//!
//! The map is tiled into square spawn cells; each cell rolls against the
//! local food density every tick. Both spawning and aging fan out over the
//! worker pool, with per-worker output merged at the phase barrier.

use glam::dvec2;
use rayon::prelude::*;

use crate::config::settings;
use crate::food::Food;
use crate::random;
use crate::simulation::SimulationData;

/// Seed the initial flora by running the spawn pass repeatedly with a large
/// time step.
pub fn initialize_food(data: &mut SimulationData) {
    data.food.clear();
    for _ in 0..settings().environment.initial_plant_spawns {
        generate_more_food(data, 3.0);
    }
    log::info!("seeded {} plants", data.food.len());
}

/// One spawn pass: every spawn cell rolls `density * area * rate * dt` for a
/// new food item at a uniform point inside the cell. The plant/meat mix
/// follows `plant_proportion`.
pub fn generate_more_food(data: &mut SimulationData, dt: f64) {
    let env = &settings().environment;
    let cell = env.food_spawn_cell_size;
    let rate = env.food_spawn_rate;
    let plant_proportion = env.plant_proportion;
    let max_food_size = env.max_food_size;
    let SimulationData {
        environment, food, ..
    } = data;
    let environment: &crate::environment::Environment = environment;

    let cols = (environment.width() / cell) as usize;
    let rows = (environment.height() / cell) as usize;
    if cols == 0 || rows == 0 {
        return;
    }

    let mut spawned: Vec<Food> = (0..cols * rows)
        .into_par_iter()
        .filter_map(|index| {
            let x = (index % cols) as f64 * cell;
            let y = (index / cols) as f64 * cell;
            let probability = environment.food_density(x, y) * cell * cell * rate * dt;
            if probability > 0.0 && random::bernoulli(probability) {
                let position = dvec2(
                    x + random::uniform_real(0.0, 1.0) * cell,
                    y + random::uniform_real(0.0, 1.0) * cell,
                );
                if random::bernoulli(plant_proportion) {
                    Some(Food::plant(position))
                } else {
                    Some(Food::meat(
                        position,
                        random::uniform_real(1.0, max_food_size),
                    ))
                }
            } else {
                None
            }
        })
        .collect();

    food.append(&mut spawned);
}

/// Age every food item: plants grow, meat rots.
pub fn update_all_food(data: &mut SimulationData, dt: f64) {
    data.food.par_iter_mut().for_each(|item| item.update(dt));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;

    #[test]
    fn zero_density_spawns_nothing() {
        let mut data = SimulationData::new(Environment::with_densities(400.0, 400.0, 0.0, 0.0));
        initialize_food(&mut data);
        assert!(data.food.is_empty());

        generate_more_food(&mut data, 100.0);
        assert!(data.food.is_empty());
    }

    #[test]
    fn positive_density_populates_the_map() {
        let mut data = SimulationData::new(Environment::with_densities(400.0, 400.0, 0.5, 0.0));
        initialize_food(&mut data);
        assert!(!data.food.is_empty());
        for plant in &data.food {
            assert!((0.0..400.0).contains(&plant.core.position.x));
            assert!((0.0..400.0).contains(&plant.core.position.y));
        }
    }

    #[test]
    fn update_ages_every_item() {
        let mut data = SimulationData::new(Environment::with_densities(400.0, 400.0, 0.5, 0.0));
        data.food.push(Food::plant(dvec2(10.0, 10.0)));
        data.food.push(Food::meat(dvec2(20.0, 20.0), 3.0));

        update_all_food(&mut data, 0.5);

        assert!(data.food.iter().all(|f| f.age == 0.5));
    }
}
