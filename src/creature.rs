//! The creature aggregate: a movable body plus the alive, digestive,
//! reproductive, vision and pheromone subsystems, driven by a feed-forward
//! network compiled from its NEAT genome.

use glam::DVec2;

use crate::config::settings;
use crate::digestion::DigestiveSystem;
use crate::egg::Egg;
use crate::entity::{self, EntityCore, Motion};
use crate::environment::Environment;
use crate::food::{Food, FoodKind};
use crate::grab::GrabLinks;
use crate::grid::EntityGrid;
use crate::mutable::Mutable;
use crate::neat::{FeedForward, Genome, MODULE_GEOLOCATION, MODULE_PHEROMONE, MODULE_VISION};
use crate::pheromone::{Pheromone, PheromoneSystem};
use crate::random;
use crate::reproduction::{FemaleSystem, MaleSystem, ParentSeed};
use crate::vision::{self, VisionState};

/// What one creature hands back from its parallel update slice. The manager
/// merges these at the phase barrier.
#[derive(Default)]
pub struct CreatureTickOutput {
    pub laid_egg: Option<Egg>,
    pub emissions: Vec<Pheromone>,
    pub wants_to_mate: bool,
}

pub struct Creature {
    pub core: EntityCore,
    pub motion: Motion,
    pub genome: Genome,
    pub mutable: Mutable,
    pub brain: FeedForward,
    neuron_input: Vec<f64>,
    pub energy: f64,
    pub max_energy: f64,
    pub health: f64,
    pub age: f64,
    pub generation: u32,
    pub digestion: DigestiveSystem,
    pub male: MaleSystem,
    pub female: FemaleSystem,
    pub vision: VisionState,
    pub pheromones: PheromoneSystem,
    pub grab: GrabLinks,
    pub wants_to_bite: bool,
}

impl Creature {
    pub fn new(genome: Genome, mutable: Mutable, position: DVec2) -> Self {
        let size = mutable.baby_size;
        let mut core = EntityCore::new(position, size);
        core.color = mutable.color;

        let brain = FeedForward::new(&genome);
        let input_len = brain.input_len();
        let digestion = DigestiveSystem::new(&mutable, size);
        let male = MaleSystem::new(&mutable);
        let female = FemaleSystem::new(&mutable);
        let vision = VisionState::new(&mutable);
        let pheromones = PheromoneSystem::new(&genome);

        let mut motion = Motion::default();
        motion.strafing_difficulty = mutable.strafing_difficulty;

        Self {
            core,
            motion,
            energy: mutable.energy_density * size.powi(2) / 2.0,
            max_energy: mutable.energy_density * size.powi(2),
            health: mutable.integrity * size.powi(2) / 2.0,
            age: 0.0,
            generation: 0,
            digestion,
            male,
            female,
            vision,
            pheromones,
            grab: GrabLinks::default(),
            wants_to_bite: false,
            neuron_input: vec![0.0; input_len],
            brain,
            genome,
            mutable,
        }
    }

    pub fn max_health(&self) -> f64 {
        self.mutable.integrity * self.core.size.powi(2)
    }

    pub fn set_health(&mut self, health: f64) {
        self.health = health.min(self.max_health());
    }

    pub fn set_energy(&mut self, energy: f64) {
        self.energy = energy.min(self.max_energy);
    }

    pub fn die(&mut self) {
        self.core.die();
    }

    /// Max energy grows with the body and decays with age.
    pub fn update_max_energy(&mut self) {
        self.max_energy =
            self.mutable.energy_density * self.core.size.powi(2) * (-self.age / 50.0).exp();
    }

    /// Trade between the energy pool and health so neither runs away:
    /// deficits eat health, surpluses and idle slack heal it.
    pub fn balance_health_energy(&mut self) {
        if self.energy < 0.0 {
            self.set_health(self.health + self.energy - 0.1);
            self.energy = 0.1;
        } else if self.energy > self.max_energy {
            self.set_health(self.health + self.energy - self.max_energy);
            self.energy = self.max_energy;
        } else if self.health < self.energy && self.energy >= 0.1 * self.max_energy {
            self.energy -= 0.1;
            self.set_health(self.health + 0.1);
        }
    }

    /// Pay for movement and body heat over `dt`; pregnancy scales the
    /// maintenance cost.
    pub fn update_energy(&mut self, dt: f64) {
        let env = &settings().environment;
        let movement = (self.motion.acceleration.abs() + self.motion.rotational_acceleration.abs())
            * self.core.size
            * dt
            * env.movement_energy;
        let mut heat = self.mutable.energy_loss * self.core.size * dt * env.heat_energy;
        if self.female.is_pregnant() {
            heat *= settings().physical_constraints.pregnancy_energy_factor;
        }

        self.energy -= movement + heat;
        self.balance_health_energy();
        if self.health <= 0.0 {
            self.die();
        }
    }

    /// Direct energy intake, surplus spilling into health.
    pub fn eats(&mut self, nutritional_value: f64) {
        self.energy += nutritional_value;
        if self.energy > self.max_energy {
            self.balance_health_energy();
        }
    }

    /// Tear a bite out of a food item: the bite area is bounded by both the
    /// jaw and the free stomach space, the food shrinks by the bitten disc,
    /// and the nutrition lands in the stomach scaled by the diet.
    pub fn bite(&mut self, food: &mut Food) {
        self.digestion.eating_cooldown = self.mutable.eating_speed;

        let area_to_eat = (std::f64::consts::PI * self.digestion.bite_strength.powi(2))
            .min(self.digestion.available_space())
            .max(0.0);
        let food_to_eat = area_to_eat.sqrt();

        let nutrition = if food_to_eat >= food.core.size {
            let whole = food.nutritional_value * food.core.size;
            self.digestion
                .set_fullness(self.digestion.stomach_fullness + std::f64::consts::PI * food.core.size.powi(2));
            food.eaten();
            whole
        } else {
            let remaining = (food.core.size.powi(2) - food_to_eat.powi(2)).abs().sqrt();
            food.core.size = remaining;
            self.digestion
                .set_fullness(self.digestion.stomach_fullness + std::f64::consts::PI * food_to_eat.powi(2));
            food.nutritional_value * food_to_eat
        };

        let scaled = match food.kind {
            FoodKind::Plant => nutrition * 2.0 * (1.0 - self.mutable.diet),
            FoodKind::Meat | FoodKind::Egg => nutrition * 2.0 * self.mutable.diet,
        };
        self.digestion.potential_energy_in_stomach += scaled;
    }

    /// Digest stomach contents: limited by acid, fullness and the digestion
    /// rate, converting stored nutrition into energy proportionally.
    pub fn digest(&mut self, dt: f64) {
        let eps = settings().engine.eps;
        let rate = settings().physical_constraints.d_digestion_rate;

        let quantity = (dt * rate)
            .min(self.digestion.stomach_acid)
            .min(self.digestion.stomach_fullness);
        if quantity < eps || self.digestion.stomach_fullness < eps {
            return;
        }
        let avg_nutrition =
            self.digestion.potential_energy_in_stomach / self.digestion.stomach_fullness;

        self.eats(quantity * avg_nutrition);
        self.digestion.set_acid(self.digestion.stomach_acid - quantity);
        self.digestion.potential_energy_in_stomach -= quantity * avg_nutrition;
        self.digestion
            .set_fullness(self.digestion.stomach_fullness - quantity);
    }

    /// Producing stomach acid costs energy.
    pub fn add_acid(&mut self, quantity: f64) {
        let before = self.digestion.stomach_acid;
        self.digestion.set_acid(before + quantity);
        self.energy -= (self.digestion.stomach_acid - before)
            / settings().physical_constraints.d_acid_to_energy;
    }

    /// Convert energy into body size, up to the trait cap.
    pub fn grow(&mut self, energy: f64) {
        if energy <= 0.0 {
            return;
        }
        let grown = self.core.size + energy * self.mutable.growth_factor;
        self.core.size = grown.min(self.mutable.max_size);
        self.energy -= energy;
        self.digestion.refresh_for_size(&self.mutable, self.core.size);
    }

    pub fn ready_to_procreate_as_male(&self) -> bool {
        self.male.ready_to_procreate(self.age, self.energy, self.max_energy)
    }

    pub fn ready_to_procreate_as_female(&self) -> bool {
        self.female
            .ready_to_procreate(self.age, self.energy, self.max_energy)
    }

    /// Compatibility test for mating and clustering alike: genome plus
    /// trait-vector distance under the configured threshold.
    pub fn compatible_with(&self, other: &Creature) -> bool {
        let distance = self.genome.compatibility(&other.genome)
            + self.mutable.compatibility(&other.mutable);
        distance < settings().compatibility.compatibility_threshold
    }

    /// The father's side of a mating: pay the cost, restart the clock.
    pub fn male_after_mate(&mut self) {
        let cost = settings().environment.male_reproduction_cost
            * self.mutable.energy_density
            * self.core.size.powi(2);
        self.set_energy(self.energy - cost);
        self.male.after_mate(self.age);
    }

    pub fn parent_seed(&self) -> ParentSeed {
        ParentSeed {
            genome: self.genome.clone(),
            mutable: self.mutable.clone(),
            energy: self.energy,
            generation: self.generation,
        }
    }

    fn mating_desire(&self) -> bool {
        if !(self.ready_to_procreate_as_male() || self.ready_to_procreate_as_female()) {
            return false;
        }
        let pc = &settings().physical_constraints;
        let fullness = if self.max_energy > 0.0 {
            (self.energy / self.max_energy).clamp(0.0, 1.0)
        } else {
            0.0
        };
        random::bernoulli(pc.mating_desire_max_prob.min(pc.mating_desire_factor * fullness))
    }

    /// Sense, activate the network, and actuate the outputs.
    fn think(
        &mut self,
        grid: &EntityGrid,
        foods: &[Food],
        pheromones: &[Pheromone],
        width: f64,
        height: f64,
        dt: f64,
    ) {
        vision::process_vision(&self.core, &mut self.vision, grid, foods, width, height);
        self.pheromones
            .detect(&self.core, grid, pheromones, width, height);

        let vision_module_count = self
            .genome
            .modules()
            .iter()
            .filter(|m| m.module_id == MODULE_VISION)
            .count();
        let extra_targets = if vision_module_count > 0 {
            vision::foods_in_sight(
                &self.core,
                &self.vision,
                grid,
                foods,
                1 + vision_module_count,
                width,
                height,
            )
        } else {
            Vec::new()
        };

        self.neuron_input.clear();
        self.neuron_input.extend_from_slice(&[
            self.energy,
            self.motion.velocity,
            self.motion.velocity_angle,
            self.motion.rotational_velocity,
            self.digestion.emptiness_percent(),
            self.health,
            self.vision.orientation_plant,
            self.vision.distance_plant,
            self.vision.plant_size,
            self.vision.orientation_meat,
            self.vision.distance_meat,
            self.vision.meat_size,
        ]);

        let mut vision_ordinal = 0usize;
        for module in self.genome.modules() {
            match module.module_id {
                MODULE_GEOLOCATION => {
                    self.neuron_input.push(self.core.position.x);
                    self.neuron_input.push(self.core.position.y);
                    self.neuron_input.push(self.core.orientation);
                }
                MODULE_PHEROMONE => {
                    let channel = module.channel as usize % self.pheromones.densities.len();
                    self.neuron_input.push(self.pheromones.densities[channel]);
                }
                MODULE_VISION => {
                    let target = extra_targets.get(vision_ordinal).map(|&i| &foods[i]);
                    vision_ordinal += 1;
                    match target {
                        Some(food) => {
                            let distance =
                                self.core.distance_to(&food.core, width, height) - food.core.size;
                            self.neuron_input.push(distance);
                            self.neuron_input
                                .push(self.core.relative_orientation(&food.core, width, height));
                            self.neuron_input.push(food.core.size);
                            self.neuron_input.push(food.core.color);
                            self.neuron_input.push(match food.kind {
                                FoodKind::Plant => 0.0,
                                FoodKind::Egg => 0.5,
                                FoodKind::Meat => 1.0,
                            });
                        }
                        None => {
                            self.neuron_input.push(self.vision.vision_radius);
                            self.neuron_input.push(0.0);
                            self.neuron_input.push(-1.0);
                            self.neuron_input.push(0.0);
                            self.neuron_input.push(-1.0);
                        }
                    }
                }
                _ => {
                    for _ in 0..module.input_ids.len() {
                        self.neuron_input.push(0.0);
                    }
                }
            }
        }
        self.neuron_input.resize(self.brain.input_len(), 0.0);

        let outputs = self.brain.activate(&self.neuron_input);

        let max_force = self.mutable.max_force;
        self.motion.acceleration = outputs.first().copied().unwrap_or(0.0).tanh() * max_force;
        self.motion.acceleration_angle =
            outputs.get(1).copied().unwrap_or(0.0).tanh() * std::f64::consts::PI;
        self.motion.rotational_acceleration =
            outputs.get(2).copied().unwrap_or(0.0).tanh() * max_force;
        self.grow((outputs.get(3).copied().unwrap_or(0.0).tanh() * dt).max(0.0));
        self.wants_to_bite = outputs.get(4).copied().unwrap_or(0.0) > 0.0;
        let acid_drive = outputs.get(5).copied().unwrap_or(0.0);
        if acid_drive > 0.0 {
            self.add_acid(acid_drive.tanh() * dt * settings().physical_constraints.d_digestion_rate);
        }

        // module outputs follow the base six in activation order
        let mut cursor = settings().environment.output_neurons;
        for module in self.genome.modules() {
            let count = module.output_ids.len();
            if module.module_id == MODULE_PHEROMONE && count == 1 {
                let channel = module.channel as usize % self.pheromones.emissions.len();
                let drive = outputs.get(cursor).copied().unwrap_or(0.0);
                self.pheromones.emissions[channel] = drive.tanh().max(0.0);
            }
            cursor += count;
        }
    }

    /// One fixed-step creature tick; returns the buffered side effects for
    /// the manager to merge at the barrier.
    pub fn update(
        &mut self,
        dt: f64,
        grid: &EntityGrid,
        foods: &[Food],
        pheromones: &[Pheromone],
        environment: &Environment,
    ) -> CreatureTickOutput {
        let width = environment.width();
        let height = environment.height();
        self.motion.frictional_coefficient = environment.friction_coefficient();
        self.motion.strafing_difficulty = self.mutable.strafing_difficulty;

        self.update_max_energy();
        self.update_energy(dt);
        if !self.core.is_alive() {
            return CreatureTickOutput::default();
        }

        entity::integrate(&mut self.core, &mut self.motion, dt, width, height);
        self.think(grid, foods, pheromones, width, height, dt);
        self.age += 0.05;

        self.digestion.eating_cooldown = (self.digestion.eating_cooldown - dt).max(0.0);
        self.digest(dt);

        self.female.gestate(dt);
        if self.female.is_pregnant() {
            self.motion.velocity *= settings().physical_constraints.pregnancy_velocity_factor;
        }
        let laid_egg = if self.female.can_birth() {
            let egg = self.female.give_birth(self.core.position, self.age);
            if egg.is_some() {
                self.motion.velocity *=
                    settings().physical_constraints.after_birth_velocity_factor;
            }
            egg
        } else {
            None
        };

        let emissions = self.pheromones.emit(&self.core, dt);
        let wants_to_mate = self.mating_desire();

        CreatureTickOutput {
            laid_egg,
            emissions,
            wants_to_mate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use glam::dvec2;

    fn hungry_world() -> (Environment, EntityGrid) {
        let environment = Environment::new(400.0, 400.0);
        let grid = EntityGrid::new(400.0, 400.0, 50.0);
        (environment, grid)
    }

    fn test_creature(position: DVec2) -> Creature {
        Creature::new(crate::neat::Genome::new(12, 6), Mutable::default(), position)
    }

    #[test]
    fn energy_never_exceeds_max_and_health_never_exceeds_cap() {
        let mut creature = test_creature(dvec2(100.0, 100.0));
        creature.eats(1e6);
        assert!(creature.energy <= creature.max_energy);
        assert!(creature.health <= creature.max_health());
    }

    #[test]
    fn starving_creature_dies_in_bounded_time() {
        let (environment, grid) = hungry_world();
        let mut mutable = Mutable::default();
        mutable.energy_loss = 60.0;
        let mut creature =
            Creature::new(crate::neat::Genome::new(12, 6), mutable, dvec2(100.0, 100.0));

        let mut survived = 0;
        for _ in 0..5000 {
            creature.update(0.05, &grid, &[], &[], &environment);
            if !creature.core.is_alive() {
                break;
            }
            survived += 1;
        }
        assert!(!creature.core.is_alive(), "creature outlived {survived} starving ticks");
        // energy was clamped, never unboundedly negative
        assert!(creature.energy >= -1.0);
    }

    #[test]
    fn bite_shrinks_food_and_fills_the_stomach() {
        let mut creature = test_creature(dvec2(50.0, 50.0));
        let mut plant = Food::plant(dvec2(52.0, 50.0));
        plant.core.size = 5.0;
        let before_size = plant.core.size;

        creature.bite(&mut plant);

        assert!(plant.core.size < before_size);
        assert!(creature.digestion.stomach_fullness > 0.0);
        assert!(creature.digestion.potential_energy_in_stomach > 0.0);
        assert_eq!(creature.digestion.eating_cooldown, creature.mutable.eating_speed);
    }

    #[test]
    fn small_food_is_swallowed_whole() {
        let mut creature = test_creature(dvec2(50.0, 50.0));
        let mut plant = Food::plant(dvec2(52.0, 50.0));
        plant.core.size = 0.5;

        creature.bite(&mut plant);

        assert!(!plant.core.is_alive());
    }

    #[test]
    fn diet_scales_nutrition_by_food_kind() {
        let mut herbivore = Creature::new(
            crate::neat::Genome::new(12, 6),
            Mutable {
                diet: 0.0,
                ..Mutable::default()
            },
            dvec2(50.0, 50.0),
        );
        let mut carnivore = Creature::new(
            crate::neat::Genome::new(12, 6),
            Mutable {
                diet: 1.0,
                ..Mutable::default()
            },
            dvec2(50.0, 50.0),
        );

        let mut plant_a = Food::plant(dvec2(52.0, 50.0));
        plant_a.core.size = 5.0;
        let mut plant_b = plant_a.clone();

        herbivore.bite(&mut plant_a);
        carnivore.bite(&mut plant_b);

        assert!(herbivore.digestion.potential_energy_in_stomach > 0.0);
        assert_eq!(carnivore.digestion.potential_energy_in_stomach, 0.0);
    }

    #[test]
    fn digestion_converts_stomach_contents_to_energy() {
        let mut creature = test_creature(dvec2(50.0, 50.0));
        let mut plant = Food::plant(dvec2(52.0, 50.0));
        plant.core.size = 5.0;
        creature.bite(&mut plant);
        creature.add_acid(1.0);

        creature.energy = 1.0;
        let before = creature.energy;
        creature.digest(0.5);

        assert!(creature.energy > before);
        assert!(creature.digestion.stomach_acid < 1.0);
    }

    #[test]
    fn acid_production_costs_energy() {
        let mut creature = test_creature(dvec2(50.0, 50.0));
        let before = creature.energy;
        creature.add_acid(1.0);
        assert!(creature.energy < before);
    }

    #[test]
    fn growth_is_capped_by_the_trait_maximum() {
        let mut creature = test_creature(dvec2(50.0, 50.0));
        creature.grow(1e9);
        assert_eq!(creature.core.size, creature.mutable.max_size);
    }

    #[test]
    fn minimally_viable_brain_drives_forward_motion() {
        let (environment, grid) = hungry_world();
        let mut creature = Creature::new(
            crate::neat::minimally_viable_genome(),
            Mutable::default(),
            dvec2(100.0, 100.0),
        );

        creature.update(0.05, &grid, &[], &[], &environment);

        assert!(creature.motion.acceleration > 0.0);
    }

    #[test]
    fn update_keeps_the_position_wrapped() {
        let (environment, grid) = hungry_world();
        let mut creature = test_creature(dvec2(399.9, 399.9));
        creature.motion.velocity = 500.0;
        for _ in 0..20 {
            creature.update(0.05, &grid, &[], &[], &environment);
        }
        assert!((0.0..400.0).contains(&creature.core.position.x));
        assert!((0.0..400.0).contains(&creature.core.position.y));
    }
}
