//! The logical data schema: a flat, serde-friendly snapshot of the world
//! used for persistence and inter-process exchange. The encoding is
//! non-normative; both JSON and bincode writers are provided.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::creature::Creature;
use crate::egg::{Egg, GestatingEgg};
use crate::entity::EntityState;
use crate::environment::Environment;
use crate::error::SimError;
use crate::food::{Food, FoodKind};
use crate::ids;
use crate::mutable::Mutable;
use crate::neat::Genome;
use crate::simulation::SimulationData;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FoodRecord {
    pub x: f64,
    pub y: f64,
    pub kind: FoodKind,
    pub nutritional_value: f64,
    pub size: f64,
    pub orientation: f64,
    pub state: EntityState,
    pub color: f64,
    pub age: f64,
    pub lifespan: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EggRecord {
    pub x: f64,
    pub y: f64,
    pub mutable: Mutable,
    pub incubation_time: f64,
    pub health: f64,
    pub age: f64,
    pub generation: u32,
    pub genome: Genome,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreatureRecord {
    pub id: u64,
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub orientation: f64,
    pub state: EntityState,
    pub color: f64,
    pub mutable: Mutable,
    pub acceleration: f64,
    pub acceleration_angle: f64,
    pub rotational_acceleration: f64,
    pub velocity: f64,
    pub velocity_angle: f64,
    pub rotational_velocity: f64,
    pub age: f64,
    pub health: f64,
    pub energy: f64,
    pub generation: u32,
    pub genome: Genome,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    pub width: f64,
    pub height: f64,
    pub food_density: f64,
    pub creature_density: f64,
    pub world_time: f64,
    pub food: Vec<FoodRecord>,
    pub eggs: Vec<EggRecord>,
    pub creatures: Vec<CreatureRecord>,
}

impl SimulationSnapshot {
    pub fn capture(data: &SimulationData) -> Self {
        let food = data
            .food
            .iter()
            .map(|item| FoodRecord {
                x: item.core.position.x,
                y: item.core.position.y,
                kind: item.kind,
                nutritional_value: item.nutritional_value,
                size: item.core.size,
                orientation: item.core.orientation,
                state: item.core.state,
                color: item.core.color,
                age: item.age,
                lifespan: item.lifespan,
            })
            .collect();

        let eggs = data
            .eggs
            .iter()
            .map(|egg| EggRecord {
                x: egg.core.position.x,
                y: egg.core.position.y,
                mutable: egg.gestating.mutable.clone(),
                incubation_time: egg.gestating.incubation_time,
                health: egg.health,
                age: egg.gestating.age,
                generation: egg.gestating.generation,
                genome: egg.gestating.genome.clone(),
            })
            .collect();

        let creatures = data
            .creatures
            .iter()
            .map(|creature| CreatureRecord {
                id: creature.core.id,
                x: creature.core.position.x,
                y: creature.core.position.y,
                size: creature.core.size,
                orientation: creature.core.orientation,
                state: creature.core.state,
                color: creature.core.color,
                mutable: creature.mutable.clone(),
                acceleration: creature.motion.acceleration,
                acceleration_angle: creature.motion.acceleration_angle,
                rotational_acceleration: creature.motion.rotational_acceleration,
                velocity: creature.motion.velocity,
                velocity_angle: creature.motion.velocity_angle,
                rotational_velocity: creature.motion.rotational_velocity,
                age: creature.age,
                health: creature.health,
                energy: creature.energy,
                generation: creature.generation,
                genome: creature.genome.clone(),
            })
            .collect();

        Self {
            width: data.environment.width(),
            height: data.environment.height(),
            food_density: data.environment.food_density_scale(),
            creature_density: data.environment.creature_density(),
            world_time: data.world_time,
            food,
            eggs,
            creatures,
        }
    }

    /// Rebuild live simulation state. ID counters are fast-forwarded past
    /// everything in the snapshot so later allocations never collide.
    pub fn restore(&self) -> SimulationData {
        for genome in self
            .creatures
            .iter()
            .map(|c| &c.genome)
            .chain(self.eggs.iter().map(|e| &e.genome))
        {
            for neuron in genome.neurons() {
                ids::bump_neuron_id(neuron.id());
            }
            for link in genome.links() {
                ids::bump_link_id(link.id());
            }
        }

        let environment = Environment::with_densities(
            self.width,
            self.height,
            self.food_density,
            self.creature_density,
        );
        let mut data = SimulationData::new(environment);
        data.world_time = self.world_time;

        for record in &self.food {
            let position = glam::dvec2(record.x, record.y);
            let mut item = match record.kind {
                FoodKind::Plant => Food::plant(position),
                FoodKind::Meat => Food::meat(position, record.size),
                FoodKind::Egg => Food::egg_remains(position, record.size),
            };
            item.nutritional_value = record.nutritional_value;
            item.core.size = record.size;
            item.core.orientation = record.orientation;
            item.core.state = record.state;
            item.core.color = record.color;
            item.age = record.age;
            item.lifespan = record.lifespan;
            data.food.push(item);
        }

        for record in &self.eggs {
            let gestating = GestatingEgg {
                genome: record.genome.clone(),
                mutable: record.mutable.clone(),
                generation: record.generation,
                age: record.age,
                incubation_time: record.incubation_time,
            };
            let mut egg = Egg::new(gestating, glam::dvec2(record.x, record.y));
            egg.health = record.health;
            data.eggs.push(egg);
        }

        for record in &self.creatures {
            let mut creature = Creature::new(
                record.genome.clone(),
                record.mutable.clone(),
                glam::dvec2(record.x, record.y),
            );
            ids::bump_entity_id(record.id);
            creature.core.id = record.id;
            creature.core.size = record.size;
            creature.core.orientation = record.orientation;
            creature.core.state = record.state;
            creature.core.color = record.color;
            creature.motion.acceleration = record.acceleration;
            creature.motion.acceleration_angle = record.acceleration_angle;
            creature.motion.rotational_acceleration = record.rotational_acceleration;
            creature.motion.velocity = record.velocity;
            creature.motion.velocity_angle = record.velocity_angle;
            creature.motion.rotational_velocity = record.rotational_velocity;
            creature.age = record.age;
            creature.health = record.health;
            creature.energy = record.energy;
            creature.generation = record.generation;
            creature
                .digestion
                .refresh_for_size(&creature.mutable, creature.core.size);
            data.creatures.push(creature);
        }

        data
    }
}

pub fn write_json(path: impl AsRef<Path>, data: &SimulationData) -> Result<(), SimError> {
    let snapshot = SimulationSnapshot::capture(data);
    let text = serde_json::to_string_pretty(&snapshot).map_err(|e| SimError::Schema(e.to_string()))?;
    std::fs::write(path.as_ref(), text)?;
    log::info!("wrote simulation snapshot to {}", path.as_ref().display());
    Ok(())
}

pub fn read_json(path: impl AsRef<Path>) -> Result<SimulationData, SimError> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let snapshot: SimulationSnapshot =
        serde_json::from_str(&text).map_err(|e| SimError::Schema(e.to_string()))?;
    Ok(snapshot.restore())
}

pub fn write_binary(path: impl AsRef<Path>, data: &SimulationData) -> Result<(), SimError> {
    let snapshot = SimulationSnapshot::capture(data);
    let bytes = bincode::serialize(&snapshot).map_err(|e| SimError::Schema(e.to_string()))?;
    std::fs::write(path.as_ref(), bytes)?;
    Ok(())
}

pub fn read_binary(path: impl AsRef<Path>) -> Result<SimulationData, SimError> {
    let bytes = std::fs::read(path.as_ref())?;
    let snapshot: SimulationSnapshot =
        bincode::deserialize(&bytes).map_err(|e| SimError::Schema(e.to_string()))?;
    Ok(snapshot.restore())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neat;
    use glam::dvec2;

    fn sample_data() -> SimulationData {
        let mut data =
            SimulationData::new(Environment::with_densities(500.0, 400.0, 2e-4, 3e-4));
        data.world_time = 12.5;

        data.food.push(Food::plant(dvec2(10.0, 20.0)));
        data.food.push(Food::meat(dvec2(30.0, 40.0), 4.0));

        let mut creature = Creature::new(
            neat::minimally_viable_genome(),
            Mutable::default(),
            dvec2(100.0, 100.0),
        );
        creature.energy = 42.0;
        creature.generation = 9;
        creature.motion.velocity = 3.5;
        data.creatures.push(creature);

        data.eggs.push(Egg::new(
            GestatingEgg {
                genome: Genome::new(12, 6),
                mutable: Mutable::default(),
                generation: 4,
                age: 1.0,
                incubation_time: 8.0,
            },
            dvec2(200.0, 200.0),
        ));
        data
    }

    #[test]
    fn snapshot_round_trip_preserves_the_population() {
        let data = sample_data();
        let snapshot = SimulationSnapshot::capture(&data);
        let restored = snapshot.restore();

        assert_eq!(restored.food.len(), 2);
        assert_eq!(restored.creatures.len(), 1);
        assert_eq!(restored.eggs.len(), 1);
        assert_eq!(restored.world_time, 12.5);

        let creature = &restored.creatures[0];
        assert_eq!(creature.core.id, data.creatures[0].core.id);
        assert_eq!(creature.energy, 42.0);
        assert_eq!(creature.generation, 9);
        assert_eq!(creature.motion.velocity, 3.5);
        assert_eq!(
            creature.genome.neurons().len(),
            data.creatures[0].genome.neurons().len()
        );
        assert_eq!(restored.eggs[0].gestating.generation, 4);
    }

    #[test]
    fn serialization_is_byte_stable_after_a_round_trip() {
        let data = sample_data();
        let snapshot = SimulationSnapshot::capture(&data);
        let first = serde_json::to_string(&snapshot).unwrap();

        let reparsed: SimulationSnapshot = serde_json::from_str(&first).unwrap();
        let second = serde_json::to_string(&SimulationSnapshot::capture(&reparsed.restore())).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn genome_ids_resolve_after_restore() {
        let data = sample_data();
        let restored = SimulationSnapshot::capture(&data).restore();
        let genome = &restored.creatures[0].genome;
        for link in genome.links() {
            assert!(genome.find_neuron(link.in_id()).is_some());
            assert!(genome.find_neuron(link.out_id()).is_some());
        }
    }

    #[test]
    fn restored_id_counters_do_not_collide() {
        let data = sample_data();
        let restored = SimulationSnapshot::capture(&data).restore();
        let max_neuron = restored.creatures[0]
            .genome
            .neurons()
            .iter()
            .map(|n| n.id())
            .max()
            .unwrap();
        let fresh = crate::neat::Neuron::new(crate::neat::NeuronKind::Hidden, 0.0);
        assert!(fresh.id() > max_neuron);
    }

    #[test]
    fn json_file_round_trip() {
        let dir = std::env::temp_dir().join("biosphere-schema-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("snapshot.json");

        let data = sample_data();
        write_json(&path, &data).unwrap();
        let restored = read_json(&path).unwrap();
        assert_eq!(restored.creatures.len(), 1);
        assert_eq!(restored.food.len(), 2);

        std::fs::remove_file(&path).ok();
    }
}
