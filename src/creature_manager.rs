//! Per-tick creature orchestration: egg aging, the parallel creature update
//! with per-worker output buffers, hatching, and the compatibility-based
//! reproduction pairing.

use std::collections::HashMap;

use glam::dvec2;
use rayon::prelude::*;

use crate::creature::{Creature, CreatureTickOutput};
use crate::error::SimError;
use crate::grab;
use crate::grid::EntityGrid;
use crate::mutable::Mutable;
use crate::neat;
use crate::random;
use crate::simulation::SimulationData;

/// Scatter the founding population over the map. Every founder shares the
/// minimally viable reflex genome; their trait vectors start well spread by
/// repeated mutation.
pub fn initialize_creatures(data: &mut SimulationData) {
    data.creatures.clear();
    let base_genome = neat::minimally_viable_genome();
    let density = data.environment.creature_density();
    let width = data.environment.width();
    let height = data.environment.height();

    let mut x = 0.0;
    while x < width {
        let mut y = 0.0;
        while y < height {
            if random::bernoulli(density) {
                let mut mutable = Mutable::default();
                for _ in 0..40 {
                    mutable.mutate();
                }
                let position = dvec2(
                    random::uniform_real(0.0, width),
                    random::uniform_real(0.0, height),
                );
                let mut creature = Creature::new(base_genome.clone(), mutable, position);
                creature.core.orientation =
                    random::uniform_real(-std::f64::consts::PI, std::f64::consts::PI);
                data.creatures.push(creature);
            }
            y += 2.0;
        }
        x += 2.0;
    }
    log::info!("seeded {} creatures", data.creatures.len());
}

/// One creature phase: age the eggs, rigidify grab chains, then update every
/// creature in parallel and merge the buffered side effects at the barrier.
pub fn update_all_creatures(data: &mut SimulationData, grid: &EntityGrid, dt: f64) {
    data.eggs.par_iter_mut().for_each(|egg| egg.update(dt));

    apply_grab_chains(data);

    let SimulationData {
        creatures,
        food,
        pheromones,
        eggs,
        environment,
        new_reproduce,
        ..
    } = data;
    let food: &[crate::food::Food] = food;
    let pheromones_view: &[crate::pheromone::Pheromone] = pheromones;
    let environment: &crate::environment::Environment = environment;

    let outputs: Vec<(usize, CreatureTickOutput)> = creatures
        .par_iter_mut()
        .enumerate()
        .map(|(index, creature)| {
            if creature.core.is_alive() {
                (
                    index,
                    creature.update(dt, grid, food, pheromones_view, environment),
                )
            } else {
                (index, CreatureTickOutput::default())
            }
        })
        .collect();

    for (index, output) in outputs {
        if let Some(egg) = output.laid_egg {
            eggs.push(egg);
        }
        pheromones.extend(output.emissions);
        if output.wants_to_mate {
            let creature = &mut creatures[index];
            let already_queued = creature.male.state.waiting_to_reproduce
                || creature.female.state.waiting_to_reproduce;
            if !already_queued {
                new_reproduce.push_back(creature.core.id);
                creature.male.state.waiting_to_reproduce = true;
                creature.female.state.waiting_to_reproduce = true;
            }
        }
    }
}

/// Treat every linked group as a rigid body for this tick, using the
/// accelerations the members settled on last tick.
fn apply_grab_chains(data: &mut SimulationData) {
    let linked: Vec<usize> = data
        .creatures
        .iter()
        .enumerate()
        .filter(|(_, c)| c.core.is_alive() && c.grab.is_linked())
        .map(|(index, _)| index)
        .collect();
    if linked.is_empty() {
        return;
    }

    let width = data.environment.width();
    let height = data.environment.height();
    let mut claimed = vec![false; data.creatures.len()];
    for start in linked {
        if claimed[start] {
            continue;
        }
        let chain = grab::resolve_chain(&data.creatures, start);
        for &member in &chain.members {
            claimed[member] = true;
        }
        chain.apply(&mut data.creatures, width, height);
    }
}

/// Hatch every egg whose incubation is complete into a creature at the same
/// position.
pub fn hatch_eggs(data: &mut SimulationData) -> Result<(), SimError> {
    let mut hatched = Vec::new();
    for egg in data.eggs.iter_mut() {
        if egg.ready_to_hatch() {
            hatched.push(egg.hatch()?);
        }
    }
    if !hatched.is_empty() {
        log::debug!("hatched {} creatures", hatched.len());
        data.creatures.append(&mut hatched);
    }
    data.eggs.retain(|egg| egg.core.is_alive());
    Ok(())
}

/// Drain the pending-father queue against the pending-mother queue. Every
/// father scans the mothers for the first compatible, ready partner; matched
/// pairs mate, everyone else rolls over to the next tick.
pub fn reproduce_creatures(data: &mut SimulationData) -> Result<(), SimError> {
    let index_of: HashMap<u64, usize> = data
        .creatures
        .iter()
        .enumerate()
        .map(|(index, c)| (c.core.id, index))
        .collect();

    let mut unmatched_fathers = std::collections::VecDeque::new();

    while let Some(father_id) = data.reproduce.pop_front() {
        let Some(&father) = index_of.get(&father_id) else {
            continue;
        };

        let mut paired = false;
        let mut unmatched_mothers = std::collections::VecDeque::new();
        while let Some(mother_id) = data.new_reproduce.pop_front() {
            let Some(&mother) = index_of.get(&mother_id) else {
                continue;
            };
            if mother == father {
                unmatched_mothers.push_back(mother_id);
                continue;
            }

            let compatible = data.creatures[father].compatible_with(&data.creatures[mother]);
            let both_ready = data.creatures[father].ready_to_procreate_as_male()
                && data.creatures[mother].ready_to_procreate_as_female();
            if compatible && both_ready {
                mate_pair(data, father, mother)?;
                paired = true;
                break;
            }
            unmatched_mothers.push_back(mother_id);
        }
        // unpaired mothers stay available for the next father
        while let Some(mother_id) = unmatched_mothers.pop_front() {
            data.new_reproduce.push_back(mother_id);
        }

        if !paired {
            unmatched_fathers.push_back(father_id);
        }
    }

    // unmatched mothers try as fathers next tick; unmatched fathers re-queue
    while let Some(mother_id) = data.new_reproduce.pop_front() {
        data.reproduce.push_back(mother_id);
    }
    while let Some(father_id) = unmatched_fathers.pop_front() {
        data.reproduce.push_back(father_id);
    }
    Ok(())
}

fn mate_pair(data: &mut SimulationData, father: usize, mother: usize) -> Result<(), SimError> {
    let father_seed = data.creatures[father].parent_seed();
    let mother_seed = data.creatures[mother].parent_seed();

    data.creatures[mother]
        .female
        .conceive(&father_seed, &mother_seed)?;
    data.creatures[mother].male.state.waiting_to_reproduce = false;
    data.creatures[mother].female.state.waiting_to_reproduce = false;

    data.creatures[father].male_after_mate();
    data.creatures[father].female.state.waiting_to_reproduce = false;
    log::debug!(
        "mated creatures {} and {}",
        data.creatures[father].core.id,
        data.creatures[mother].core.id
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::egg::{Egg, GestatingEgg};
    use crate::environment::Environment;
    use crate::neat::Genome;

    fn world() -> (SimulationData, EntityGrid) {
        let data = SimulationData::new(Environment::with_densities(400.0, 400.0, 0.0, 0.0));
        let grid = EntityGrid::new(400.0, 400.0, 50.0);
        (data, grid)
    }

    fn mature_creature(data: &mut SimulationData, genome: Genome) -> usize {
        let mut creature = Creature::new(genome, Mutable::default(), dvec2(100.0, 100.0));
        creature.age = creature.male.state.maturity_age + 1.0;
        creature.male.state.ready_to_reproduce_at = 0.0;
        creature.female.state.ready_to_reproduce_at = 0.0;
        creature.energy = creature.max_energy;
        data.creatures.push(creature);
        data.creatures.len() - 1
    }

    #[test]
    fn compatible_queued_pair_produces_a_gestating_egg() {
        let (mut data, _grid) = world();
        let genome = Genome::new(12, 6);
        let father = mature_creature(&mut data, genome.clone());
        let mother = mature_creature(&mut data, genome);
        let father_id = data.creatures[father].core.id;
        let mother_id = data.creatures[mother].core.id;

        data.reproduce.push_back(father_id);
        data.new_reproduce.push_back(mother_id);
        let father_energy = data.creatures[father].energy;

        reproduce_creatures(&mut data).unwrap();

        assert!(data.creatures[mother].female.is_pregnant());
        assert!(data.creatures[father].energy < father_energy);
        assert!(data.reproduce.is_empty());
        assert!(data.new_reproduce.is_empty());
    }

    #[test]
    fn unmatched_creatures_roll_over_to_the_father_queue() {
        let (mut data, _grid) = world();
        let father = mature_creature(&mut data, Genome::new(12, 6));
        let father_id = data.creatures[father].core.id;
        data.reproduce.push_back(father_id);

        reproduce_creatures(&mut data).unwrap();

        assert_eq!(data.reproduce.len(), 1);
        assert_eq!(data.reproduce[0], father_id);
    }

    #[test]
    fn immature_mothers_are_skipped() {
        let (mut data, _grid) = world();
        let genome = Genome::new(12, 6);
        let father = mature_creature(&mut data, genome.clone());
        let father_id = data.creatures[father].core.id;

        let young = Creature::new(genome, Mutable::default(), dvec2(120.0, 100.0));
        let young_id = young.core.id;
        data.creatures.push(young);

        data.reproduce.push_back(father_id);
        data.new_reproduce.push_back(young_id);

        reproduce_creatures(&mut data).unwrap();

        assert!(!data.creatures[1].female.is_pregnant());
        // both wait for the next tick in the father queue
        assert_eq!(data.reproduce.len(), 2);
    }

    #[test]
    fn ready_eggs_hatch_into_creatures() {
        let (mut data, _grid) = world();
        data.eggs.push(Egg::new(
            GestatingEgg {
                genome: Genome::new(12, 6),
                mutable: Mutable::default(),
                generation: 7,
                age: 5.0,
                incubation_time: 5.0,
            },
            dvec2(77.0, 88.0),
        ));

        hatch_eggs(&mut data).unwrap();

        assert!(data.eggs.is_empty());
        assert_eq!(data.creatures.len(), 1);
        assert_eq!(data.creatures[0].generation, 7);
        assert_eq!(data.creatures[0].core.position, dvec2(77.0, 88.0));
    }

    #[test]
    fn unready_eggs_keep_incubating() {
        let (mut data, grid) = world();
        data.eggs.push(Egg::new(
            GestatingEgg {
                genome: Genome::new(12, 6),
                mutable: Mutable::default(),
                generation: 1,
                age: 0.0,
                incubation_time: 100.0,
            },
            dvec2(50.0, 50.0),
        ));

        update_all_creatures(&mut data, &grid, 0.5);
        hatch_eggs(&mut data).unwrap();

        assert_eq!(data.eggs.len(), 1);
        assert!(data.creatures.is_empty());
        assert_eq!(data.eggs[0].age(), 0.5);
    }

    #[test]
    fn update_merges_worker_buffers_into_the_queues() {
        let (mut data, grid) = world();
        // a full-term mother lays an egg during the update
        let genome = Genome::new(12, 6);
        let index = mature_creature(&mut data, genome);
        let father_seed = data.creatures[index].parent_seed();
        let mother_seed = data.creatures[index].parent_seed();
        data.creatures[index]
            .female
            .conceive(&father_seed, &mother_seed)
            .unwrap();
        if let Some(egg) = data.creatures[index].female.egg.as_mut() {
            egg.age = egg.incubation_time; // gestation complete
        }

        update_all_creatures(&mut data, &grid, 0.05);

        assert_eq!(data.eggs.len(), 1);
        assert!(!data.creatures[index].female.is_pregnant());
    }

    #[test]
    fn initialization_scales_with_creature_density() {
        let mut none = SimulationData::new(Environment::with_densities(200.0, 200.0, 0.0, 0.0));
        initialize_creatures(&mut none);
        assert!(none.creatures.is_empty());

        let mut some = SimulationData::new(Environment::with_densities(200.0, 200.0, 0.0, 0.05));
        initialize_creatures(&mut some);
        assert!(!some.creatures.is_empty());
    }
}
