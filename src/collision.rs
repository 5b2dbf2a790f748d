//! Collision pass: pairwise detection over the grid, parallel per cell,
//! followed by serialized dispatch of the mutating callbacks keyed on the
//! entity-kind pair.

use std::collections::HashSet;

use rayon::prelude::*;

use crate::config::settings;
use crate::entity::{resolve_overlap, EntityCore, EntityKind, EntityRef};
use crate::grid::EntityGrid;
use crate::simulation::SimulationData;

fn core_of<'a>(data: &'a SimulationData, entry: EntityRef) -> Option<&'a EntityCore> {
    let index = entry.index as usize;
    match entry.kind {
        EntityKind::Creature => data.creatures.get(index).map(|c| &c.core),
        EntityKind::Food => data.food.get(index).map(|f| &f.core),
        EntityKind::Egg => data.eggs.get(index).map(|e| &e.core),
        EntityKind::Pheromone => data.pheromones.get(index).map(|p| &p.core),
    }
}

fn order_key(entry: EntityRef) -> (u8, u32) {
    let kind = match entry.kind {
        EntityKind::Creature => 0,
        EntityKind::Food => 1,
        EntityKind::Egg => 2,
        EntityKind::Pheromone => 3,
    };
    (kind, entry.index)
}

/// Detect all colliding pairs. Parallel over grid cells; each entity scans
/// the neighbor layers its own size requires. Pheromones are scent markers,
/// not bodies, and never collide.
pub fn detect_collision_pairs(
    data: &SimulationData,
    grid: &EntityGrid,
) -> Vec<(EntityRef, EntityRef)> {
    let tolerance = settings().environment.tolerance;
    let width = data.environment.width();
    let height = data.environment.height();
    let cell_size = grid.cell_size();
    let cols = grid.cols();

    let pairs: HashSet<(EntityRef, EntityRef)> = (0..cols * grid.rows())
        .into_par_iter()
        .flat_map_iter(|cell_index| {
            let cell = (cell_index % cols, cell_index / cols);
            let mut found = Vec::new();
            for &entry in grid.entities_at(cell) {
                if entry.kind == EntityKind::Pheromone {
                    continue;
                }
                let Some(core) = core_of(data, entry) else {
                    continue;
                };
                if !core.is_alive() {
                    continue;
                }

                let layer = 2 * (core.size / cell_size).ceil() as i32;
                for neighbor in grid.neighbors((cell.0 as i32, cell.1 as i32), layer) {
                    for &other in grid.entities_at(neighbor) {
                        if other.kind == EntityKind::Pheromone
                            || order_key(other) <= order_key(entry)
                        {
                            continue;
                        }
                        let Some(other_core) = core_of(data, other) else {
                            continue;
                        };
                        if !other_core.is_alive() {
                            continue;
                        }
                        if core.collides_with(other_core, tolerance, width, height) {
                            found.push((entry, other));
                        }
                    }
                }
            }
            found
        })
        .collect();

    let mut pairs: Vec<_> = pairs.into_iter().collect();
    pairs.sort_by_key(|&(a, b)| (order_key(a), order_key(b)));
    pairs
}

/// Run the full collision pass: detect in parallel, then apply the mutating
/// callbacks one pair at a time.
pub fn check_collisions(data: &mut SimulationData, grid: &EntityGrid) {
    let pairs = detect_collision_pairs(data, grid);
    let width = data.environment.width();
    let height = data.environment.height();
    for (a, b) in pairs {
        dispatch(data, a, b, width, height);
    }
}

fn dispatch(data: &mut SimulationData, a: EntityRef, b: EntityRef, width: f64, height: f64) {
    match (a.kind, b.kind) {
        (EntityKind::Creature, EntityKind::Food) => {
            creature_meets_food(data, a.index as usize, b.index as usize, width, height);
        }
        (EntityKind::Food, EntityKind::Creature) => {
            creature_meets_food(data, b.index as usize, a.index as usize, width, height);
        }
        (EntityKind::Creature, EntityKind::Egg) => {
            creature_meets_egg(data, a.index as usize, b.index as usize, width, height);
        }
        (EntityKind::Egg, EntityKind::Creature) => {
            creature_meets_egg(data, b.index as usize, a.index as usize, width, height);
        }
        _ => {
            if let Some((core_a, core_b)) = core_pair_mut(data, a, b) {
                if core_a.is_alive() && core_b.is_alive() {
                    resolve_overlap(core_a, core_b, width, height);
                }
            }
        }
    }
}

/// Creature-food contact: a hungry creature with its jaw ready takes a bite,
/// anything else is an ordinary shove.
fn creature_meets_food(
    data: &mut SimulationData,
    creature_index: usize,
    food_index: usize,
    width: f64,
    height: f64,
) {
    let SimulationData {
        creatures, food, ..
    } = data;
    let (Some(creature), Some(item)) = (creatures.get_mut(creature_index), food.get_mut(food_index))
    else {
        return;
    };
    if !creature.core.is_alive() || !item.core.is_alive() {
        return;
    }

    if creature.wants_to_bite && creature.digestion.eating_cooldown <= 0.0 {
        creature.bite(item);
    } else {
        resolve_overlap(&mut creature.core, &mut item.core, width, height);
    }
}

/// Creature-egg contact: a biting jaw cracks the shell, leaving edible
/// remains where the egg was; otherwise the two just push apart.
fn creature_meets_egg(
    data: &mut SimulationData,
    creature_index: usize,
    egg_index: usize,
    width: f64,
    height: f64,
) {
    let SimulationData {
        creatures,
        eggs,
        food,
        ..
    } = data;
    let (Some(creature), Some(egg)) = (creatures.get_mut(creature_index), eggs.get_mut(egg_index))
    else {
        return;
    };
    if !creature.core.is_alive() || !egg.core.is_alive() {
        return;
    }

    if creature.wants_to_bite && creature.digestion.eating_cooldown <= 0.0 {
        let position = egg.core.position;
        let size = egg.core.size;
        egg.break_open();
        food.push(crate::food::Food::egg_remains(position, size));
    } else {
        resolve_overlap(&mut creature.core, &mut egg.core, width, height);
    }
}

fn pair_in_slice<T>(slice: &mut [T], i: usize, j: usize) -> Option<(&mut T, &mut T)> {
    if i == j || i >= slice.len() || j >= slice.len() {
        return None;
    }
    if i < j {
        let (left, right) = slice.split_at_mut(j);
        Some((&mut left[i], &mut right[0]))
    } else {
        let (left, right) = slice.split_at_mut(i);
        Some((&mut right[0], &mut left[j]))
    }
}

fn core_pair_mut<'a>(
    data: &'a mut SimulationData,
    a: EntityRef,
    b: EntityRef,
) -> Option<(&'a mut EntityCore, &'a mut EntityCore)> {
    let ai = a.index as usize;
    let bi = b.index as usize;
    if a.kind == b.kind {
        return match a.kind {
            EntityKind::Creature => {
                let (x, y) = pair_in_slice(&mut data.creatures, ai, bi)?;
                Some((&mut x.core, &mut y.core))
            }
            EntityKind::Food => {
                let (x, y) = pair_in_slice(&mut data.food, ai, bi)?;
                Some((&mut x.core, &mut y.core))
            }
            EntityKind::Egg => {
                let (x, y) = pair_in_slice(&mut data.eggs, ai, bi)?;
                Some((&mut x.core, &mut y.core))
            }
            EntityKind::Pheromone => None,
        };
    }

    // the remaining cross-kind case: food and eggs live in different
    // vectors, so the borrows are disjoint
    let SimulationData { food, eggs, .. } = data;
    match (a.kind, b.kind) {
        (EntityKind::Food, EntityKind::Egg) => {
            Some((&mut food.get_mut(ai)?.core, &mut eggs.get_mut(bi)?.core))
        }
        (EntityKind::Egg, EntityKind::Food) => {
            Some((&mut eggs.get_mut(ai)?.core, &mut food.get_mut(bi)?.core))
        }
        _ => None,
    }
}
