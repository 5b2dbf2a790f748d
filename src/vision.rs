//! Vision cone queries: a breadth-first walk over grid cells pruned by a
//! conservative cone-overlap test, with a hard cell budget as the soft
//! failure mode. Creatures see food; the base senses track the closest
//! plant and the closest meat, and evolved vision modules add further
//! targets.

use std::collections::{HashSet, VecDeque};

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::config::settings;
use crate::entity::{EntityCore, EntityKind};
use crate::food::{Food, FoodKind};
use crate::geometry::{self, OrientedAngle};
use crate::grid::EntityGrid;
use crate::mutable::Mutable;
use crate::random;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VisionState {
    pub vision_radius: f64,
    pub vision_angle: f64,
    pub distance_plant: f64,
    pub orientation_plant: f64,
    pub plant_size: f64,
    pub distance_meat: f64,
    pub orientation_meat: f64,
    pub meat_size: f64,
}

impl VisionState {
    /// The sharper a creature sees, the narrower its field of view: the
    /// radius-angle product is a physical constant.
    pub fn new(mutable: &Mutable) -> Self {
        let radius = mutable.vision_factor;
        let angle = settings().physical_constraints.vision_ar_ratio / mutable.vision_factor;
        Self {
            vision_radius: radius,
            vision_angle: angle,
            distance_plant: radius,
            orientation_plant: 0.0,
            plant_size: -1.0,
            distance_meat: radius,
            orientation_meat: 0.0,
            meat_size: -1.0,
        }
    }

    fn cone(&self, core: &EntityCore) -> (OrientedAngle, OrientedAngle) {
        (
            OrientedAngle::new(core.orientation - self.vision_angle / 2.0),
            OrientedAngle::new(core.orientation + self.vision_angle / 2.0),
        )
    }
}

/// Whether a target's body is inside the cone or tangent to its edge.
pub fn is_in_vision_cone(
    core: &EntityCore,
    vision: &VisionState,
    target: &EntityCore,
    width: f64,
    height: f64,
) -> bool {
    let eps = settings().engine.eps;
    let (left, right) = vision.cone(core);
    let direction = OrientedAngle::between(core.position, target.position, width, height);
    let distance = geometry::toroidal_distance(core.position, target.position, width, height);

    if direction.is_inside_cone(left, right)
        && distance <= vision.vision_radius + target.size + eps
    {
        return true;
    }

    // edge grazing: part of the body pokes across the angular boundary
    let angle_distance = direction.distance_to_cone(left, right);
    angle_distance <= std::f64::consts::FRAC_PI_2
        && distance * angle_distance.sin() <= target.size + eps
        && distance * angle_distance.cos() <= vision.vision_radius + eps
}

fn cell_budget(vision: &VisionState, cell_size: f64) -> usize {
    let env = &settings().environment;
    let padded =
        vision.vision_radius + 2.0 * std::f64::consts::SQRT_2 * cell_size + env.max_food_size;
    let by_area = (std::f64::consts::PI * padded * padded / (cell_size * cell_size)) as usize;
    by_area.max(settings().engine.max_cells_to_find_food)
}

/// Walk the grid cells the cone could touch, breadth-first from the
/// creature's cell, calling `visit` on every entity reference found. The
/// walk stops when `visit` returns `false` or the cell budget runs out.
fn walk_cone_cells(
    core: &EntityCore,
    vision: &VisionState,
    grid: &EntityGrid,
    width: f64,
    height: f64,
    mut visit: impl FnMut(crate::entity::EntityRef) -> bool,
) {
    let (left, right) = vision.cone(core);
    let cell_size = grid.cell_size();
    let cols = grid.cols() as i32;
    let rows = grid.rows() as i32;
    let budget = cell_budget(vision, cell_size);

    let mut queue: VecDeque<(i32, i32)> = VecDeque::new();
    let mut seen: HashSet<(i32, i32)> = HashSet::new();

    let start = grid.cell_of(core.position);
    queue.push_back(start);
    seen.insert(start);

    // seed the boundary rays so a narrow cone cannot slip between the
    // 4-connected BFS frontier cells
    for boundary in [left, right] {
        let tip = core.position
            + DVec2::new(boundary.angle().cos(), boundary.angle().sin()) * vision.vision_radius;
        let tip_cell = (
            (tip.x / cell_size).floor() as i32,
            (tip.y / cell_size).floor() as i32,
        );
        for (x, y) in geometry::supercover_line(start.0, start.1, tip_cell.0, tip_cell.1) {
            let wrapped = (x.rem_euclid(cols), y.rem_euclid(rows));
            if seen.insert(wrapped) {
                queue.push_back(wrapped);
            }
        }
    }

    let mut processed = 0usize;
    while let Some(cell) = queue.pop_front() {
        processed += 1;
        if processed > budget {
            return;
        }

        for entry in grid.entities_at((cell.0 as usize, cell.1 as usize)) {
            if !visit(*entry) {
                return;
            }
        }

        for (dx, dy) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
            let next = ((cell.0 + dx).rem_euclid(cols), (cell.1 + dy).rem_euclid(rows));
            if seen.contains(&next) {
                continue;
            }
            let origin = DVec2::new(
                next.0 as f64 * cell_size,
                next.1 as f64 * cell_size,
            );
            if geometry::is_grid_cell_potentially_inside_cone(
                origin,
                cell_size,
                core.position,
                vision.vision_radius,
                left,
                right,
                width,
                height,
            ) {
                seen.insert(next);
                queue.push_back(next);
            }
        }
    }
}

/// Index of the closest visible food of the given kind, if any.
pub fn closest_food_in_sight(
    core: &EntityCore,
    vision: &VisionState,
    grid: &EntityGrid,
    foods: &[Food],
    kind: FoodKind,
    width: f64,
    height: f64,
) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    walk_cone_cells(core, vision, grid, width, height, |entry| {
        if entry.kind != EntityKind::Food {
            return true;
        }
        let index = entry.index as usize;
        let Some(food) = foods.get(index) else {
            return true;
        };
        if food.kind != kind || !food.core.is_alive() {
            return true;
        }
        if !is_in_vision_cone(core, vision, &food.core, width, height) {
            return true;
        }
        let distance =
            geometry::toroidal_distance(core.position, food.core.position, width, height);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((index, distance)),
        }
        // the first match ends the walk; BFS order approximates nearest-first
        best.is_none()
    });
    best.map(|(index, _)| index)
}

/// Up to `limit` visible foods of any kind, nearest first. Used to feed the
/// evolved vision modules beyond the base plant/meat channels.
pub fn foods_in_sight(
    core: &EntityCore,
    vision: &VisionState,
    grid: &EntityGrid,
    foods: &[Food],
    limit: usize,
    width: f64,
    height: f64,
) -> Vec<usize> {
    let mut found: Vec<(usize, f64)> = Vec::new();
    if limit == 0 {
        return Vec::new();
    }
    walk_cone_cells(core, vision, grid, width, height, |entry| {
        if entry.kind != EntityKind::Food {
            return true;
        }
        let index = entry.index as usize;
        let Some(food) = foods.get(index) else {
            return true;
        };
        if !food.core.is_alive() || !is_in_vision_cone(core, vision, &food.core, width, height) {
            return true;
        }
        let distance =
            geometry::toroidal_distance(core.position, food.core.position, width, height);
        found.push((index, distance));
        found.len() < limit
    });
    found.sort_by(|a, b| a.1.total_cmp(&b.1));
    found.into_iter().map(|(index, _)| index).collect()
}

/// Refresh the base plant/meat channels. When nothing is visible the
/// distance saturates at the vision radius and the reported direction is a
/// random glance inside the field of view.
pub fn process_vision(
    core: &EntityCore,
    vision: &mut VisionState,
    grid: &EntityGrid,
    foods: &[Food],
    width: f64,
    height: f64,
) {
    let half_angle = vision.vision_angle / 2.0;

    match closest_food_in_sight(core, vision, grid, foods, FoodKind::Plant, width, height) {
        Some(index) => {
            let plant = &foods[index];
            vision.distance_plant =
                core.distance_to(&plant.core, width, height) - plant.core.size;
            vision.orientation_plant = core.relative_orientation(&plant.core, width, height);
            vision.plant_size = plant.core.size;
        }
        None => {
            vision.distance_plant = vision.vision_radius;
            vision.orientation_plant = random::uniform_real(-half_angle, half_angle);
            vision.plant_size = -1.0;
        }
    }

    match closest_food_in_sight(core, vision, grid, foods, FoodKind::Meat, width, height) {
        Some(index) => {
            let meat = &foods[index];
            vision.distance_meat = core.distance_to(&meat.core, width, height) - meat.core.size;
            vision.orientation_meat = core.relative_orientation(&meat.core, width, height);
            vision.meat_size = meat.core.size;
        }
        None => {
            vision.distance_meat = vision.vision_radius;
            vision.orientation_meat = random::uniform_real(-half_angle, half_angle);
            vision.meat_size = -1.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::simulation::SimulationData;
    use glam::dvec2;

    fn world_with_foods(positions: &[(f64, f64, FoodKind)]) -> (SimulationData, EntityGrid) {
        let mut data = SimulationData::new(Environment::new(400.0, 400.0));
        for &(x, y, kind) in positions {
            let food = match kind {
                FoodKind::Plant => Food::plant(dvec2(x, y)),
                FoodKind::Meat => Food::meat(dvec2(x, y), 3.0),
                FoodKind::Egg => Food::egg_remains(dvec2(x, y), 3.0),
            };
            data.food.push(food);
        }
        let mut grid = EntityGrid::new(400.0, 400.0, 50.0);
        grid.refresh(&mut data);
        (data, grid)
    }

    fn looker_at(position: DVec2) -> (EntityCore, VisionState) {
        let mut core = EntityCore::new(position, 3.0);
        core.orientation = 0.0;
        let vision = VisionState {
            vision_radius: 120.0,
            vision_angle: std::f64::consts::FRAC_PI_2,
            distance_plant: 120.0,
            orientation_plant: 0.0,
            plant_size: -1.0,
            distance_meat: 120.0,
            orientation_meat: 0.0,
            meat_size: -1.0,
        };
        (core, vision)
    }

    #[test]
    fn sees_food_dead_ahead_but_not_behind() {
        let (data, grid) = world_with_foods(&[
            (250.0, 200.0, FoodKind::Plant),
            (100.0, 200.0, FoodKind::Plant),
        ]);
        let (core, vision) = looker_at(dvec2(200.0, 200.0));

        let seen =
            closest_food_in_sight(&core, &vision, &grid, &data.food, FoodKind::Plant, 400.0, 400.0)
                .expect("plant ahead is visible");
        assert!((data.food[seen].core.position.x - 250.0).abs() < 1e-9);
    }

    #[test]
    fn kind_filter_separates_plant_and_meat_channels() {
        let (data, grid) = world_with_foods(&[(240.0, 200.0, FoodKind::Meat)]);
        let (core, vision) = looker_at(dvec2(200.0, 200.0));

        assert!(closest_food_in_sight(
            &core,
            &vision,
            &grid,
            &data.food,
            FoodKind::Plant,
            400.0,
            400.0
        )
        .is_none());
        assert!(closest_food_in_sight(
            &core,
            &vision,
            &grid,
            &data.food,
            FoodKind::Meat,
            400.0,
            400.0
        )
        .is_some());
    }

    #[test]
    fn vision_wraps_across_the_map_seam() {
        let (data, grid) = world_with_foods(&[(10.0, 200.0, FoodKind::Plant)]);
        let (mut core, vision) = looker_at(dvec2(380.0, 200.0));
        core.orientation = 0.0; // facing +x, across the seam

        let seen =
            closest_food_in_sight(&core, &vision, &grid, &data.food, FoodKind::Plant, 400.0, 400.0);
        assert!(seen.is_some());
    }

    #[test]
    fn edge_grazing_bodies_count_as_visible() {
        let (mut core, vision) = looker_at(dvec2(200.0, 200.0));
        core.orientation = 0.0;
        // just outside the 45-degree half-angle, but the body is fat enough
        // to cross the boundary
        let angle: f64 = std::f64::consts::FRAC_PI_4 + 0.05;
        let mut target = EntityCore::new(
            dvec2(200.0 + angle.cos() * 50.0, 200.0 + angle.sin() * 50.0),
            6.0,
        );
        target.orientation = 0.0;
        assert!(is_in_vision_cone(&core, &vision, &target, 400.0, 400.0));

        // a tiny body at the same angle stays invisible
        target.size = 0.5;
        assert!(!is_in_vision_cone(&core, &vision, &target, 400.0, 400.0));
    }

    #[test]
    fn process_vision_reports_saturated_defaults_when_blind() {
        let (data, grid) = world_with_foods(&[]);
        let (core, mut vision) = looker_at(dvec2(200.0, 200.0));

        process_vision(&core, &mut vision, &grid, &data.food, 400.0, 400.0);

        assert_eq!(vision.distance_plant, vision.vision_radius);
        assert_eq!(vision.plant_size, -1.0);
        assert!(vision.orientation_plant.abs() <= vision.vision_angle / 2.0);
        assert_eq!(vision.meat_size, -1.0);
    }

    #[test]
    fn foods_in_sight_returns_nearest_first_up_to_limit() {
        let (data, grid) = world_with_foods(&[
            (230.0, 200.0, FoodKind::Plant),
            (260.0, 200.0, FoodKind::Meat),
            (290.0, 200.0, FoodKind::Plant),
        ]);
        let (core, vision) = looker_at(dvec2(200.0, 200.0));

        let seen = foods_in_sight(&core, &vision, &grid, &data.food, 2, 400.0, 400.0);
        assert_eq!(seen.len(), 2);
        let d0 =
            geometry::toroidal_distance(core.position, data.food[seen[0]].core.position, 400.0, 400.0);
        let d1 =
            geometry::toroidal_distance(core.position, data.food[seen[1]].core.position, 400.0, 400.0);
        assert!(d0 <= d1);
    }
}
