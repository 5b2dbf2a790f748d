//! Toroidal geometry primitives.
//!
//! Positions live on a rectangle with opposite edges identified; every
//! distance and direction uses the shorter wrap. `OrientedAngle` keeps angle
//! values normalized to `[-pi, pi)` across arithmetic, which is what the
//! vision cone tests rely on.

use glam::DVec2;

use crate::config::settings;

pub const TAU: f64 = std::f64::consts::TAU;
pub const PI: f64 = std::f64::consts::PI;

/// Wrap a position into `[0, width) x [0, height)`.
pub fn wrap(pos: DVec2, width: f64, height: f64) -> DVec2 {
    DVec2::new(pos.x.rem_euclid(width), pos.y.rem_euclid(height))
}

/// Shortest displacement from `from` to `to` on the torus.
pub fn toroidal_delta(from: DVec2, to: DVec2, width: f64, height: f64) -> DVec2 {
    let mut d = to - from;
    if d.x > width * 0.5 {
        d.x -= width;
    } else if d.x < -width * 0.5 {
        d.x += width;
    }
    if d.y > height * 0.5 {
        d.y -= height;
    } else if d.y < -height * 0.5 {
        d.y += height;
    }
    d
}

/// Shortest distance between two points on the torus.
pub fn toroidal_distance(a: DVec2, b: DVec2, width: f64, height: f64) -> f64 {
    let dx = (a.x - b.x).abs();
    let dy = (a.y - b.y).abs();
    f64::hypot(dx.min(width - dx), dy.min(height - dy))
}

fn normalize_angle(angle: f64) -> f64 {
    (angle + PI).rem_euclid(TAU) - PI
}

/// An angle kept in `[-pi, pi)` through every operation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrientedAngle {
    angle: f64,
}

impl OrientedAngle {
    pub fn new(angle: f64) -> Self {
        Self {
            angle: normalize_angle(angle),
        }
    }

    /// Direction from one point to another, taking the shortest wrap on both
    /// axes before the `atan2`.
    pub fn between(from: DVec2, to: DVec2, width: f64, height: f64) -> Self {
        let d = toroidal_delta(from, to, width, height);
        Self::new(d.y.atan2(d.x))
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn add(&self, other: OrientedAngle) -> Self {
        Self::new(self.angle + other.angle)
    }

    pub fn sub(&self, other: OrientedAngle) -> Self {
        Self::new(self.angle - other.angle)
    }

    /// Minimum circular distance to the cone spanned from `left` to `right`;
    /// zero when the angle lies inside the cone.
    pub fn distance_to_cone(&self, left: OrientedAngle, right: OrientedAngle) -> f64 {
        let l = left.angle;
        let r = right.angle;

        if l < r && (l <= self.angle && self.angle <= r) {
            return 0.0;
        }
        if r < l && (self.angle <= r || l <= self.angle) {
            return 0.0;
        }

        let to_left = (self.angle - l).abs();
        let to_left = to_left.min(TAU - to_left);
        let to_right = (self.angle - r).abs();
        let to_right = to_right.min(TAU - to_right);
        to_left.min(to_right)
    }

    pub fn is_inside_cone(&self, left: OrientedAngle, right: OrientedAngle) -> bool {
        self.distance_to_cone(left, right) < settings().engine.eps
    }
}

/// Conservative overlap test between a grid cell and a vision cone, used to
/// prune the sensor BFS. False positives are fine; false negatives are not,
/// so the cell's diagonal and the largest possible entity size pad every
/// comparison.
#[allow(clippy::too_many_arguments)]
pub fn is_grid_cell_potentially_inside_cone(
    cell_origin: DVec2,
    cell_size: f64,
    cone_center: DVec2,
    cone_radius: f64,
    left: OrientedAngle,
    right: OrientedAngle,
    width: f64,
    height: f64,
) -> bool {
    let eps = settings().engine.eps;
    let max_entity = settings().environment.max_food_size;
    let distance = toroidal_distance(cell_origin, cone_center, width, height);
    if distance < eps {
        return true;
    }
    let max_distance_in_cell = std::f64::consts::SQRT_2 * cell_size;
    if distance > cone_radius + max_distance_in_cell + max_entity + eps {
        return false;
    }
    let cell_angle = OrientedAngle::between(cone_center, cell_origin, width, height);
    let angle_distance = cell_angle.distance_to_cone(left, right);
    if angle_distance.sin() > (max_distance_in_cell + max_entity) / distance + eps {
        return false;
    }
    true
}

/// Every integer cell a segment touches. On an exact diagonal crossing both
/// orthogonal cells are emitted, so the cover has no gaps for sensors that
/// trace through cell corners.
pub fn supercover_line(x0: i32, y0: i32, x1: i32, y1: i32) -> Vec<(i32, i32)> {
    let dx = x1 - x0;
    let dy = y1 - y0;
    let nx = dx.abs() as i64;
    let ny = dy.abs() as i64;
    let sign_x = if dx > 0 { 1 } else { -1 };
    let sign_y = if dy > 0 { 1 } else { -1 };

    let mut x = x0;
    let mut y = y0;
    let mut line = Vec::with_capacity((nx + ny + 1) as usize);
    line.push((x, y));

    let mut ix: i64 = 0;
    let mut iy: i64 = 0;
    while ix < nx || iy < ny {
        // compare (0.5 + ix) / nx against (0.5 + iy) / ny without dividing
        let horizontal = (1 + 2 * ix) * ny;
        let vertical = (1 + 2 * iy) * nx;
        if horizontal == vertical {
            // corner crossing: cover both orthogonal neighbours
            line.push((x + sign_x, y));
            line.push((x, y + sign_y));
            x += sign_x;
            y += sign_y;
            ix += 1;
            iy += 1;
        } else if horizontal < vertical {
            x += sign_x;
            ix += 1;
        } else {
            y += sign_y;
            iy += 1;
        }
        line.push((x, y));
    }
    line
}
