//! Base entity record and the movable-entity physics.
//!
//! Every simulated object carries an [`EntityCore`]; things that move carry a
//! [`Motion`] on top. Positions are toroidal and re-wrapped after every
//! write. Velocities and accelerations are polar: a magnitude plus an angle
//! relative to the entity's orientation.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::geometry::{self, OrientedAngle};
use crate::ids;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityState {
    Alive,
    Dead,
}

/// Tag used by the grid and the collision dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Creature,
    Food,
    Egg,
    Pheromone,
}

/// Non-owning handle into the `SimulationData` vectors, valid between two
/// grid refreshes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub index: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityCore {
    pub id: u64,
    pub position: DVec2,
    pub orientation: f64,
    pub size: f64,
    /// Color hue in [0, 1).
    pub color: f64,
    pub state: EntityState,
}

impl EntityCore {
    pub fn new(position: DVec2, size: f64) -> Self {
        Self {
            id: ids::next_entity_id(),
            position,
            orientation: 0.0,
            size,
            color: 0.0,
            state: EntityState::Alive,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.state == EntityState::Alive
    }

    pub fn die(&mut self) {
        self.state = EntityState::Dead;
    }

    /// Write a position, reduced modulo the map dimensions.
    pub fn set_position(&mut self, position: DVec2, width: f64, height: f64) {
        self.position = geometry::wrap(position, width, height);
    }

    pub fn distance_to(&self, other: &EntityCore, width: f64, height: f64) -> f64 {
        geometry::toroidal_distance(self.position, other.position, width, height)
    }

    /// Direction towards `other`, expressed relative to this entity's
    /// orientation and normalized to `[-pi, pi)`.
    pub fn relative_orientation(&self, other: &EntityCore, width: f64, height: f64) -> f64 {
        let direction = OrientedAngle::between(self.position, other.position, width, height);
        direction.sub(OrientedAngle::new(self.orientation)).angle()
    }

    pub fn collides_with(
        &self,
        other: &EntityCore,
        tolerance: f64,
        width: f64,
        height: f64,
    ) -> bool {
        self.distance_to(other, width, height) < self.size + other.size + tolerance
    }
}

/// Push the smaller of two overlapping entities along the center-to-center
/// axis until they just touch. Coincident centers are left untouched; the
/// next tick's movement separates them.
pub fn resolve_overlap(a: &mut EntityCore, b: &mut EntityCore, width: f64, height: f64) {
    let distance = a.distance_to(b, width, height);
    if distance <= f64::EPSILON {
        return;
    }
    let overlap = a.size + b.size - distance;
    if overlap <= 0.0 {
        return;
    }

    if a.size < b.size {
        let away = geometry::toroidal_delta(b.position, a.position, width, height) / distance;
        let target = a.position + away * overlap;
        a.set_position(target, width, height);
    } else {
        let away = geometry::toroidal_delta(a.position, b.position, width, height) / distance;
        let target = b.position + away * overlap;
        b.set_position(target, width, height);
    }
}

/// Kinematic state of a movable entity.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Motion {
    pub acceleration: f64,
    /// Angle of the applied acceleration relative to the orientation.
    pub acceleration_angle: f64,
    pub rotational_acceleration: f64,
    pub velocity: f64,
    /// Angle of the velocity relative to the orientation.
    pub velocity_angle: f64,
    pub rotational_velocity: f64,
    pub strafing_difficulty: f64,
    pub frictional_coefficient: f64,
}

impl Motion {
    pub fn forward_friction(&self) -> f64 {
        self.frictional_coefficient * self.velocity
    }

    pub fn rotational_friction(&self) -> f64 {
        self.frictional_coefficient * self.rotational_velocity
    }

    /// Acceleration decomposed relative to the orientation; the sideways
    /// component is harder to apply the clumsier the body is at strafing.
    pub fn effective_acceleration_components(&self) -> (f64, f64) {
        let parallel = self.acceleration * self.acceleration_angle.cos();
        let perpendicular =
            self.acceleration * self.acceleration_angle.sin() / (1.0 + self.strafing_difficulty);
        (parallel, perpendicular)
    }

    pub fn effective_forward_acceleration(&self) -> f64 {
        let (parallel, perpendicular) = self.effective_acceleration_components();
        f64::hypot(parallel, perpendicular)
    }

    pub fn effective_acceleration_angle(&self) -> f64 {
        let (parallel, perpendicular) = self.effective_acceleration_components();
        perpendicular.atan2(parallel)
    }

    /// Integrate the linear and rotational velocities over `dt`. Friction of
    /// magnitude `mu * v` acts against the current velocity direction and is
    /// clamped so it can stop the body but never reverse it.
    pub fn update_velocities(&mut self, dt: f64) {
        let damped_speed = if self.forward_friction() * dt >= self.velocity {
            0.0
        } else {
            self.velocity - self.forward_friction() * dt
        };

        let (accel_par, accel_perp) = self.effective_acceleration_components();
        let vx = damped_speed * self.velocity_angle.cos() + accel_par * dt;
        let vy = damped_speed * self.velocity_angle.sin() + accel_perp * dt;

        let speed = f64::hypot(vx, vy);
        if speed > 1e-12 {
            self.velocity_angle = OrientedAngle::new(vy.atan2(vx)).angle();
        }
        self.velocity = speed;

        let damped_spin = if (self.rotational_friction() * dt).abs() >= self.rotational_velocity.abs()
        {
            0.0
        } else {
            self.rotational_velocity - self.rotational_friction() * dt
        };
        self.rotational_velocity = damped_spin + self.rotational_acceleration * dt;
    }
}

/// One physics tick: integrate velocities, spin the orientation, advance the
/// position along the world-frame velocity direction, and wrap.
pub fn integrate(core: &mut EntityCore, motion: &mut Motion, dt: f64, width: f64, height: f64) {
    motion.update_velocities(dt);

    core.orientation =
        OrientedAngle::new(core.orientation + motion.rotational_velocity * dt).angle();

    let heading = motion.velocity_angle + core.orientation;
    let step = DVec2::new(heading.cos(), heading.sin()) * motion.velocity * dt;
    let target = core.position + step;
    core.set_position(target, width, height);
}
