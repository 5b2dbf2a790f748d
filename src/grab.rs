//! Grab chains: creatures holding on to one another.
//!
//! The links are advisory ID references, never owning; a dead or despawned
//! node simply stops resolving and the chain shrinks around it. For one tick
//! the transitive closure over `grabbed` and `grabbed_by` is treated as a
//! rigid body: total mass, centre of mass and the aggregate accelerations
//! are computed over the members (weighted by size squared) and applied
//! uniformly to each of them.

use std::collections::HashMap;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::creature::Creature;
use crate::geometry;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GrabLinks {
    /// Entity ID of the creature this one is holding, if any.
    pub grabbed: Option<u64>,
    /// Entity IDs of the creatures holding this one.
    pub grabbed_by: Vec<u64>,
    pub grabbing: bool,
    pub affected_by_grabbed_entity: bool,
}

impl GrabLinks {
    pub fn is_linked(&self) -> bool {
        self.grabbed.is_some() || !self.grabbed_by.is_empty()
    }

    pub fn release(&mut self) {
        self.grabbed = None;
        self.grabbing = false;
    }

    pub fn drop_member(&mut self, id: u64) {
        if self.grabbed == Some(id) {
            self.release();
        }
        self.grabbed_by.retain(|&other| other != id);
    }
}

/// A read-only view of one grab chain, resolved for the current tick.
#[derive(Debug)]
pub struct GrabChain {
    /// Indices into the creature vector, start node included.
    pub members: Vec<usize>,
}

/// Transitive closure over `grabbed` and `grabbed_by` starting from
/// `start`, skipping IDs that no longer resolve to a live creature.
pub fn resolve_chain(creatures: &[Creature], start: usize) -> GrabChain {
    let by_id: HashMap<u64, usize> = creatures
        .iter()
        .enumerate()
        .filter(|(_, c)| c.core.is_alive())
        .map(|(index, c)| (c.core.id, index))
        .collect();

    let mut members = Vec::new();
    let mut queue = vec![start];
    while let Some(index) = queue.pop() {
        if members.contains(&index) {
            continue;
        }
        let creature = match creatures.get(index) {
            Some(c) if c.core.is_alive() => c,
            _ => continue,
        };
        members.push(index);

        if let Some(grabbed) = creature.grab.grabbed {
            if let Some(&next) = by_id.get(&grabbed) {
                queue.push(next);
            }
        }
        for grabber in &creature.grab.grabbed_by {
            if let Some(&next) = by_id.get(grabber) {
                queue.push(next);
            }
        }
    }

    GrabChain { members }
}

impl GrabChain {
    /// Sum of member masses; mass is size squared.
    pub fn total_mass(&self, creatures: &[Creature]) -> f64 {
        self.members
            .iter()
            .map(|&i| creatures[i].core.size.powi(2))
            .sum()
    }

    /// Mass-weighted centre of the chain. Member offsets are measured on the
    /// torus relative to the first member so a chain straddling the seam
    /// does not average to the middle of the map.
    pub fn centre_of_mass(&self, creatures: &[Creature], width: f64, height: f64) -> DVec2 {
        let origin = creatures[self.members[0]].core.position;
        let mut weighted = DVec2::ZERO;
        let mut mass = 0.0;
        for &i in &self.members {
            let m = creatures[i].core.size.powi(2);
            let offset =
                geometry::toroidal_delta(origin, creatures[i].core.position, width, height);
            weighted += offset * m;
            mass += m;
        }
        geometry::wrap(origin + weighted / mass, width, height)
    }

    /// Mass-weighted world-frame acceleration over the chain.
    pub fn total_forward_acceleration(&self, creatures: &[Creature]) -> DVec2 {
        let mut total = DVec2::ZERO;
        let mut mass = 0.0;
        for &i in &self.members {
            let c = &creatures[i];
            let m = c.core.size.powi(2);
            let angle = c.motion.acceleration_angle + c.core.orientation;
            total += DVec2::new(angle.cos(), angle.sin()) * (c.motion.acceleration * m);
            mass += m;
        }
        total / mass
    }

    /// Mass-weighted rotational acceleration over the chain, including the
    /// torque each member's drive exerts around the centre of mass.
    pub fn total_rotational_acceleration(
        &self,
        creatures: &[Creature],
        width: f64,
        height: f64,
    ) -> f64 {
        let centre = self.centre_of_mass(creatures, width, height);
        let mut total = 0.0;
        for &i in &self.members {
            let c = &creatures[i];
            let offset = geometry::toroidal_delta(centre, c.core.position, width, height);
            let arm = offset.length();
            let arm_angle = offset.y.atan2(offset.x);
            let torque_arm = arm
                * c.motion.acceleration
                * (c.core.orientation + c.motion.acceleration_angle - arm_angle).sin();
            total += c.core.size * (torque_arm + c.motion.rotational_acceleration * c.core.size);
        }
        total / self.total_mass(creatures)
    }

    /// Overwrite every member's effective accelerations with the chain
    /// aggregate so the tick integrates the chain as one rigid body.
    pub fn apply(&self, creatures: &mut [Creature], width: f64, height: f64) {
        if self.members.len() < 2 {
            return;
        }
        let forward = self.total_forward_acceleration(creatures);
        let rotational = self.total_rotational_acceleration(creatures, width, height);
        let magnitude = forward.length();
        let world_angle = forward.y.atan2(forward.x);

        for &i in &self.members {
            let orientation = creatures[i].core.orientation;
            let motion = &mut creatures[i].motion;
            motion.acceleration = magnitude;
            motion.acceleration_angle =
                geometry::OrientedAngle::new(world_angle - orientation).angle();
            motion.rotational_acceleration = rotational;
        }
    }
}
