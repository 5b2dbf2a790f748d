use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::ids;
use crate::random;

/// A weighted connection between two neurons. `cyclic` marks the links whose
/// insertion would close a directed cycle through the non-cyclic part of the
/// graph; activation feeds them the source's previous-tick value.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Link {
    id: u64,
    in_id: u64,
    out_id: u64,
    weight: f64,
    active: bool,
    cyclic: bool,
}

impl Link {
    pub fn new(in_id: u64, out_id: u64, weight: f64) -> Self {
        Self {
            id: ids::next_link_id(),
            in_id,
            out_id,
            weight,
            active: true,
            cyclic: false,
        }
    }

    pub fn from_parts(
        id: u64,
        in_id: u64,
        out_id: u64,
        weight: f64,
        active: bool,
        cyclic: bool,
    ) -> Self {
        ids::bump_link_id(id);
        Self {
            id,
            in_id,
            out_id,
            weight,
            active,
            cyclic,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn in_id(&self) -> u64 {
        self.in_id
    }

    pub fn out_id(&self) -> u64 {
        self.out_id
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn is_cyclic(&self) -> bool {
        self.cyclic
    }

    pub fn set_cyclic(&mut self, cyclic: bool) {
        self.cyclic = cyclic;
    }
}

/// Combine two matched links: the weight comes from either parent with equal
/// probability, everything else from `a`.
pub fn crossover_links(a: &Link, b: &Link) -> Result<Link, SimError> {
    if a.id() != b.id() {
        return Err(SimError::LinkIdMismatch { id: a.id() });
    }
    let mut child = *a;
    child.set_weight(random::choose_one(a.weight(), b.weight()));
    Ok(child)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_links_are_active_and_acyclic() {
        let link = Link::new(1, 2, 0.5);
        assert!(link.is_active());
        assert!(!link.is_cyclic());
    }

    #[test]
    fn crossover_keeps_endpoints_from_first_parent() {
        let a = Link::from_parts(7001, 1, 2, 0.9, true, false);
        let b = Link::from_parts(7001, 1, 2, -0.9, false, true);
        let child = crossover_links(&a, &b).unwrap();
        assert_eq!(child.in_id(), 1);
        assert_eq!(child.out_id(), 2);
        assert!(child.is_active());
        assert!(!child.is_cyclic());
        assert!(child.weight() == 0.9 || child.weight() == -0.9);
    }

    #[test]
    fn crossover_rejects_mismatched_ids() {
        let a = Link::from_parts(7010, 1, 2, 0.5, true, false);
        let b = Link::from_parts(7011, 1, 2, 0.5, true, false);
        assert!(crossover_links(&a, &b).is_err());
    }
}
