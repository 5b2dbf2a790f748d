//! Process-wide monotonic ID allocation.
//!
//! Neuron and link IDs double as NEAT innovation numbers: two links created
//! by independent mutations never share an ID, which is what the crossover
//! and compatibility code keys on. Entity IDs identify creatures, food and
//! eggs across the whole process lifetime.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_NEURON_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_LINK_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_neuron_id() -> u64 {
    NEXT_NEURON_ID.fetch_add(1, Ordering::Relaxed)
}

pub fn next_link_id() -> u64 {
    NEXT_LINK_ID.fetch_add(1, Ordering::Relaxed)
}

pub fn next_entity_id() -> u64 {
    NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed)
}

/// Fast-forward the neuron counter past `id`. Used when rebuilding genomes
/// from a persisted snapshot so freshly allocated IDs never collide.
pub fn bump_neuron_id(id: u64) {
    NEXT_NEURON_ID.fetch_max(id + 1, Ordering::Relaxed);
}

pub fn bump_link_id(id: u64) {
    NEXT_LINK_ID.fetch_max(id + 1, Ordering::Relaxed);
}

pub fn bump_entity_id(id: u64) {
    NEXT_ENTITY_ID.fetch_max(id + 1, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_strictly_increasing() {
        let a = next_neuron_id();
        let b = next_neuron_id();
        assert!(b > a);

        let l1 = next_link_id();
        let l2 = next_link_id();
        assert!(l2 > l1);
    }

    #[test]
    fn bump_skips_persisted_range() {
        let seen = next_neuron_id();
        bump_neuron_id(seen + 500);
        assert!(next_neuron_id() > seen + 500);
    }
}
