use serde::{Deserialize, Serialize};

/// Number of distinct pheromone channels a pheromone module can bind to.
pub const PHEROMONE_CHANNELS: usize = 16;

pub const MODULE_GEOLOCATION: u32 = 1;
pub const MODULE_PHEROMONE: u32 = 2;
pub const MODULE_VISION: u32 = 3;

/// An optional sensory/motor block that a genome can evolve. Activating a
/// module appends its input and output neurons to the genome and records
/// where in the creature's neural interface they start.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BrainModule {
    pub module_id: u32,
    /// Whether a genome may carry several instances of this module.
    pub multiple: bool,
    /// Channel selector; only meaningful for pheromone modules, where it
    /// picks one of the [`PHEROMONE_CHANNELS`] channels.
    pub channel: u32,
    pub first_input_index: usize,
    pub first_output_index: usize,
    pub input_ids: Vec<u64>,
    pub output_ids: Vec<u64>,
}

impl BrainModule {
    pub fn template(input_count: usize, output_count: usize, module_id: u32, multiple: bool) -> Self {
        Self {
            module_id,
            multiple,
            channel: 0,
            first_input_index: 0,
            first_output_index: 0,
            input_ids: vec![0; input_count],
            output_ids: vec![0; output_count],
        }
    }
}

/// The modules a genome can evolve: geolocation (position + orientation
/// inputs), pheromone (one channel in, one emission out, repeatable) and
/// extra vision targets (distance, direction, size, hue, kind inputs,
/// repeatable).
pub fn available_modules() -> Vec<BrainModule> {
    vec![
        BrainModule::template(3, 0, MODULE_GEOLOCATION, false),
        BrainModule::template(1, 1, MODULE_PHEROMONE, true),
        BrainModule::template(5, 0, MODULE_VISION, true),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_matches_the_module_contract() {
        let modules = available_modules();
        assert_eq!(modules.len(), 3);

        let pheromone = modules
            .iter()
            .find(|m| m.module_id == MODULE_PHEROMONE)
            .unwrap();
        assert!(pheromone.multiple);
        assert_eq!(pheromone.input_ids.len(), 1);
        assert_eq!(pheromone.output_ids.len(), 1);

        let vision = modules.iter().find(|m| m.module_id == MODULE_VISION).unwrap();
        assert!(vision.multiple);
        assert_eq!(vision.input_ids.len(), 5);
        assert!(vision.output_ids.is_empty());

        let geo = modules
            .iter()
            .find(|m| m.module_id == MODULE_GEOLOCATION)
            .unwrap();
        assert!(!geo.multiple);
        assert_eq!(geo.input_ids.len(), 3);
    }
}
