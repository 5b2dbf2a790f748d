//! NEAT genome representation and feed-forward activation.

mod brain_module;
mod genome;
mod link;
mod network;
mod neuron;

pub use brain_module::{available_modules, BrainModule, MODULE_GEOLOCATION, MODULE_PHEROMONE, MODULE_VISION, PHEROMONE_CHANNELS};
pub use genome::{crossover, minimally_viable_genome, Genome};
pub use link::{crossover_links, Link};
pub use network::{FeedForward, FeedForwardNeuron, NeuronInput};
pub use neuron::{apply_activation, crossover_neurons, Activation, Neuron, NeuronKind};
