use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::ids;
use crate::random;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NeuronKind {
    Input,
    Hidden,
    Output,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    Sigmoid,
    Relu,
    Elu,
    LeakyRelu,
    Binary,
    Linear,
    Tanh,
}

pub const ALL_ACTIVATIONS: [Activation; 7] = [
    Activation::Sigmoid,
    Activation::Relu,
    Activation::Elu,
    Activation::LeakyRelu,
    Activation::Binary,
    Activation::Linear,
    Activation::Tanh,
];

pub fn apply_activation(activation: Activation, x: f64) -> f64 {
    match activation {
        Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
        Activation::Relu => x.max(0.0),
        Activation::Elu => {
            if x >= 0.0 {
                x
            } else {
                x.exp() - 1.0
            }
        }
        Activation::LeakyRelu => (0.1 * x).max(x),
        Activation::Binary => {
            if x >= 0.0 {
                1.0
            } else {
                0.0
            }
        }
        Activation::Linear => x,
        Activation::Tanh => x.tanh(),
    }
}

/// A node of the genome graph. Immutable after creation except for the bias,
/// the active flag and the activation function.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Neuron {
    id: u64,
    kind: NeuronKind,
    bias: f64,
    active: bool,
    activation: Activation,
}

impl Neuron {
    pub fn new(kind: NeuronKind, bias: f64) -> Self {
        Self {
            id: ids::next_neuron_id(),
            kind,
            bias,
            active: true,
            activation: Activation::Sigmoid,
        }
    }

    /// Rebuild a neuron from persisted fields, keeping the global counter
    /// ahead of the restored ID.
    pub fn from_parts(
        id: u64,
        kind: NeuronKind,
        bias: f64,
        active: bool,
        activation: Activation,
    ) -> Self {
        ids::bump_neuron_id(id);
        Self {
            id,
            kind,
            bias,
            active,
            activation,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> NeuronKind {
        self.kind
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn set_bias(&mut self, bias: f64) {
        self.bias = bias;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn set_activation(&mut self, activation: Activation) {
        self.activation = activation;
    }
}

/// Combine two matched neurons: the bias comes from either parent with equal
/// probability, everything else from `a`. The IDs must match and the kinds
/// must agree; a kind mismatch is an invariant breach.
pub fn crossover_neurons(a: &Neuron, b: &Neuron) -> Result<Neuron, SimError> {
    debug_assert_eq!(a.id(), b.id());
    if a.kind() != b.kind() {
        return Err(SimError::NeuronKindMismatch { id: a.id() });
    }
    let mut child = *a;
    child.set_bias(random::choose_one(a.bias(), b.bias()));
    Ok(child)
}
