use thiserror::Error;

/// Errors surfaced by the simulation core.
///
/// The first three kinds are domain invariant violations: the managers are
/// written so these states are unreachable, and any occurrence is a bug that
/// stops the engine. Configuration and persistence failures are recoverable
/// and only reported.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("cannot hatch a dead egg")]
    HatchDeadEgg,

    #[error("cannot hatch an egg that has not finished incubating")]
    HatchNotIncubated,

    #[error("crossover neuron {id} has mismatched kinds between parents")]
    NeuronKindMismatch { id: u64 },

    #[error("crossover link {id} is not present in both parents")]
    LinkIdMismatch { id: u64 },

    #[error("failed to load configuration from {path}: {source}")]
    Config {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("schema encoding failure: {0}")]
    Schema(String),
}

impl SimError {
    /// Whether the error must stop the engine (domain invariant breaches)
    /// or can be reported and survived.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SimError::HatchDeadEgg
                | SimError::HatchNotIncubated
                | SimError::NeuronKindMismatch { .. }
                | SimError::LinkIdMismatch { .. }
        )
    }
}
