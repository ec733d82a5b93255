//! Domain errors for the Gastown fleet orchestrator.

use thiserror::Error;
use uuid::Uuid;

use super::models::BeadStatus;

/// Domain-level errors raised by the scheduling kernel.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A store mutation was attempted from a status that does not
    /// permit the target status. Always indicates a scheduling bug
    /// upstream; the bead's status is left unchanged.
    #[error("Invalid transition for bead {bead_id}: {from} -> {to}")]
    InvalidTransition {
        bead_id: Uuid,
        from: BeadStatus,
        to: BeadStatus,
    },

    #[error("Bead {bead_id} cannot be assigned: dependencies not completed: {missing:?}")]
    DependenciesUnmet { bead_id: Uuid, missing: Vec<Uuid> },

    #[error("Bead not found: {0}")]
    BeadNotFound(Uuid),

    #[error("Convoy not found: {0}")]
    ConvoyNotFound(Uuid),

    #[error("Polecat not found: {0}")]
    PolecatNotFound(Uuid),

    #[error("Polecat {0} already has an active session")]
    SessionActive(Uuid),

    #[error("Polecat {0} has no active session")]
    SessionNotActive(Uuid),

    #[error("Experiment not found: {0}")]
    ExperimentNotFound(Uuid),

    #[error("Strategy not found: {0}")]
    StrategyNotFound(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
