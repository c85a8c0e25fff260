//! Error types for gridlock.
//!
//! All errors are strongly typed using thiserror. Every failure in the core
//! is a recoverable validation error: an operation either fully applies or
//! fully rejects, and entity state is never left partially mutated.

use thiserror::Error;

/// Validation errors that occur when mutating the entity store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Process id cannot be empty")]
    EmptyProcessId,

    #[error("Process {id} already exists")]
    DuplicateProcess {
        id: String,
    },

    #[error("Process not found: {id}")]
    ProcessNotFound {
        id: String,
    },

    #[error("Resource id cannot be empty")]
    EmptyResourceId,

    #[error("Resource {id} already exists")]
    DuplicateResource {
        id: String,
    },

    #[error("Resource not found: {id}")]
    ResourceNotFound {
        id: String,
    },

    #[error("Resource instance count must be at least 1, got {value}")]
    InvalidInstanceCount {
        value: u32,
    },

    #[error("Resource {id} has no free instances")]
    ResourceExhausted {
        id: String,
    },

    #[error("Process {process} already holds {resource}")]
    AlreadyHeld {
        process: String,
        resource: String,
    },
}

/// Top-level error type for gridlock.
///
/// The simulation core has no fatal error class: the step engine and the
/// resolver always produce a valid next state, so everything that can go
/// wrong is a rejected entity-store mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl SimError {
    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Result type alias for gridlock operations.
pub type SimResult<T> = Result<T, SimError>;
