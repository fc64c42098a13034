//! Error types for the lift_core library.

use crate::types::ExerciseId;
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for lift_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A user action was rejected before anything was mutated
    #[error("Validation error: {0}")]
    Validation(String),

    /// No exercise with this id exists in the session
    #[error("Unknown exercise: {0}")]
    UnknownExercise(ExerciseId),

    /// The exercise exists but has no set at this position
    #[error("Exercise {exercise} has no set #{sequence}")]
    UnknownSet { exercise: ExerciseId, sequence: usize },

    /// A backend call failed; local state was left untouched
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Internal invariant broken (programming defect)
    #[error("Invariant violation: {0}")]
    Invariant(String),

    /// Confirm/cancel for a request that is no longer pending
    #[error("Confirmation request is no longer pending")]
    ConfirmationMismatch,
}

/// Failure reported by the backend collaborator
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// Transport failed or the backend could not be reached
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Backend answered with an error payload
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Requested resource does not exist
    #[error("not found: {0}")]
    NotFound(String),
}
