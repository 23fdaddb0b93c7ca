//! Coordinator-specific error types

use shared::SharedError;
use thiserror::Error;

/// Failure submitting a job to the external queue.
///
/// These are transient, per-event conditions: they are recorded against the
/// dispatch record as `failed` and never stop the coordinator loop.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Job queue unavailable: {message}")]
    Unavailable { message: String },

    #[error("Job queue rejected the submission: {message}")]
    Rejected { message: String },
}

#[derive(Error, Debug)]
pub enum CoordinatorError {
    /// Fatal configuration problem; the process must not keep consuming
    /// events once one of these surfaces.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Invariant violation in the dedup store. Indicates a dispatcher bug;
    /// the process aborts loudly rather than corrupt dedup state.
    #[error("Dedup store integrity violation for key {key}: {detail}")]
    Integrity { key: String, detail: String },

    #[error("Event feed error: {message}")]
    Feed { message: String },

    #[error("Dedup store operation failed: {0}")]
    Store(#[from] sled::Error),

    #[error("Shared component error")]
    Shared(#[from] SharedError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoordinatorError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn integrity(key: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Integrity {
            key: key.into(),
            detail: detail.into(),
        }
    }

    pub fn feed(message: impl Into<String>) -> Self {
        Self::Feed {
            message: message.into(),
        }
    }
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
