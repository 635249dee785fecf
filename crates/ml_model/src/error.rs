use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while fitting a model.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("No training rows provided")]
    EmptyTrainingSet,

    #[error("Got {features} feature rows but {targets} targets")]
    LengthMismatch { features: usize, targets: usize },

    #[error("Target on training row {row} is not a finite number")]
    NonFiniteTarget { row: usize },
}

/// Errors raised by a [`ModelStore`](crate::ModelStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Nothing has been saved yet. Recoverable: callers train first.
    #[error("No model has been saved at {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("Model at {} could not be decoded", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode model")]
    Encode(#[source] serde_json::Error),

    #[error("Model store I/O error at {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Returns true if no model has ever been saved.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
