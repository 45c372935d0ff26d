//! Error types for infrastructure synthesis

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::{NetworkError, ValidationError};
use crate::graph::GraphError;

/// Errors that can occur while declaring or synthesizing infrastructure
#[derive(Debug, Error)]
pub enum SynthError {
    /// A declaration was rejected before anything was emitted
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Malformed network block
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Resource graph inconsistency
    #[error("Resource graph error: {0}")]
    Graph(#[from] GraphError),

    /// Build input could not be packaged
    #[error("Asset error at {path}: {message}")]
    Asset { path: PathBuf, message: String },

    /// Filesystem failure while reading inputs or writing output
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl SynthError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SynthError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for synthesis operations
pub type SynthResult<T> = Result<T, SynthError>;
