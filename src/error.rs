//! Error types for the notebook refresh scheduler.

use std::fmt::Display;
use std::io;
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Actor not found: {0}")]
    ActorNotFound(String),

    #[error("Generation job not found: {0}")]
    JobNotFound(String),

    #[error("Generation phase not found: {0}")]
    PhaseNotFound(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl StorageError {
    /// Wrap a backend failure (sled, filesystem) as an I/O error.
    pub(crate) fn io(err: impl Display) -> Self {
        StorageError::IoError(io::Error::new(io::ErrorKind::Other, err.to_string()))
    }

    /// Wrap an encode/decode failure as an invalid-data I/O error.
    pub(crate) fn data(err: impl Display) -> Self {
        StorageError::IoError(io::Error::new(io::ErrorKind::InvalidData, err.to_string()))
    }
}

/// Scheduler and pipeline errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Source collection failed: {0}")]
    CollectionFailed(String),

    #[error("Deterministic build failed: {0}")]
    BuildFailed(String),

    #[error("Enrichment failed: {0}")]
    EnrichmentFailed(String),

    #[error("Phase {phase} panicked: {detail}")]
    PhasePanicked { phase: String, detail: String },

    #[error("Unknown trigger type: {0}")]
    InvalidTrigger(String),

    #[error("Runtime error: {0}")]
    RuntimeError(String),
}

impl From<config::ConfigError> for SchedulerError {
    fn from(err: config::ConfigError) -> Self {
        SchedulerError::ConfigError(err.to_string())
    }
}
