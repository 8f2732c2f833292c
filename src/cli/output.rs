//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::{SchedulerError, StorageError};

/// Map scheduler errors to a string for CLI output.
pub fn map_error(e: &SchedulerError) -> String {
    match e {
        SchedulerError::StorageError(StorageError::ActorNotFound(id)) => {
            format!("Unknown actor '{}'. Add it with `notebook-refresh actor add {}`.", id, id)
        }
        other => other.to_string(),
    }
}
