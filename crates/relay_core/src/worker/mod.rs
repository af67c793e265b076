//! Stage workers.
//!
//! A worker owns one pipeline stage. For every `StartJob` addressed to it
//! by the controller it retrieves the input artifact, runs the stage's
//! transform while forwarding progress, stores the output and reports one
//! `JobCompleted`.

mod driver;
mod storage;

use std::io;

use thiserror::Error;

use crate::transform::TransformError;

pub use driver::{Disposition, StageDriver};
pub use storage::{output_bucket, output_key, output_location, ArtifactStorage, LocalStorage};

/// Errors from artifact storage.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Invalid artifact location: {0}")]
    InvalidLocation(String),

    #[error("Storage I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

/// Why a stage run failed. Every variant ends in `JobCompleted(Failed)`.
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Transform(#[from] TransformError),
}
