//! Job record store.
//!
//! The store is an append-only audit log keyed by job identity and ordered
//! by timestamp. Orchestration never reads it back; `JobHistory` exists for
//! reporting only.

mod clock;
mod jsonl;
mod ledger;
mod memory;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::{JobEvent, JobIdentity};

pub use clock::{Clock, MonotonicClock, StepClock};
pub use jsonl::JsonLinesStore;
pub use ledger::{Ledger, StagePhase};
pub use memory::MemoryStore;

/// Errors writing or reading job events.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error in {operation} on {path}: {source}")]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode job event: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Corrupt job event at line {line}: {source}")]
    Corrupt {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Record store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn io(operation: impl Into<String>, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }
}

/// Write side of the store: append one row.
pub trait JobRecordStore: Send + Sync {
    fn append(&self, event: &JobEvent) -> Result<(), StoreError>;
}

/// Read side, for reporting.
pub trait JobHistory {
    /// Every event of one job, ordered by timestamp.
    fn history(&self, job: &JobIdentity) -> Result<Vec<JobEvent>, StoreError>;

    /// Every event in the store, ordered by timestamp.
    fn all_events(&self) -> Result<Vec<JobEvent>, StoreError>;
}
