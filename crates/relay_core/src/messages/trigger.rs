//! Ingestion trigger: a new artifact appeared in storage.

use serde::{Deserialize, Serialize};

use crate::models::ArtifactLocation;

/// External signal that an artifact is ready for processing.
///
/// Zero-byte triggers stand for deletions and empty markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionTrigger {
    pub bucket: String,
    pub key: String,
    #[serde(default)]
    pub size: u64,
}

impl IngestionTrigger {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, size: u64) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            size,
        }
    }

    pub fn location(&self) -> ArtifactLocation {
        ArtifactLocation::new(&self.bucket, &self.key)
    }

    /// Whether the trigger should start a pipeline run.
    pub fn is_actionable(&self) -> bool {
        self.size > 0
    }
}
