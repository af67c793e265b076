//! Job identity and the persisted job event record.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::enums::{JobResult, StageId};

/// Storage location of the artifact a job processes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactLocation {
    pub bucket: String,
    pub key: String,
}

impl ArtifactLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Identity of the job that processes this artifact.
    pub fn job_identity(&self) -> JobIdentity {
        JobIdentity(format!("{}/{}", self.bucket, self.key))
    }
}

impl fmt::Display for ArtifactLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Stable identifier of one pipeline run, used as the partition key
/// for every event of that run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobIdentity(String);

impl JobIdentity {
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One observed progress or completion signal.
///
/// Events are append-only. Several events share a job identity; the
/// timestamp orders them and doubles as a version marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEvent {
    /// Partition key.
    pub job: JobIdentity,
    /// Milliseconds since the epoch (sort key).
    pub timestamp: i64,
    /// Stage that emitted the signal.
    pub stage: StageId,
    /// Percent complete, 0-100.
    pub progress: u8,
    /// `None` while the stage is in progress.
    pub result: Option<JobResult>,
}

impl JobEvent {
    /// Build an in-progress event.
    pub fn progress(job: JobIdentity, timestamp: i64, stage: StageId, progress: u8) -> Self {
        Self {
            job,
            timestamp,
            stage,
            progress: progress.min(100),
            result: None,
        }
    }

    /// Build a completion event. Progress is derived from the result.
    pub fn completed(job: JobIdentity, timestamp: i64, stage: StageId, result: JobResult) -> Self {
        Self {
            job,
            timestamp,
            stage,
            progress: result.terminal_progress(),
            result: Some(result),
        }
    }

    /// Whether this event closes the stage.
    pub fn is_terminal(&self) -> bool {
        self.result.is_some()
    }
}
