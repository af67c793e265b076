//! Core enums used throughout the application.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Position of a stage in the pipeline topology (1-based).
///
/// Stage ids are assigned by pipeline position, never by content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct StageId(u8);

impl StageId {
    /// The first pipeline position.
    pub const MIN: StageId = StageId(1);

    /// Create a stage id. Returns `None` for 0.
    pub const fn new(position: u8) -> Option<Self> {
        if position == 0 {
            None
        } else {
            Some(Self(position))
        }
    }

    /// Numeric position of the stage.
    pub const fn get(self) -> u8 {
        self.0
    }

    /// The next pipeline position (saturating).
    pub const fn successor(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Bus address of the worker that runs this stage.
    pub fn endpoint(self) -> Endpoint {
        Endpoint::Worker(self)
    }
}

impl TryFrom<u8> for StageId {
    type Error = EndpointParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(EndpointParseError::ZeroStage)
    }
}

impl From<StageId> for u8 {
    fn from(stage: StageId) -> Self {
        stage.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error parsing an endpoint name or stage id.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EndpointParseError {
    #[error("stage ids start at 1")]
    ZeroStage,

    #[error("unknown endpoint '{0}'")]
    Unknown(String),
}

/// Address of a participant on the message bus.
///
/// On the wire this is `"controller"` or `"worker<N>"`; the name is parsed
/// once when a message is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Endpoint {
    /// The orchestration controller.
    Controller,
    /// The worker running the given stage.
    Worker(StageId),
}

impl Endpoint {
    /// Stage id when this endpoint is a worker.
    pub fn stage(&self) -> Option<StageId> {
        match self {
            Endpoint::Controller => None,
            Endpoint::Worker(stage) => Some(*stage),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Controller => write!(f, "controller"),
            Endpoint::Worker(stage) => write!(f, "worker{}", stage),
        }
    }
}

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "controller" {
            return Ok(Endpoint::Controller);
        }

        let position = s
            .strip_prefix("worker")
            .and_then(|n| n.parse::<u8>().ok())
            .ok_or_else(|| EndpointParseError::Unknown(s.to_string()))?;

        Ok(Endpoint::Worker(StageId::try_from(position)?))
    }
}

impl TryFrom<String> for Endpoint {
    type Error = EndpointParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.to_string()
    }
}

/// Terminal result of one stage run.
///
/// Only the string `"Passed"` is a pass on the wire. Anything else, including
/// `null`, numbers or a missing field, reads as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "String")]
pub enum JobResult {
    Passed,
    #[default]
    Failed,
}

impl JobResult {
    /// Progress recorded alongside a completion event.
    pub fn terminal_progress(self) -> u8 {
        match self {
            JobResult::Passed => 100,
            JobResult::Failed => 0,
        }
    }

    pub fn is_passed(self) -> bool {
        self == JobResult::Passed
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobResult::Passed => "Passed",
            JobResult::Failed => "Failed",
        }
    }
}

impl From<serde_json::Value> for JobResult {
    fn from(value: serde_json::Value) -> Self {
        match value.as_str() {
            Some("Passed") => JobResult::Passed,
            _ => JobResult::Failed,
        }
    }
}

impl From<JobResult> for String {
    fn from(result: JobResult) -> Self {
        result.as_str().to_string()
    }
}

impl fmt::Display for JobResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_parses_worker_names() {
        assert_eq!(
            "worker2".parse::<Endpoint>().unwrap(),
            Endpoint::Worker(StageId::new(2).unwrap())
        );
        assert_eq!("controller".parse::<Endpoint>().unwrap(), Endpoint::Controller);
    }

    #[test]
    fn endpoint_rejects_unknown_names() {
        assert!("worker".parse::<Endpoint>().is_err());
        assert!("worker0".parse::<Endpoint>().is_err());
        assert!("scheduler".parse::<Endpoint>().is_err());
    }

    #[test]
    fn endpoint_serializes_as_name() {
        let json = serde_json::to_string(&Endpoint::Worker(StageId::new(3).unwrap())).unwrap();
        assert_eq!(json, "\"worker3\"");
    }

    #[test]
    fn result_treats_unknown_values_as_failure() {
        let passed: JobResult = serde_json::from_str("\"Passed\"").unwrap();
        let other: JobResult = serde_json::from_str("\"Timeout\"").unwrap();
        assert_eq!(passed, JobResult::Passed);
        assert_eq!(other, JobResult::Failed);
    }

    #[test]
    fn result_of_any_other_json_type_is_failure() {
        for text in ["null", "1", "false", "{}", "[\"Passed\"]", "\"passed\""] {
            let result: JobResult = serde_json::from_str(text).unwrap();
            assert_eq!(result, JobResult::Failed, "{}", text);
        }
    }

    #[test]
    fn optional_result_keeps_null_as_none() {
        let result: Option<JobResult> = serde_json::from_str("null").unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn terminal_progress_follows_result() {
        assert_eq!(JobResult::Passed.terminal_progress(), 100);
        assert_eq!(JobResult::Failed.terminal_progress(), 0);
    }

    #[test]
    fn stage_id_rejects_zero() {
        assert!(StageId::new(0).is_none());
        assert!(serde_json::from_str::<StageId>("0").is_err());
        assert_eq!(serde_json::from_str::<StageId>("2").unwrap().get(), 2);
    }
}
