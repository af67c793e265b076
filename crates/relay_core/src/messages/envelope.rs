//! Bus message envelope.
//!
//! Wire shape: `{"from": .., "to": .., "type": .., ...payload}`. Field names
//! are case-sensitive.

use serde::{Deserialize, Deserializer, Serialize};

use super::MessageError;
use crate::models::{ArtifactLocation, Endpoint, JobResult, StageId};

/// A message published on the shared bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub from: Endpoint,
    pub to: Endpoint,
    #[serde(flatten)]
    pub payload: Payload,
}

/// Message subtype with its payload, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Payload {
    StartJob(StartJob),
    JobProgress(JobProgress),
    JobCompleted(JobCompleted),
}

/// Controller → worker: run your stage against this artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartJob {
    pub bucket: String,
    pub key: String,
    /// Transform arguments chosen by the controller for the target stage.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Worker → controller: percent complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub bucket: String,
    pub key: String,
    #[serde(deserialize_with = "lenient_percent")]
    pub progress: u8,
}

/// Worker → controller: the stage finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCompleted {
    pub bucket: String,
    pub key: String,
    /// A missing or non-string result is a failure.
    #[serde(default)]
    pub result: JobResult,
}

/// Accepts `42`, `42.0` and `"42"`. Fractional, negative and non-numeric
/// values are rejected.
fn lenient_percent<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value = serde_json::Value::deserialize(deserializer)?;
    let number = match &value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    number
        .and_then(|n| u8::try_from(n).ok())
        .ok_or_else(|| D::Error::custom(format!("invalid progress value {}", value)))
}

impl Payload {
    /// Wire name of the subtype.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::StartJob(_) => "StartJob",
            Payload::JobProgress(_) => "JobProgress",
            Payload::JobCompleted(_) => "JobCompleted",
        }
    }

    /// Artifact location the message refers to.
    pub fn location(&self) -> ArtifactLocation {
        match self {
            Payload::StartJob(m) => ArtifactLocation::new(&m.bucket, &m.key),
            Payload::JobProgress(m) => ArtifactLocation::new(&m.bucket, &m.key),
            Payload::JobCompleted(m) => ArtifactLocation::new(&m.bucket, &m.key),
        }
    }
}

impl Envelope {
    /// Controller → stage worker start message.
    pub fn start_job(stage: StageId, location: &ArtifactLocation, args: &[String]) -> Self {
        Self {
            from: Endpoint::Controller,
            to: stage.endpoint(),
            payload: Payload::StartJob(StartJob {
                bucket: location.bucket.clone(),
                key: location.key.clone(),
                args: args.to_vec(),
            }),
        }
    }

    /// Stage worker → controller progress notification.
    pub fn progress(stage: StageId, location: &ArtifactLocation, progress: u8) -> Self {
        Self {
            from: stage.endpoint(),
            to: Endpoint::Controller,
            payload: Payload::JobProgress(JobProgress {
                bucket: location.bucket.clone(),
                key: location.key.clone(),
                progress: progress.min(100),
            }),
        }
    }

    /// Stage worker → controller completion notification.
    pub fn completed(stage: StageId, location: &ArtifactLocation, result: JobResult) -> Self {
        Self {
            from: stage.endpoint(),
            to: Endpoint::Controller,
            payload: Payload::JobCompleted(JobCompleted {
                bucket: location.bucket.clone(),
                key: location.key.clone(),
                result,
            }),
        }
    }

    /// Decode an envelope from its JSON text.
    pub fn from_json(text: &str) -> Result<Self, MessageError> {
        serde_json::from_str(text).map_err(MessageError::InvalidEnvelope)
    }

    /// Encode the envelope as JSON text.
    pub fn to_json(&self) -> Result<String, MessageError> {
        serde_json::to_string(self).map_err(MessageError::Encode)
    }

    /// Routing is by convention: every subscriber sees every message.
    pub fn is_addressed_to(&self, endpoint: Endpoint) -> bool {
        self.to == endpoint
    }

    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(n: u8) -> StageId {
        StageId::new(n).unwrap()
    }

    #[test]
    fn start_job_wire_shape() {
        let location = ArtifactLocation::new("b", "k");
        let envelope = Envelope::start_job(stage(1), &location, &["-s".into(), "640x480".into()]);
        let value: serde_json::Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();

        assert_eq!(value["from"], "controller");
        assert_eq!(value["to"], "worker1");
        assert_eq!(value["type"], "StartJob");
        assert_eq!(value["bucket"], "b");
        assert_eq!(value["key"], "k");
        assert_eq!(value["args"][1], "640x480");
    }

    #[test]
    fn decodes_progress_message() {
        let text = r#"{"from":"worker1","to":"controller","type":"JobProgress","bucket":"b","key":"k","progress":42}"#;
        let envelope = Envelope::from_json(text).unwrap();

        assert_eq!(envelope.from, Endpoint::Worker(stage(1)));
        assert_eq!(
            envelope.payload,
            Payload::JobProgress(JobProgress {
                bucket: "b".into(),
                key: "k".into(),
                progress: 42,
            })
        );
    }

    #[test]
    fn start_job_args_default_to_empty() {
        let text = r#"{"from":"controller","to":"worker2","type":"StartJob","bucket":"b","key":"k"}"#;
        let envelope = Envelope::from_json(text).unwrap();
        match envelope.payload {
            Payload::StartJob(start) => assert!(start.args.is_empty()),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn completed_with_unknown_result_is_failure() {
        let text = r#"{"from":"worker2","to":"controller","type":"JobCompleted","bucket":"b","key":"k","result":"Crashed"}"#;
        let envelope = Envelope::from_json(text).unwrap();
        match envelope.payload {
            Payload::JobCompleted(done) => assert_eq!(done.result, JobResult::Failed),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn completed_with_missing_or_non_string_result_is_failure() {
        let base = r#"{"from":"worker2","to":"controller","type":"JobCompleted","bucket":"b","key":"k""#;
        for tail in [r#","result":null}"#, r#","result":1}"#, r#","result":false}"#, "}"] {
            let envelope = Envelope::from_json(&format!("{}{}", base, tail)).unwrap();
            match envelope.payload {
                Payload::JobCompleted(done) => assert_eq!(done.result, JobResult::Failed, "{}", tail),
                other => panic!("unexpected payload {:?}", other),
            }
        }
    }

    #[test]
    fn progress_accepts_integral_floats_and_numeric_strings() {
        let base = r#"{"from":"worker1","to":"controller","type":"JobProgress","bucket":"b","key":"k","progress":"#;
        for value in ["42.0", r#""42""#, r#"" 42 ""#] {
            let envelope = Envelope::from_json(&format!("{}{}}}", base, value)).unwrap();
            match envelope.payload {
                Payload::JobProgress(p) => assert_eq!(p.progress, 42, "{}", value),
                other => panic!("unexpected payload {:?}", other),
            }
        }
        for value in ["42.5", "-1", r#""lots""#, "null", "true"] {
            assert!(Envelope::from_json(&format!("{}{}}}", base, value)).is_err(), "{}", value);
        }
    }

    #[test]
    fn rejects_unknown_type_and_bad_progress() {
        let unknown = r#"{"from":"worker1","to":"controller","type":"Hello","bucket":"b","key":"k"}"#;
        let too_big = r#"{"from":"worker1","to":"controller","type":"JobProgress","bucket":"b","key":"k","progress":420}"#;
        assert!(Envelope::from_json(unknown).is_err());
        assert!(Envelope::from_json(too_big).is_err());
        assert!(Envelope::from_json("not json").is_err());
    }

    #[test]
    fn addressing_is_checked_by_receiver() {
        let envelope = Envelope::progress(stage(2), &ArtifactLocation::new("b", "k"), 5);
        assert!(envelope.is_addressed_to(Endpoint::Controller));
        assert!(!envelope.is_addressed_to(Endpoint::Worker(stage(2))));
    }
}
