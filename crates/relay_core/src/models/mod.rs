//! Data models for Relay.
//!
//! This module contains the core data structures shared by the controller
//! and the workers:
//! - Stage identity and bus endpoints
//! - Stage results
//! - Job identity and the persisted job event

mod enums;
mod jobs;

pub use enums::{Endpoint, EndpointParseError, JobResult, StageId};
pub use jobs::{ArtifactLocation, JobEvent, JobIdentity};
