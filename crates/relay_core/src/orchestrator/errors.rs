//! Error types for the orchestrator.
//!
//! Malformed input is never an error here: the controller logs it and
//! moves on. Errors are reserved for collaborator failures the platform
//! may want to redeliver on.

use thiserror::Error;

use crate::bus::BusError;
use crate::models::StageId;
use crate::store::StoreError;

/// Failure applying a controller decision.
#[derive(Error, Debug)]
pub enum ControllerError {
    /// Writing a job event failed.
    #[error("Failed to record job event: {0}")]
    Store(#[from] StoreError),

    /// Publishing a start message failed.
    #[error("Failed to publish message: {0}")]
    Bus(#[from] BusError),
}

/// Invalid topology table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("Topology has no stages")]
    Empty,

    #[error("Stage {0} is listed more than once")]
    DuplicateStage(StageId),

    #[error("Stage {stage} gates unknown stage {target}")]
    UnknownGateTarget { stage: StageId, target: StageId },

    #[error("Stage {0} gates itself")]
    SelfGate(StageId),

    #[error("No stage starts on ingestion")]
    NoIngestionStage,

    #[error("Gate chain starting at stage {0} loops back on itself")]
    Cycle(StageId),
}

impl TopologyError {
    pub fn unknown_gate_target(stage: StageId, target: StageId) -> Self {
        Self::UnknownGateTarget { stage, target }
    }
}
