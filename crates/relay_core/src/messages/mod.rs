//! Inter-process messages.
//!
//! This module provides:
//! - `Envelope`: the `{from, to, type, ...payload}` unit published on the bus
//! - `IngestionTrigger`: the storage signal that starts a pipeline run
//! - `Inbound`: what a handler invocation receives
//! - Platform batch decoding (`decode_batch`)

mod envelope;
mod platform;
mod trigger;

use thiserror::Error;

pub use envelope::{Envelope, JobCompleted, JobProgress, Payload, StartJob};
pub use platform::{
    batch_of, bus_delivery_record, decode_batch, storage_record, BatchReport,
};
pub use trigger::IngestionTrigger;

/// One inbound event for a handler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A new artifact appeared.
    Trigger(IngestionTrigger),
    /// A message delivered by the bus.
    Message(Envelope),
}

/// Errors decoding or encoding messages.
#[derive(Error, Debug)]
pub enum MessageError {
    #[error("Invalid message, must be a JSON envelope: {0}")]
    InvalidEnvelope(#[source] serde_json::Error),

    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Invalid event batch: {0}")]
    InvalidBatch(#[source] serde_json::Error),

    #[error("Invalid event record: {0}")]
    InvalidRecord(#[source] serde_json::Error),

    #[error("Event batch has no records")]
    EmptyBatch,

    #[error("Event record is neither a bus delivery nor a storage notification")]
    UnknownRecord,
}
