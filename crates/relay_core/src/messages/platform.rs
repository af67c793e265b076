//! Decoding of platform event batches.
//!
//! Handlers are invoked with `{"Records": [...]}` where every record is
//! either a bus delivery (`Sns.Message` holds the envelope as a JSON
//! string) or a storage notification (`s3.bucket.name`, `s3.object.key`,
//! `s3.object.size`). Records are decoded independently so that one bad
//! record never hides the others.

use serde::Deserialize;

use super::{Envelope, IngestionTrigger, Inbound, MessageError};

#[derive(Debug, Deserialize)]
struct PlatformBatch {
    #[serde(rename = "Records", default)]
    records: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PlatformRecord {
    #[serde(rename = "Sns")]
    sns: Option<BusDelivery>,
    s3: Option<StorageNotification>,
}

#[derive(Debug, Deserialize)]
struct BusDelivery {
    #[serde(rename = "Message")]
    message: String,
}

#[derive(Debug, Deserialize)]
struct StorageNotification {
    bucket: NamedBucket,
    object: StoredObject,
}

#[derive(Debug, Deserialize)]
struct NamedBucket {
    name: String,
}

#[derive(Debug, Deserialize)]
struct StoredObject {
    key: String,
    #[serde(default)]
    size: u64,
}

/// Decode a platform batch into per-record inbound events.
///
/// Fails as a whole only when the batch itself is unreadable or has no
/// records.
pub fn decode_batch(raw: &str) -> Result<Vec<Result<Inbound, MessageError>>, MessageError> {
    let batch: PlatformBatch = serde_json::from_str(raw).map_err(MessageError::InvalidBatch)?;

    if batch.records.is_empty() {
        return Err(MessageError::EmptyBatch);
    }

    Ok(batch.records.into_iter().map(decode_record).collect())
}

fn decode_record(value: serde_json::Value) -> Result<Inbound, MessageError> {
    let record: PlatformRecord =
        serde_json::from_value(value).map_err(MessageError::InvalidRecord)?;

    if let Some(delivery) = record.sns {
        return Envelope::from_json(&delivery.message).map(Inbound::Message);
    }

    if let Some(notification) = record.s3 {
        return Ok(Inbound::Trigger(IngestionTrigger::new(
            notification.bucket.name,
            notification.object.key,
            notification.object.size,
        )));
    }

    Err(MessageError::UnknownRecord)
}

/// Wrap an envelope the way the platform delivers bus messages.
///
/// Used by the local runner to replay outbox contents into handlers.
pub fn bus_delivery_record(envelope: &Envelope) -> Result<serde_json::Value, MessageError> {
    Ok(serde_json::json!({ "Sns": { "Message": envelope.to_json()? } }))
}

/// Wrap a trigger the way the platform delivers storage notifications.
pub fn storage_record(trigger: &IngestionTrigger) -> serde_json::Value {
    serde_json::json!({
        "s3": {
            "bucket": { "name": trigger.bucket },
            "object": { "key": trigger.key, "size": trigger.size },
        }
    })
}

/// Assemble records into a platform batch document.
pub fn batch_of(records: Vec<serde_json::Value>) -> String {
    serde_json::json!({ "Records": records }).to_string()
}

/// Outcome counts for one batch invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Records that led to a record write or a publication.
    pub handled: usize,
    /// Records that were valid but not meant for this handler.
    pub ignored: usize,
    /// Records that were malformed or whose handling failed.
    pub failed: usize,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.handled + self.ignored + self.failed
    }
}
