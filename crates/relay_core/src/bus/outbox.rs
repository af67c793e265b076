//! File-backed outbox transport.
//!
//! Each publication is appended as one JSON line carrying the topic, the
//! `to` routing attribute and the encoded envelope. A separate relay (or
//! the local runner) delivers outbox lines to subscribers.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{BusError, MessageBus};
use crate::messages::Envelope;

/// One line of the outbox file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub topic: String,
    /// Routing attribute, duplicated from the envelope.
    pub to: String,
    /// Envelope JSON text, as the bus would deliver it.
    pub message: String,
}

/// Appends publications to a JSON-lines file.
pub struct OutboxBus {
    topic: String,
    path: PathBuf,
    lock: Mutex<()>,
}

impl OutboxBus {
    pub fn new(topic: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            topic: topic.into(),
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every entry written so far.
    pub fn read_entries(&self) -> Result<Vec<OutboxEntry>, BusError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(&self.path).map_err(|e| BusError::io("open outbox", e))?;
        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| BusError::io("read outbox", e))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<OutboxEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!("Skipping unreadable outbox line: {}", e),
            }
        }
        Ok(entries)
    }
}

impl MessageBus for OutboxBus {
    fn publish(&self, envelope: &Envelope) -> Result<(), BusError> {
        let entry = OutboxEntry {
            topic: self.topic.clone(),
            to: envelope.to.to_string(),
            message: envelope.to_json()?,
        };
        let line = serde_json::to_string(&entry)
            .map_err(|e| BusError::Unavailable(format!("failed to encode outbox entry: {}", e)))?;

        let _guard = self.lock.lock();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| BusError::io("create outbox dir", e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| BusError::io("open outbox", e))?;
        writeln!(file, "{}", line).map_err(|e| BusError::io("append outbox", e))?;

        tracing::info!(
            "Sending message from {} to {} on {}: {}",
            envelope.from,
            envelope.to,
            self.topic,
            entry.message
        );
        Ok(())
    }
}
