//! Message bus transport.
//!
//! The bus is publish/subscribe: every subscriber receives every message
//! and filters on the `to` field itself. Delivery is at-least-once with no
//! deduplication.
//!
//! Two transports ship with the crate:
//! - `MemoryBus`: an in-process queue (tests and the local simulator)
//! - `OutboxBus`: appends each publication to a JSON-lines file

mod memory;
mod outbox;

use std::io;

use thiserror::Error;

use crate::messages::{Envelope, MessageError};

pub use memory::MemoryBus;
pub use outbox::{OutboxBus, OutboxEntry};

/// Errors publishing a message.
#[derive(Error, Debug)]
pub enum BusError {
    #[error(transparent)]
    Encode(#[from] MessageError),

    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    #[error("Bus unavailable: {0}")]
    Unavailable(String),
}

impl BusError {
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

/// A publish endpoint on the shared topic.
pub trait MessageBus: Send + Sync {
    /// Publish one message to all subscribers.
    fn publish(&self, envelope: &Envelope) -> Result<(), BusError>;
}
