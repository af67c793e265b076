//! In-process bus backed by a queue.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::{BusError, MessageBus};
use crate::messages::Envelope;

/// Queue-backed bus.
///
/// Publications are queued for delivery (`drain`) and also kept in a
/// history (`published`) so tests can assert on everything sent.
#[derive(Debug, Default)]
pub struct MemoryBus {
    pending: Mutex<VecDeque<Envelope>>,
    history: Mutex<Vec<Envelope>>,
    offline: AtomicBool,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every publish fail (simulates a transport outage).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Take every message queued for delivery, oldest first.
    pub fn drain(&self) -> Vec<Envelope> {
        self.pending.lock().drain(..).collect()
    }

    /// Everything published so far.
    pub fn published(&self) -> Vec<Envelope> {
        self.history.lock().clone()
    }

    /// Number of messages awaiting delivery.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }
}

impl MessageBus for MemoryBus {
    fn publish(&self, envelope: &Envelope) -> Result<(), BusError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(BusError::Unavailable("memory bus is offline".to_string()));
        }

        self.pending.lock().push_back(envelope.clone());
        self.history.lock().push(envelope.clone());
        Ok(())
    }
}
