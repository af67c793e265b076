//! In-memory record store.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::{JobHistory, JobRecordStore, StoreError};
use crate::models::{JobEvent, JobIdentity};

/// Record store held in memory (for testing and the local simulator).
#[derive(Debug, Default)]
pub struct MemoryStore {
    events: Mutex<Vec<JobEvent>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every append fail.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Events in write order.
    pub fn events(&self) -> Vec<JobEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl JobRecordStore for MemoryStore {
    fn append(&self, event: &JobEvent) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        self.events.lock().push(event.clone());
        Ok(())
    }
}

impl JobHistory for MemoryStore {
    fn history(&self, job: &JobIdentity) -> Result<Vec<JobEvent>, StoreError> {
        let mut events: Vec<JobEvent> = self
            .events
            .lock()
            .iter()
            .filter(|e| &e.job == job)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.timestamp);
        Ok(events)
    }

    fn all_events(&self) -> Result<Vec<JobEvent>, StoreError> {
        let mut events = self.events();
        events.sort_by_key(|e| e.timestamp);
        Ok(events)
    }
}
