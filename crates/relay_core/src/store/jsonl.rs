//! Append-only JSON-lines record store.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::{JobHistory, JobRecordStore, StoreError};
use crate::models::{JobEvent, JobIdentity};

/// Record store persisted as one JSON object per line.
///
/// Rows are only ever appended; nothing is rewritten in place.
pub struct JsonLinesStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLinesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Vec<JobEvent>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file =
            fs::File::open(&self.path).map_err(|e| StoreError::io("open", &self.path, e))?;

        let mut events = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| StoreError::io("read", &self.path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let event = serde_json::from_str(&line).map_err(|source| StoreError::Corrupt {
                line: index + 1,
                source,
            })?;
            events.push(event);
        }

        events.sort_by_key(|e: &JobEvent| e.timestamp);
        Ok(events)
    }
}

impl JobRecordStore for JsonLinesStore {
    fn append(&self, event: &JobEvent) -> Result<(), StoreError> {
        let line = serde_json::to_string(event).map_err(StoreError::Encode)?;

        let _guard = self.lock.lock();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io("create dir", parent, e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io("open", &self.path, e))?;
        writeln!(file, "{}", line).map_err(|e| StoreError::io("append", &self.path, e))?;

        tracing::debug!(
            "Recorded {} stage {} progress {} result {:?}",
            event.job,
            event.stage,
            event.progress,
            event.result
        );
        Ok(())
    }
}

impl JobHistory for JsonLinesStore {
    fn history(&self, job: &JobIdentity) -> Result<Vec<JobEvent>, StoreError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|e| &e.job == job)
            .collect())
    }

    fn all_events(&self) -> Result<Vec<JobEvent>, StoreError> {
        self.read_all()
    }
}
