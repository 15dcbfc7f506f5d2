//! Snapshot persistence with atomic publish.
//!
//! A snapshot is written to a temp file in the store directory, fsynced, then
//! renamed over the current artifact, so readers never observe a partially
//! written snapshot. Exactly one artifact is current; the atomic replacement
//! discards the previous one.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{PrevalenceError, Result};

/// A durable full serialization of the root, tagged with the log sequence it
/// reflects. The root payload is opaque at this layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub seq: u64,
    pub taken_at: DateTime<Utc>,
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
}

pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Durably writes a snapshot; on success it becomes the current one.
    pub fn write(&self, seq: u64, payload: Vec<u8>) -> Result<()> {
        let record = SnapshotRecord {
            seq,
            taken_at: Utc::now(),
            payload,
        };
        let bytes = rmp_serde::to_vec(&record).map_err(|e| {
            PrevalenceError::SerializationFailure(format!("failed to encode snapshot: {}", e))
        })?;
        let dir = self.path.parent().ok_or_else(|| {
            PrevalenceError::DurabilityFailure("snapshot has no parent directory".to_string())
        })?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
            PrevalenceError::DurabilityFailure(format!("failed to create temp snapshot: {}", e))
        })?;
        tmp.write_all(&bytes).map_err(write_err)?;
        tmp.flush().map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| {
            PrevalenceError::DurabilityFailure(format!("failed to publish snapshot: {}", e))
        })?;
        Ok(())
    }

    /// The most recent durable snapshot, or `None` if never snapshotted.
    pub fn read_latest(&self) -> Result<Option<SnapshotRecord>> {
        Self::read(&self.path)
    }

    /// Like [`SnapshotStore::read_latest`], but against a path directly.
    pub fn read(path: &Path) -> Result<Option<SnapshotRecord>> {
        if !path.exists() {
            return Ok(None);
        }
        let mut file = File::open(path).map_err(|e| {
            PrevalenceError::DurabilityFailure(format!("failed to open snapshot: {}", e))
        })?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(|e| {
            PrevalenceError::DurabilityFailure(format!("failed to read snapshot: {}", e))
        })?;
        let record: SnapshotRecord = rmp_serde::from_slice(&bytes)
            .map_err(|e| PrevalenceError::CorruptLog(format!("unreadable snapshot: {}", e)))?;
        Ok(Some(record))
    }
}

fn write_err(e: std::io::Error) -> PrevalenceError {
    PrevalenceError::DurabilityFailure(format!("failed to write snapshot: {}", e))
}
