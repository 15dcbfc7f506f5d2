//! Durable layout of a store location.
//!
//! A store location is a directory holding exactly two artifacts: the
//! append-only command log and the current snapshot.

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::{PrevalenceError, Result};

pub const LOG_FILE: &str = "prevadb.wal";
pub const SNAPSHOT_FILE: &str = "prevadb.snapshot";

pub fn log_path(location: &Path) -> PathBuf {
    location.join(LOG_FILE)
}

pub fn snapshot_path(location: &Path) -> PathBuf {
    location.join(SNAPSHOT_FILE)
}

/// True when durable store state is present at the location.
pub fn exists(location: &Path) -> bool {
    log_path(location).exists() || snapshot_path(location).exists()
}

pub fn init_location(location: &Path) -> Result<()> {
    fs::create_dir_all(location).map_err(|e| {
        PrevalenceError::DurabilityFailure(format!("failed to create store directory: {}", e))
    })
}

/// Removes all durable state at the location, directory included.
pub fn delete_store(location: &Path) -> Result<()> {
    if !location.exists() {
        return Ok(());
    }
    fs::remove_dir_all(location).map_err(|e| {
        PrevalenceError::DurabilityFailure(format!("failed to delete store directory: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_exists_tracks_artifacts() {
        let temp_dir = TempDir::new().unwrap();
        let location = temp_dir.path().join("store");
        assert!(!exists(&location));

        init_location(&location).unwrap();
        assert!(!exists(&location)); // empty directory is not a store

        fs::write(log_path(&location), b"").unwrap();
        assert!(exists(&location));

        delete_store(&location).unwrap();
        assert!(!exists(&location));
    }
}
