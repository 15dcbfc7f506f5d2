//! Snapshot-plus-replay reconstruction at open time.

use std::path::Path;

use log::debug;
use serde::de::DeserializeOwned;

use crate::core::{ContextCommand, PrevalenceError, Result};
use crate::storage::{CommandLog, SnapshotStore, disk};

pub(crate) struct Recovered<R> {
    pub root: R,
    pub seq: u64,
}

/// Reconstructs the root and the sequence counter for a location that holds
/// durable state: decode the latest snapshot, then apply every later log
/// entry in order, each with its recorded context. Any decode failure or
/// sequence gap is fatal; a command panic during re-application propagates.
pub(crate) fn recover<R, C>(location: &Path) -> Result<Recovered<R>>
where
    R: DeserializeOwned,
    C: ContextCommand<R> + DeserializeOwned,
{
    let snapshots = SnapshotStore::new(disk::snapshot_path(location));
    let record = snapshots.read_latest()?.ok_or_else(|| {
        PrevalenceError::CorruptLog("store has a command log but no snapshot".to_string())
    })?;
    let mut root: R = super::decode_replay(&record.payload, "snapshot root")?;
    let mut seq = record.seq;

    let entries = CommandLog::read_entries_since(&disk::log_path(location), seq)?;
    let replayed = entries.len();
    for entry in entries {
        let command: C = super::decode_replay(&entry.payload, "logged command")?;
        command.apply(&mut root, &entry.ctx);
        seq = entry.seq;
    }
    debug!(
        "recovered store at {}: snapshot seq {}, {} entries replayed",
        location.display(),
        record.seq,
        replayed
    );
    Ok(Recovered { root, seq })
}
