//! Lifecycle state machine tests: close, shut, erase, drop, export

use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use prevadb::storage::{CommandLog, SnapshotStore, disk};
use prevadb::{Command, Persistent, PrevalenceError, StoreOptions, StoreState};

#[derive(Debug, Serialize, Deserialize)]
struct Inc(u64);

impl Command<u64> for Inc {
    type Output = u64;

    fn apply(&self, root: &mut u64) -> u64 {
        *root += self.0;
        *root
    }
}

fn create(dir: &TempDir) -> Persistent<u64, Inc> {
    Persistent::create(dir.path(), 0).unwrap()
}

#[test]
fn test_close_transitions_and_blocks_operations() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = create(&temp_dir);
    store.execute(Inc(1)).unwrap();

    store.close().unwrap();
    assert!(!store.is_open());
    assert_eq!(store.state(), StoreState::Closed);

    assert!(matches!(
        store.execute(Inc(1)),
        Err(PrevalenceError::AlreadyClosed)
    ));
    assert!(matches!(
        store.query(|n| *n),
        Err(PrevalenceError::AlreadyClosed)
    ));
    assert!(matches!(
        store.snapshot(),
        Err(PrevalenceError::AlreadyClosed)
    ));
    assert!(matches!(
        store.last_sequence(),
        Err(PrevalenceError::AlreadyClosed)
    ));
    assert!(matches!(store.close(), Err(PrevalenceError::AlreadyClosed)));
    assert!(matches!(store.shut(), Err(PrevalenceError::AlreadyClosed)));
}

#[test]
fn test_shut_transitions_and_blocks_operations() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = create(&temp_dir);
    store.shut().unwrap();

    assert!(!store.is_open());
    assert_eq!(store.state(), StoreState::Shut);
    assert!(matches!(
        store.query(|n| *n),
        Err(PrevalenceError::AlreadyClosed)
    ));
    assert!(matches!(store.close(), Err(PrevalenceError::AlreadyClosed)));
}

#[test]
fn test_erase_from_open() {
    let temp_dir = TempDir::new().unwrap();
    let location = temp_dir.path().join("store");
    let store: Persistent<u64, Inc> = Persistent::create(&location, 0).unwrap();
    store.execute(Inc(1)).unwrap();

    store.erase().unwrap();
    assert!(!prevadb::exists(&location));
}

#[test]
fn test_erase_from_closed() {
    let temp_dir = TempDir::new().unwrap();
    let location = temp_dir.path().join("store");
    let mut store: Persistent<u64, Inc> = Persistent::create(&location, 0).unwrap();
    store.close().unwrap();

    store.erase().unwrap();
    assert!(!prevadb::exists(&location));
}

#[test]
fn test_erase_from_shut_fails() {
    let temp_dir = TempDir::new().unwrap();
    let location = temp_dir.path().join("store");
    let mut store: Persistent<u64, Inc> = Persistent::create(&location, 0).unwrap();
    store.shut().unwrap();

    assert!(matches!(store.erase(), Err(PrevalenceError::AlreadyClosed)));
    // The shut store's durable state is untouched.
    assert!(prevadb::exists(&location));
}

#[test]
fn test_drop_closes_open_store() {
    let temp_dir = TempDir::new().unwrap();

    {
        let store = create(&temp_dir);
        store.execute(Inc(1)).unwrap();
        // Dropped without an explicit close.
    }

    // Drop performed a graceful close: the snapshot covers the command.
    let snapshot = SnapshotStore::read(&disk::snapshot_path(temp_dir.path()))
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.seq, 1);

    let store: Persistent<u64, Inc> = Persistent::load(temp_dir.path()).unwrap();
    assert_eq!(store.query(|n| *n).unwrap(), 1);
}

#[test]
fn test_transient_close_skips_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let options = StoreOptions::new().transient(true);

    {
        let mut store: Persistent<u64, Inc> =
            Persistent::create_with(temp_dir.path(), 0, options).unwrap();
        store.execute(Inc(5)).unwrap();
        store.close().unwrap();
    }

    // Only the initial sequence-0 snapshot exists; the command stayed in the
    // log and recovery replays it.
    let snapshot = SnapshotStore::read(&disk::snapshot_path(temp_dir.path()))
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.seq, 0);
    let entries = CommandLog::read_entries(&disk::log_path(temp_dir.path())).unwrap();
    assert_eq!(entries.len(), 1);

    let store: Persistent<u64, Inc> = Persistent::load(temp_dir.path()).unwrap();
    assert_eq!(store.query(|n| *n).unwrap(), 5);
}

#[test]
fn test_export_snapshot_writes_readable_dump() {
    let temp_dir = TempDir::new().unwrap();
    let store = create(&temp_dir);
    store.execute(Inc(3)).unwrap();

    let dump = temp_dir.path().join("root.json");
    store.export_snapshot(&dump).unwrap();

    let exported: u64 = serde_json::from_str(&std::fs::read_to_string(&dump).unwrap()).unwrap();
    assert_eq!(exported, 3);

    // Exporting is a read; the store stays open and usable.
    assert!(store.is_open());
    assert_eq!(store.execute(Inc(1)).unwrap(), 4);
}

#[test]
fn test_last_sequence_tracks_commands() {
    let temp_dir = TempDir::new().unwrap();
    let store = create(&temp_dir);
    assert_eq!(store.last_sequence().unwrap(), 0);
    store.execute(Inc(1)).unwrap();
    store.execute(Inc(1)).unwrap();
    assert_eq!(store.last_sequence().unwrap(), 2);
}
