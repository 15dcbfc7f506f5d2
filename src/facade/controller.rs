//! Public controller over the prevalence engine.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLockReadGuard;

use log::warn;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::core::{ContextCommand, PrevalenceError, Result};
use crate::engine::{self, Executor, recovery};
use crate::storage::{SnapshotStore, disk};

/// Lifecycle state of a controller instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Open,
    Closed,
    Shut,
    Erased,
}

/// Store configuration.
///
/// # Examples
///
/// ```
/// use prevadb::StoreOptions;
///
/// let options = StoreOptions::new()
///     .transient(true)
///     .snapshot_every(1000);
/// assert!(options.is_transient());
/// ```
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    transient: bool,
    snapshot_every: Option<u64>,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip the automatic snapshot on graceful close. Commands are still
    /// logged durably; only snapshotting is affected.
    pub fn transient(mut self, transient: bool) -> Self {
        self.transient = transient;
        self
    }

    /// Take a snapshot automatically after every `commands` executed
    /// commands, truncating the covered log entries.
    pub fn snapshot_every(mut self, commands: u64) -> Self {
        self.snapshot_every = Some(commands);
        self
    }

    pub fn is_transient(&self) -> bool {
        self.transient
    }
}

/// True when durable store state is present at `location`, without opening
/// or mutating anything.
pub fn exists(location: impl AsRef<Path>) -> bool {
    disk::exists(location.as_ref())
}

/// Controller of a prevalent store.
///
/// `R` is the root domain object, `C` the command set applied to it (one
/// serializable type per store, typically an enum). All mutation goes through
/// [`Persistent::execute`], which logs the command durably before applying
/// it; [`Persistent::query`] reads the live root under a shared lock.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use serde::{Deserialize, Serialize};
/// use prevadb::{Command, Persistent};
///
/// #[derive(Serialize, Deserialize)]
/// enum KvCommand {
///     Set { key: String, value: String },
/// }
///
/// impl Command<HashMap<String, String>> for KvCommand {
///     type Output = Option<String>;
///
///     fn apply(&self, root: &mut HashMap<String, String>) -> Option<String> {
///         match self {
///             KvCommand::Set { key, value } => root.insert(key.clone(), value.clone()),
///         }
///     }
/// }
///
/// # fn main() -> prevadb::Result<()> {
/// let dir = tempfile::tempdir().unwrap();
/// let mut store: Persistent<_, KvCommand> =
///     Persistent::create(dir.path(), HashMap::<String, String>::new())?;
///
/// store.execute(KvCommand::Set {
///     key: "greeting".into(),
///     value: "hello".into(),
/// })?;
///
/// let value = store.query(|root| root.get("greeting").cloned())?;
/// assert_eq!(value.as_deref(), Some("hello"));
///
/// store.close()?;
/// # Ok(())
/// # }
/// ```
pub struct Persistent<R, C>
where
    R: Serialize + DeserializeOwned,
    C: ContextCommand<R> + Serialize + DeserializeOwned,
{
    engine: Option<Executor<R, C>>,
    location: PathBuf,
    options: StoreOptions,
    state: StoreState,
}

impl<R, C> Persistent<R, C>
where
    R: Serialize + DeserializeOwned,
    C: ContextCommand<R> + Serialize + DeserializeOwned,
{
    /// Opens a store at `location`, initializing it with `initial_root` when
    /// no durable state exists there yet.
    ///
    /// When the location already holds a store, this attaches to it and the
    /// supplied root is ignored (prior state wins).
    pub fn create(location: impl AsRef<Path>, initial_root: R) -> Result<Self> {
        Self::create_with(location, initial_root, StoreOptions::default())
    }

    pub fn create_with(
        location: impl AsRef<Path>,
        initial_root: R,
        options: StoreOptions,
    ) -> Result<Self> {
        let location = location.as_ref();
        if disk::exists(location) {
            return Self::load_at(location.to_path_buf(), options);
        }
        disk::init_location(location)?;
        // An initial snapshot at sequence 0 gives every later load a replay
        // base, even when the store is shut before its first snapshot.
        let snapshots = SnapshotStore::new(disk::snapshot_path(location));
        snapshots.write(0, engine::encode(&initial_root)?)?;
        let executor = Executor::open(location, initial_root, 0, options.snapshot_every)?;
        Ok(Self {
            engine: Some(executor),
            location: location.to_path_buf(),
            options,
            state: StoreState::Open,
        })
    }

    /// Opens the store already present at `location`; fails with
    /// [`PrevalenceError::NotFound`] when there is none.
    pub fn load(location: impl AsRef<Path>) -> Result<Self> {
        Self::load_with(location, StoreOptions::default())
    }

    pub fn load_with(location: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        Self::load_at(location.as_ref().to_path_buf(), options)
    }

    /// Loads the store at `location` if one exists, otherwise creates one
    /// from the supplier's root. The supplier is invoked at most once, and
    /// never when durable state exists.
    pub fn load_optional(location: impl AsRef<Path>, default: impl FnOnce() -> R) -> Result<Self> {
        Self::load_optional_with(location, default, StoreOptions::default())
    }

    pub fn load_optional_with(
        location: impl AsRef<Path>,
        default: impl FnOnce() -> R,
        options: StoreOptions,
    ) -> Result<Self> {
        let location = location.as_ref();
        if disk::exists(location) {
            Self::load_at(location.to_path_buf(), options)
        } else {
            Self::create_with(location, default(), options)
        }
    }

    fn load_at(location: PathBuf, options: StoreOptions) -> Result<Self> {
        if !disk::exists(&location) {
            return Err(PrevalenceError::NotFound(location.display().to_string()));
        }
        let recovered = recovery::recover::<R, C>(&location)?;
        let executor = Executor::open(&location, recovered.root, recovered.seq, options.snapshot_every)?;
        Ok(Self {
            engine: Some(executor),
            location,
            options,
            state: StoreState::Open,
        })
    }

    fn engine(&self) -> Result<&Executor<R, C>> {
        self.engine.as_ref().ok_or(PrevalenceError::AlreadyClosed)
    }

    /// Evaluates a read-only function against the live root.
    ///
    /// Queries may run concurrently with each other but never with a
    /// command's application. Nothing a query computes is made durable.
    pub fn query<T>(&self, query: impl FnOnce(&R) -> T) -> Result<T> {
        self.engine()?.query(query)
    }

    /// Executes a mutating command: durably logged first, then applied to the
    /// live root, with the command's output returned. If the log append
    /// fails, the root is guaranteed unchanged.
    pub fn execute(&self, command: C) -> Result<C::Output> {
        self.engine()?.execute(command)
    }

    /// A read-locked borrow of the live root. Holding the guard blocks
    /// commands and snapshots, so prefer [`Persistent::query`] for anything
    /// long-running.
    pub fn read(&self) -> Result<RwLockReadGuard<'_, R>> {
        self.engine()?.read()
    }

    /// Takes a snapshot of the current root and truncates the log entries it
    /// covers. Returns the sequence the snapshot was taken at.
    pub fn snapshot(&self) -> Result<u64> {
        self.engine()?.take_snapshot()
    }

    /// Writes a human-readable (pretty JSON) dump of the current root to
    /// `destination`.
    pub fn export_snapshot(&self, destination: impl AsRef<Path>) -> Result<()> {
        let engine = self.engine()?;
        let root = engine.read()?;
        let file = File::create(destination.as_ref()).map_err(|e| {
            PrevalenceError::DurabilityFailure(format!("failed to create export file: {}", e))
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &*root).map_err(|e| {
            PrevalenceError::SerializationFailure(format!("failed to export root: {}", e))
        })?;
        writer.flush().map_err(|e| {
            PrevalenceError::DurabilityFailure(format!("failed to write export: {}", e))
        })?;
        Ok(())
    }

    /// Gracefully closes the store: takes a final snapshot (unless the store
    /// was opened transient), then releases the engine and its file handles.
    /// Every subsequent operation on this instance fails with
    /// [`PrevalenceError::AlreadyClosed`].
    pub fn close(&mut self) -> Result<()> {
        let engine = self.engine.take().ok_or(PrevalenceError::AlreadyClosed)?;
        self.state = StoreState::Closed;
        if !self.options.is_transient() {
            engine.take_snapshot()?;
        }
        Ok(())
    }

    /// Shuts the store immediately, taking no snapshot. Committed commands
    /// are never lost: a later load replays the log from the last existing
    /// snapshot.
    pub fn shut(&mut self) -> Result<()> {
        self.engine.take().ok_or(PrevalenceError::AlreadyClosed)?;
        self.state = StoreState::Shut;
        Ok(())
    }

    /// Destroys the store: closes it if still open, then deletes all durable
    /// state at the location.
    pub fn erase(mut self) -> Result<()> {
        match self.state {
            StoreState::Open => self.close()?,
            StoreState::Closed => {}
            StoreState::Shut | StoreState::Erased => {
                return Err(PrevalenceError::AlreadyClosed);
            }
        }
        disk::delete_store(&self.location)?;
        self.state = StoreState::Erased;
        Ok(())
    }

    /// True only while the store is open.
    pub fn is_open(&self) -> bool {
        self.state == StoreState::Open
    }

    pub fn state(&self) -> StoreState {
        self.state
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Sequence number of the last executed command (0 for a fresh store).
    pub fn last_sequence(&self) -> Result<u64> {
        Ok(self.engine()?.current_seq())
    }
}

impl<R, C> Drop for Persistent<R, C>
where
    R: Serialize + DeserializeOwned,
    C: ContextCommand<R> + Serialize + DeserializeOwned,
{
    fn drop(&mut self) {
        if self.state == StoreState::Open {
            if let Err(e) = self.close() {
                warn!("failed to close store at {} on drop: {}", self.location.display(), e);
            }
        }
    }
}
