//! Single-writer execution over the live root.
//!
//! All mutation funnels through [`Executor::execute`]: the root write lock
//! serializes commands into a strict total order, the durable append happens
//! before the in-memory application, and queries share a read lock that is
//! never held concurrently with a command.

use std::marker::PhantomData;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock, RwLockReadGuard};

use log::{info, warn};
use serde::Serialize;

use crate::core::{ContextCommand, ExecutionContext, Result};
use crate::storage::{CommandLog, SnapshotStore, disk};

pub(crate) struct Executor<R, C> {
    root: RwLock<R>,
    /// Sequence of the last fully applied command; written only under the
    /// root write lock, so it is stable for any holder of the read lock.
    seq: AtomicU64,
    log: Mutex<CommandLog>,
    snapshots: SnapshotStore,
    snapshot_every: Option<u64>,
    since_snapshot: AtomicU64,
    _commands: PhantomData<fn(C)>,
}

impl<R, C> Executor<R, C>
where
    R: Serialize,
    C: ContextCommand<R> + Serialize,
{
    pub fn open(location: &Path, root: R, seq: u64, snapshot_every: Option<u64>) -> Result<Self> {
        let mut log = CommandLog::open(disk::log_path(location))?;
        log.resume_from(seq);
        Ok(Self {
            root: RwLock::new(root),
            seq: AtomicU64::new(seq),
            log: Mutex::new(log),
            snapshots: SnapshotStore::new(disk::snapshot_path(location)),
            snapshot_every,
            since_snapshot: AtomicU64::new(0),
            _commands: PhantomData,
        })
    }

    pub fn current_seq(&self) -> u64 {
        self.seq.load(Ordering::Acquire)
    }

    /// Applies `command` under exclusive access: durable append first, then
    /// the in-memory application. A failed append surfaces without touching
    /// the root; a panic inside `apply` of an already-logged command poisons
    /// the lock and leaves whatever partial mutation occurred.
    pub fn execute(&self, command: C) -> Result<C::Output> {
        let mut root = self.root.write()?;
        let payload = super::encode(&command)?;
        let ctx = {
            let mut log = self.log.lock()?;
            let ctx = ExecutionContext::assign(log.next_seq());
            log.append(&ctx, &payload)?;
            ctx
        };
        self.seq.store(ctx.seq, Ordering::Release);
        let output = command.apply(&mut *root, &ctx);
        drop(root);
        self.maybe_snapshot();
        Ok(output)
    }

    fn maybe_snapshot(&self) {
        let Some(threshold) = self.snapshot_every else {
            return;
        };
        let executed = self.since_snapshot.fetch_add(1, Ordering::AcqRel) + 1;
        if executed >= threshold {
            // The triggering command is already durable; a failed snapshot
            // only delays truncation.
            if let Err(e) = self.take_snapshot() {
                warn!("threshold snapshot failed: {}", e);
            }
        }
    }

    /// Read-only evaluation; concurrent with other queries, never with a
    /// command's application.
    pub fn query<T>(&self, query: impl FnOnce(&R) -> T) -> Result<T> {
        let root = self.root.read()?;
        Ok(query(&*root))
    }

    /// A read-locked borrow of the live root.
    pub fn read(&self) -> Result<RwLockReadGuard<'_, R>> {
        Ok(self.root.read()?)
    }

    /// Serializes a consistent image of the root at the current sequence,
    /// publishes it, then truncates the log entries it covers. Idempotent:
    /// with no intervening commands a second call produces a redundant but
    /// harmless snapshot.
    pub fn take_snapshot(&self) -> Result<u64> {
        let (seq, payload) = {
            let root = self.root.read()?;
            let seq = self.seq.load(Ordering::Acquire);
            (seq, super::encode(&*root)?)
        };
        self.snapshots.write(seq, payload)?;
        self.log.lock()?.truncate_up_to(seq)?;
        self.since_snapshot.store(0, Ordering::Release);
        info!("snapshot taken at seq {}", seq);
        Ok(seq)
    }
}
