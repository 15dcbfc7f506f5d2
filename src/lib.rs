//! In-process object prevalence store.
//!
//! One authoritative, fully in-memory root object lives for the life of a
//! process. Every mutating command is appended to a durable write-ahead log
//! before it is applied, and full snapshots periodically shorten recovery:
//! opening a store loads the latest snapshot and replays the log tail, which
//! reconstructs the exact pre-crash state. Reads go straight to the live root
//! under a shared lock and never touch the disk.
//!
//! The main entry point is [`Persistent`]; commands implement [`Command`] or
//! [`ContextCommand`] and are serialized with MessagePack into the log.

pub mod core;
mod engine;
pub mod facade;
pub mod prelude;
pub mod storage;

// Re-export main types for convenience
pub use crate::core::{Command, ContextCommand, ExecutionContext, PrevalenceError, Result};
pub use crate::facade::{Persistent, StoreOptions, StoreState, exists};
