pub mod disk;
pub mod log;
pub mod snapshot;

pub use log::{CommandLog, LogEntry};
pub use snapshot::{SnapshotRecord, SnapshotStore};
