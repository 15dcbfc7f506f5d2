//! Recommended API entrypoints.
//!
//! Everything an application needs to define commands and drive a store:
//!
//! ```
//! use prevadb::prelude::*;
//! ```

pub use crate::core::{Command, ContextCommand, ExecutionContext, PrevalenceError, Result};
pub use crate::facade::{Persistent, StoreOptions, StoreState, exists};
