pub mod command;
pub mod error;

pub use command::{Command, ContextCommand, ExecutionContext};
pub use error::{PrevalenceError, Result};
