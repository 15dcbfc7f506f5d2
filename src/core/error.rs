use std::sync::PoisonError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrevalenceError {
    #[error("no durable store at '{0}'")]
    NotFound(String),

    #[error("store is closed")]
    AlreadyClosed,

    #[error("serialization failure: {0}")]
    SerializationFailure(String),

    #[error("durability failure: {0}")]
    DurabilityFailure(String),

    #[error("corrupt log: {0}")]
    CorruptLog(String),

    #[error("root lock poisoned by an earlier panic")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, PrevalenceError>;

impl<T> From<PoisonError<T>> for PrevalenceError {
    fn from(_err: PoisonError<T>) -> Self {
        Self::LockPoisoned
    }
}
