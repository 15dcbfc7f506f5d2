pub(crate) mod executor;
pub(crate) mod recovery;

pub(crate) use executor::Executor;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::core::{PrevalenceError, Result};

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    rmp_serde::to_vec(value)
        .map_err(|e| PrevalenceError::SerializationFailure(format!("failed to encode: {}", e)))
}

/// Decoding during recovery: a failure means the durable state cannot be
/// trusted, so it maps to `CorruptLog` rather than `SerializationFailure`.
pub(crate) fn decode_replay<T: DeserializeOwned>(bytes: &[u8], what: &str) -> Result<T> {
    rmp_serde::from_slice(bytes)
        .map_err(|e| PrevalenceError::CorruptLog(format!("failed to decode {}: {}", what, e)))
}
