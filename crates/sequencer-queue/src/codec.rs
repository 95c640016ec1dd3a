//! CBOR wire encoding for queue entries and reservation records (§4.8).

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::QueueError;

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, QueueError> {
    let mut out = Vec::new();
    ciborium::into_writer(value, &mut out).map_err(|err| QueueError::Codec(err.to_string()))?;
    Ok(out)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, QueueError> {
    ciborium::from_reader(bytes).map_err(|err| QueueError::Codec(err.to_string()))
}
