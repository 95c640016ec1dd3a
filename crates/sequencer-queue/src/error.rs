//! Queue-substrate error taxonomy (§4.8, §7).

use thiserror::Error;

/// Errors raised by the reservation-queue substrate.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The backing `sled` store failed.
    #[error("queue store error: {0}")]
    Io(#[from] sled::Error),

    /// A value did not encode or decode as valid CBOR.
    #[error("queue entry codec error: {0}")]
    Codec(String),

    /// `Reserve` raced another reservation of the same key.
    #[error("key already reserved")]
    KeyAlreadyExists,

    /// A lookup referenced a key with no matching queue entry.
    #[error("no such queue entry")]
    NotFound,

    /// `Next…` found no free (unreserved) entry to return.
    #[error("no free elements to pull")]
    NoMoreElements,
}
