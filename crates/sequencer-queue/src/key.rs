//! Content-addressed queue keys (§4.8, §6).
//!
//! A queue entry's key is the first 12 bytes of `SHA-256` of its encoded value; per-process
//! queues (verified ballots, batches) prefix that with the owning `ProcessID` so a single `sled`
//! tree can hold every process's entries while still letting `scan_prefix` isolate one.

use sequencer_core::StateKey;
use sha2::{Digest, Sha256};

/// Length of the content-hash portion of a queue key.
pub const CONTENT_HASH_BYTES: usize = 12;

/// A key into one of the queue substrate's `sled` trees.
///
/// Either a bare 12-byte content hash or, for per-process queues, a 20-byte `ProcessID` followed
/// by the 12-byte content hash.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueueKey(Vec<u8>);

impl QueueKey {
    /// A content-addressed key with no process prefix, for the pending-ballot queue.
    #[must_use]
    pub fn content_only(encoded: &[u8]) -> Self {
        Self(content_hash(encoded).to_vec())
    }

    /// A content-addressed key prefixed by `process_id`, for a per-process queue.
    #[must_use]
    pub fn for_process(process_id: StateKey, encoded: &[u8]) -> Self {
        let mut bytes = process_id.as_bytes().to_vec();
        bytes.extend_from_slice(&content_hash(encoded));
        Self(bytes)
    }

    /// Wrap raw `sled` key bytes read back from a tree.
    #[must_use]
    pub fn from_raw(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Borrow the raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Whether this key carries a `ProcessID` prefix (per-process queues only).
    #[must_use]
    pub fn starts_with(&self, process_id: StateKey) -> bool {
        self.0.starts_with(process_id.as_bytes())
    }
}

impl std::fmt::Display for QueueKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

fn content_hash(encoded: &[u8]) -> [u8; CONTENT_HASH_BYTES] {
    let digest = Sha256::digest(encoded);
    let mut out = [0_u8; CONTENT_HASH_BYTES];
    #[allow(
        clippy::indexing_slicing,
        reason = "a SHA-256 digest is always 32 bytes, well over CONTENT_HASH_BYTES"
    )]
    out.copy_from_slice(&digest[..CONTENT_HASH_BYTES]);
    out
}
