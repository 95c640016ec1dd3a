//! State-engine error taxonomy (§4.3, §7).
//!
//! `sequencer-core::CoreError` already carries the lifecycle variants (`StateClosed`,
//! `StateOpen`, `BallotMalformed`, `KeyWidth`, `DuplicateWithinBatch`) §4.3's failure model names;
//! this type adds only the tree-level failures that have no counterpart there.

use sequencer_core::CoreError;
use thiserror::Error;

/// Errors raised by the sparse Merkle tree and the batch lifecycle built on top of it.
#[derive(Debug, Error)]
pub enum StateError {
    /// A data-model or lifecycle invariant from `sequencer-core` was violated.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The tree tried to insert a key that already has a leaf.
    #[error("key {0} already has a leaf")]
    KeyAlreadyExists(sequencer_core::StateKey),

    /// A node hash referenced by the tree was not found in the backing store.
    #[error("missing tree node for hash")]
    MissingNode,

    /// Descent exceeded `StateProofMaxLevels` without terminating; the store is corrupt.
    #[error("sparse Merkle tree descent exceeded its maximum depth")]
    TreeFull,

    /// The backing store reported a failure.
    #[error("state store error: {0}")]
    Store(String),
}
