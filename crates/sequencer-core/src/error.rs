//! Shared error taxonomy for the voting sequencer (§7).

use thiserror::Error;

/// Errors shared by the data-model and state layers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A ballot did not carry exactly `FIELDS_PER_BALLOT` ciphertexts.
    #[error("ballot has {got} ciphertexts, expected {expected}")]
    BallotMalformed {
        /// Number of ciphertexts actually present.
        got: usize,
        /// Number of ciphertexts required.
        expected: usize,
    },

    /// A key exceeded the sparse-Merkle-tree key width.
    #[error("key is {got} bytes, maximum is {max}")]
    KeyWidth {
        /// Length of the offending key in bytes.
        got: usize,
        /// Maximum permitted key length in bytes.
        max: usize,
    },

    /// The batch lifecycle method was called while no batch was open.
    #[error("state is closed: no batch is open")]
    StateClosed,

    /// `StartBatch` was called while a batch was already open.
    #[error("state is open: a batch is already in progress")]
    StateOpen,

    /// The same nullifier appeared twice within a single `AddVote` call sequence.
    #[error("nullifier appears twice within the same batch submission")]
    DuplicateWithinBatch,
}
