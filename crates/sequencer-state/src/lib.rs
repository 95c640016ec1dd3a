//! Sparse-Merkle-tree state engine and batch lifecycle (§4.3, C3).
//!
//! This crate owns the tally tree — the SMT that holds the process's reserved leaves, one
//! leaf digest per voted nullifier, and one leaf digest per voting address — plus the batch
//! lifecycle (`StartBatch`/`AddVote`/`EndBatch`) that feeds it and emits the transition
//! witnesses the state-transition circuit (C7) re-chains.

pub mod engine;
pub mod error;
pub mod node;
pub mod replay;
pub mod schema;
pub mod store;
pub mod tree;

pub use engine::{ballot_digest, Engine, HeaderInclusion, ResultsSnapshot, VoteOutcome};
pub use error::StateError;
pub use node::Node;
pub use replay::verify_transition;
pub use schema::{AggregatedBatch, RecursionProof, Vote, VerifiedBallot};
pub use store::{MemorySmtStore, SledSmtStore, SmtStore};
pub use tree::{MembershipProof, SparseMerkleTree};
