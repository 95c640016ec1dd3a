//! Shared data model, constants and primitive newtypes for the voting sequencer.
//!
//! This crate has no cryptographic operations of its own: it defines the field-element alias
//! shared by every stage of the recursion tower, the byte-level newtypes used as sparse-Merkle
//! keys, the immutable per-process configuration (`BallotMode`, `Process`), and the transition
//! tagging used by the state engine and the `StateTransition` circuit.

pub mod base;
pub mod constants;
pub mod error;
pub mod schema;

pub use base::{FieldBytes, HexField, StateKey};
pub use constants::*;
pub use error::CoreError;
pub use schema::{BallotMode, Fnc, Process, Transition};

/// The scalar field shared by MiMC7, Poseidon, the sparse Merkle tree, and the base-layer
/// (BN254) circuits. Every other curve in the recursion tower treats this as a "far" field,
/// emulated through nonnative arithmetic rather than aliased directly.
pub type Fr = ark_bn254::Fr;
