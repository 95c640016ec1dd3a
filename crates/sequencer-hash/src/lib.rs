//! MiMC7, Poseidon and sparse-Merkle-tree leaf hashing over BN254 (§4.2).
//!
//! Every function here is total: callers bound input arity and encoding before reaching this
//! crate, so there is no error type to propagate.

pub mod mimc7;
pub mod nonnative;
pub mod poseidon;
pub mod smt_leaf;
