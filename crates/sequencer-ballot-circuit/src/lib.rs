//! BallotProof circuit (C4): the first stage of the recursion tower.
//!
//! Proves, over BN254, that one voter's encrypted ballot is well-formed against its process's
//! `BallotMode`: every used slot's plaintext lies in range, unused slots are zero, nonzero slots
//! are pairwise distinct when required, the (optionally weighted) cost sum is bounded, every
//! ciphertext encrypts the claimed plaintext under the process key and a single shared
//! randomness, and the commitment/nullifier pair is correctly derived. The only public value is
//! `InputsHash`, binding all of the above together.

mod circuit;
mod gadgets;
mod proof;
mod public_inputs;
mod witness;

pub use circuit::BallotCircuit;
pub use proof::{create_ballot_proof, generate_keys, verify_ballot_proof, BallotProof, ProofError};
pub use public_inputs::PublicInputs;
pub use witness::{BallotWitness, WitnessError};
