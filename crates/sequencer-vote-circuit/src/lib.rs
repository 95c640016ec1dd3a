//! VoteVerifier circuit (C5): the recursion tower's second stage.
//!
//! Recursively verifies a BallotProof (C4), verifies the voter's ECDSA signature over
//! `H(BallotInputsHash)`, and checks the voter's census Merkle inclusion — all natively, since
//! none of the three crosses a field boundary arkworks can verify directly from BLS12-377
//! (§REDESIGN, "cross-field recursion boundaries"). The circuit itself binds the witnessed
//! fields and those natively-checked outcomes into a public `VoteDigest`, alongside a
//! limb-packed copy of §4.5's `InputsHash` for the next stage to recompose.

mod circuit;
mod proof;
mod public_inputs;
mod witness;

pub use circuit::{VoteCircuit, INPUTS_HASH_LIMBS};
pub use proof::{create_vote_proof, generate_keys, verify_vote_proof, ProofError, VoteProof};
pub use public_inputs::PublicInputs;
pub use witness::{address_from_pub_key, vote_inputs_hash, VoteWitness, WitnessError};
