//! Aggregator circuit (C6): the recursion tower's third stage.
//!
//! Batches up to `VotesPerBatch` VoteVerifier proofs (C5) for a single process, padding any
//! unused slots with a fixed dummy vote (§4.6). Every slot's recursive verification runs
//! natively, the same way `VoteWitness::new` already handles BallotProof recursion, ECDSA
//! verification and census inclusion; this circuit binds the batch together into a public
//! `AggregatorDigest`, alongside a limb-packed copy of §4.6's `AggregatedInputsHash` for the
//! StateTransition stage to recompose.

mod circuit;
mod dummy;
mod proof;
mod public_inputs;
mod witness;

pub use circuit::{AggregatorCircuit, INPUTS_HASH_LIMBS_OUT};
pub use dummy::{build as build_dummy_vote, dummy_ballot_mode, DummyError, DummyVote};
pub use proof::{create_aggregator_proof, generate_keys, verify_aggregator_proof, AggregatorProof, ProofError};
pub use public_inputs::PublicInputs;
pub use witness::{AggregatorWitness, RealVote, VoteSlot, WitnessError};
