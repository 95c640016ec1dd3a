//! Private witness for the Aggregator circuit (§4.6) and its native derivations.
//!
//! Each batched vote's VoteVerifier proof crosses the same kind of field boundary §4.5's own
//! BallotProof recursion does (§REDESIGN, "cross-field recursion boundaries"), so it's verified
//! natively here, exactly as far as [`sequencer_vote_circuit::VoteWitness::new`] already
//! validates the vote's own signature, census inclusion and ballot proof before a single R1CS
//! constraint for this stage is written.

use ark_bls12_377::{Bls12_377, Fr as VoteFr};
use ark_groth16::VerifyingKey;

use ark_ff::PrimeField;
use sequencer_core::constants::VOTES_PER_BATCH;
use sequencer_core::schema::{BallotMode, EncryptionKeyCoords};
use sequencer_core::{Fr, StateKey};
use sequencer_curve::Ballot;
use sequencer_hash::{mimc7, nonnative};
use sequencer_vote_circuit::{verify_vote_proof, vote_inputs_hash, PublicInputs as VotePublicInputs, VoteProof, INPUTS_HASH_LIMBS};

use crate::dummy::DummyVote;

/// Errors raised while validating an [`AggregatorWitness`].
#[derive(Debug, thiserror::Error)]
pub enum WitnessError {
    /// More real votes were supplied than fit in a batch.
    #[error("{got} votes supplied, batch holds at most {max}")]
    TooManyVotes {
        /// Observed vote count.
        got: usize,
        /// [`VOTES_PER_BATCH`].
        max: usize,
    },

    /// A real slot's VoteVerifier proof failed Groth16 verification.
    #[error("slot {index} vote proof failed verification")]
    InvalidVoteProof {
        /// The offending slot's index within the batch.
        index: usize,
    },

    /// A real slot's declared per-vote fields don't recompute its proof's own `InputsHash`.
    #[error("slot {index} inputs-hash does not match its declared ballot fields")]
    InputsHashMismatch {
        /// The offending slot's index within the batch.
        index: usize,
    },

    /// The fixed dummy vote used to pad this batch's unused slots failed to verify under the
    /// batch's own VoteVerifier key — the dummy was built against an incompatible (stale or
    /// differently-shaped) VoteVerifier circuit.
    #[error("dummy padding vote is incompatible with this batch's vote-verifier key")]
    DummyIncompatible,
}

/// One batched slot: either a real, already-verified vote or the fixed dummy padding vote.
#[derive(Clone)]
pub struct VoteSlot {
    /// The slot's VoteVerifier proof (real or the fixed dummy).
    pub vote_proof: VoteProof,
    /// The slot's VoteVerifier public inputs.
    pub vote_public_inputs: VotePublicInputs,
    /// The vote's nullifier.
    pub nullifier: Fr,
    /// The vote's encrypted ballot.
    pub ballot: Ballot,
    /// The voter's address.
    pub address: StateKey,
    /// The vote's commitment.
    pub commitment: Fr,
}

/// A real, not-yet-batched vote: a VoteVerifier proof plus the `VerifiedBallot` fields its
/// `InputsHash` commits to.
#[derive(Clone)]
pub struct RealVote {
    /// The vote's VoteVerifier proof.
    pub vote_proof: VoteProof,
    /// The vote's VoteVerifier public inputs.
    pub vote_public_inputs: VotePublicInputs,
    /// The vote's nullifier.
    pub nullifier: Fr,
    /// The vote's encrypted ballot.
    pub ballot: Ballot,
    /// The voter's address.
    pub address: StateKey,
    /// The vote's commitment.
    pub commitment: Fr,
}

/// Everything the Aggregator circuit witnesses privately: a shared process header plus up to
/// [`VOTES_PER_BATCH`] batched votes, real or dummy-padded.
#[derive(Clone)]
pub struct AggregatorWitness {
    /// The process every vote in this batch belongs to.
    pub process_id: StateKey,
    /// The census root every vote's inclusion was checked against.
    pub census_root: Fr,
    /// The process's ballot-shape constraints.
    pub ballot_mode: BallotMode,
    /// The process's ElGamal encryption key.
    pub encryption_key: EncryptionKeyCoords,
    /// The batch's slots, in order: real votes first, dummy padding filling the remainder.
    pub slots: Vec<VoteSlot>,
    /// Number of real (non-padding) votes in this batch.
    pub real_count: usize,
}

impl AggregatorWitness {
    /// Validate and batch up to [`VOTES_PER_BATCH`] real votes, padding any remaining slots with
    /// the fixed `dummy` vote (§4.6).
    ///
    /// # Errors
    /// Returns the first [`WitnessError`] variant violated.
    pub fn new(
        process_id: StateKey,
        census_root: Fr,
        ballot_mode: BallotMode,
        encryption_key: EncryptionKeyCoords,
        votes: Vec<RealVote>,
        vote_vk: &VerifyingKey<Bls12_377>,
        dummy: &DummyVote,
    ) -> Result<Self, WitnessError> {
        if votes.len() > VOTES_PER_BATCH {
            return Err(WitnessError::TooManyVotes { got: votes.len(), max: VOTES_PER_BATCH });
        }

        let real_count = votes.len();
        let mut slots = Vec::with_capacity(VOTES_PER_BATCH);
        for (index, vote) in votes.into_iter().enumerate() {
            let valid = verify_vote_proof(vote_vk, &vote.vote_proof, &vote.vote_public_inputs)
                .map_err(|_| WitnessError::InvalidVoteProof { index })?;
            if !valid {
                return Err(WitnessError::InvalidVoteProof { index });
            }

            let expected = vote_inputs_hash(
                process_id,
                census_root,
                encryption_key,
                ballot_mode,
                vote.nullifier,
                &vote.ballot,
                vote.address,
                vote.commitment,
            );
            let expected_limbs: Vec<VoteFr> = nonnative::pack_limbs(expected, INPUTS_HASH_LIMBS);
            if expected_limbs.as_slice() != vote.vote_public_inputs.inputs_hash_limbs.as_slice() {
                return Err(WitnessError::InputsHashMismatch { index });
            }

            slots.push(VoteSlot {
                vote_proof: vote.vote_proof,
                vote_public_inputs: vote.vote_public_inputs,
                nullifier: vote.nullifier,
                ballot: vote.ballot,
                address: vote.address,
                commitment: vote.commitment,
            });
        }

        if real_count < VOTES_PER_BATCH {
            let dummy_valid = verify_vote_proof(vote_vk, &dummy.vote_proof, &dummy.vote_public_inputs)
                .map_err(|_| WitnessError::DummyIncompatible)?;
            if !dummy_valid {
                return Err(WitnessError::DummyIncompatible);
            }
        }
        for _ in real_count..VOTES_PER_BATCH {
            slots.push(VoteSlot {
                vote_proof: dummy.vote_proof.clone(),
                vote_public_inputs: dummy.vote_public_inputs,
                nullifier: dummy.nullifier,
                ballot: dummy.ballot,
                address: dummy.address,
                commitment: dummy.commitment,
            });
        }

        Ok(Self { process_id, census_root, ballot_mode, encryption_key, slots, real_count })
    }

    /// `AggregatedInputsHash = MiMC7(ProcessID, CensusRoot, BallotMode, EncryptionKey,
    /// Nullifiers…, Ballots…, Addresses…, Commitments…)` (§4.6), over every slot in batch order.
    #[must_use]
    pub fn aggregated_inputs_hash(&self) -> Fr {
        aggregated_inputs_hash(self.process_id, self.census_root, self.ballot_mode, self.encryption_key, &self.slots)
    }
}

/// Free-function form of [`AggregatorWitness::aggregated_inputs_hash`], usable from the circuit
/// module without needing a full witness in scope.
#[must_use]
pub(crate) fn aggregated_inputs_hash(
    process_id: StateKey,
    census_root: Fr,
    ballot_mode: BallotMode,
    encryption_key: EncryptionKeyCoords,
    slots: &[VoteSlot],
) -> Fr {
    let process_field = Fr::from_be_bytes_mod_order(process_id.as_ref());

    let mut preimage = Vec::with_capacity(4 + BallotMode::FIELD_COUNT + 4 * VOTES_PER_BATCH * sequencer_core::constants::FIELDS_PER_BALLOT + 2 * VOTES_PER_BATCH);
    preimage.push(process_field);
    preimage.push(census_root);
    preimage.extend(ballot_mode.to_field_elements());
    preimage.push(encryption_key.x);
    preimage.push(encryption_key.y);
    for slot in slots {
        preimage.push(slot.nullifier);
    }
    for slot in slots {
        for ciphertext in slot.ballot.fields() {
            let (c1x, c1y) = ciphertext.c1.to_rte();
            let (c2x, c2y) = ciphertext.c2.to_rte();
            preimage.push(c1x);
            preimage.push(c1y);
            preimage.push(c2x);
            preimage.push(c2y);
        }
    }
    for slot in slots {
        preimage.push(Fr::from_be_bytes_mod_order(slot.address.as_ref()));
    }
    for slot in slots {
        preimage.push(slot.commitment);
    }
    mimc7::hash(&preimage)
}
