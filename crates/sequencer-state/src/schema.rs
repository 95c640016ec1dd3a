//! Pipeline-stage record types that live in or pass through the state engine (§3).
//!
//! `Vote`, `VerifiedBallot` and `AggregatedBatch` are plain data: this crate only needs to move
//! them between the queue and the tree, never to inspect the SNARK proofs they carry. Proof
//! bytes are opaque here; the circuit crates know how to produce and check them.

use serde::{Deserialize, Serialize};
use serde_with::hex::Hex;
use serde_with::serde_as;

use ark_ff::PrimeField;
use sequencer_core::schema::EncryptionKeyCoords;
use sequencer_core::{HexField, StateKey};
use sequencer_curve::Ballot;
use sequencer_hash::poseidon;

use crate::error::StateError;

/// An opaque recursion proof, passed through this crate without interpretation.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[repr(transparent)]
pub struct RecursionProof(#[serde_as(as = "Hex")] pub Vec<u8>);

/// A ballot as submitted, before the verifier worker has checked it (§3 `Vote`).
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    /// The process this vote is submitted against (§6, the voter submission's `process_id`).
    pub process_id: StateKey,
    /// The voter's address, derived from their public key.
    pub address: StateKey,
    /// `Poseidon(Commitment, Secret)`, unique per submission.
    pub nullifier: StateKey,
    /// `Poseidon(Address, ProcessID, Secret)`.
    #[serde_as(as = "HexField")]
    pub commitment: sequencer_core::Fr,
    /// The encrypted ballot.
    pub ballot: Ballot,
    /// A 160-level census Merkle inclusion proof for `(Address, Weight)`.
    #[serde_as(as = "Vec<HexField>")]
    pub census_proof: Vec<sequencer_core::Fr>,
    /// The voter's secp256k1 public key, as ECDSA-uncompressed coordinates.
    pub voter_pub_key: EncryptionKeyCoords,
    /// ECDSA signature over `H(BallotInputsHash)`.
    #[serde_as(as = "Hex")]
    pub signature: Vec<u8>,
    /// The voter's weight from the census.
    pub voter_weight: u64,
    /// `MiMC7` digest of the agreed ballot-proof public-input vector.
    #[serde_as(as = "HexField")]
    pub ballot_inputs_hash: sequencer_core::Fr,
    /// The BN254 BallotProof (C4).
    pub ballot_proof: RecursionProof,
}

/// A ballot after the verifier worker (C5) has checked signature, census membership and the
/// inner BallotProof (§3 `VerifiedBallot`).
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedBallot {
    /// The process this ballot belongs to.
    pub process_id: StateKey,
    /// The voter's address.
    pub address: StateKey,
    /// The ballot's nullifier.
    pub nullifier: StateKey,
    /// The ballot's commitment.
    #[serde_as(as = "HexField")]
    pub commitment: sequencer_core::Fr,
    /// The encrypted ballot.
    pub ballot: Ballot,
    /// The voter's weight.
    pub voter_weight: u64,
    /// `MiMC7` digest this ballot's VoteVerifier proof commits to.
    #[serde_as(as = "HexField")]
    pub inputs_hash: sequencer_core::Fr,
    /// The BLS12-377 VoteVerifier proof (C5).
    pub proof: RecursionProof,
    /// The VoteVerifier proof's own public inputs (`VoteDigest` plus the limb-packed
    /// `InputsHash`), serialized opaquely: the aggregator scheduler needs these to recursively
    /// verify `proof` without re-deriving the voter's private witness material. Empty for
    /// `dummy()` padding rows, which are never fed back into recursive verification.
    pub vote_public_inputs: RecursionProof,
}

impl VerifiedBallot {
    /// A zero-ciphertext, zero-weight ballot used to round a batch record out to `VotesPerBatch`
    /// entries. Never passed to the state engine or re-verified: consumers slice
    /// `AggregatedBatch.votes[..real_count]` before touching either.
    #[must_use]
    pub fn dummy(process_id: StateKey, dummy_proof: RecursionProof) -> Self {
        Self {
            process_id,
            address: StateKey::ZERO,
            nullifier: StateKey::ZERO,
            commitment: sequencer_core::Fr::from(0_u64),
            ballot: Ballot::zero(),
            voter_weight: 0,
            inputs_hash: dummy_inputs_hash(),
            proof: dummy_proof,
            vote_public_inputs: RecursionProof(Vec::new()),
        }
    }
}

/// Deterministic public-input hash every dummy VoteVerifier slot must present, matching the
/// fixed, process-independent statement the Aggregator's dummy proof is actually built under
/// (`StateKey::ZERO`), so the Aggregator's fixed dummy verifier only ever faces one statement
/// regardless of which real process a padding row rides along with.
fn dummy_inputs_hash() -> sequencer_core::Fr {
    let process_field = sequencer_core::Fr::from_be_bytes_mod_order(StateKey::ZERO.as_ref());
    poseidon::hash(&[process_field])
}

/// A `VotesPerBatch`-sized group of verified ballots, ready for the state-transition worker
/// (§3 `AggregatedBatch`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedBatch {
    /// The process these votes belong to.
    pub process_id: StateKey,
    /// Exactly `VotesPerBatch` entries, real ballots followed by dummy padding.
    pub votes: Vec<VerifiedBallot>,
    /// Count of real (non-padding) entries at the front of `votes`; the state-transition worker
    /// slices `votes[..real_count]` before applying them to the engine or rebuilding the
    /// Aggregator witness, since `AggregatorWitness::new` re-pads on its own.
    pub real_count: usize,
    /// The BW6-761 Aggregator proof (C6).
    pub aggregator_proof: RecursionProof,
}

impl AggregatedBatch {
    /// Build a batch from real votes, padding to `votes_per_batch` with dummy ballots.
    ///
    /// # Errors
    /// Returns [`StateError`] if `votes` already has more than `votes_per_batch` entries.
    pub fn pad(
        process_id: StateKey,
        mut votes: Vec<VerifiedBallot>,
        votes_per_batch: usize,
        dummy_proof: RecursionProof,
        aggregator_proof: RecursionProof,
    ) -> Result<Self, StateError> {
        if votes.len() > votes_per_batch {
            return Err(StateError::Store(format!(
                "batch has {} votes, exceeds votes_per_batch={votes_per_batch}",
                votes.len()
            )));
        }
        let real_count = votes.len();
        while votes.len() < votes_per_batch {
            votes.push(VerifiedBallot::dummy(process_id, dummy_proof.clone()));
        }
        Ok(Self {
            process_id,
            votes,
            real_count,
            aggregator_proof,
        })
    }
}
