//! The public values an Aggregator proof exposes (§4.6, §6).

use ark_bw6_761::Fr as F;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};

use crate::circuit::{preimage_fields, INPUTS_HASH_LIMBS_OUT};
use crate::witness::AggregatorWitness;

/// `AggregatorDigest` binds the shared process header and every batched slot's VoteVerifier
/// public inputs together natively within this stage's own field (§REDESIGN, "cross-field
/// recursion boundaries"); the limb-packed `AggregatedInputsHash` alongside it is §4.6's own
/// BN254-native public input, carried across the boundary a limb at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicInputs {
    /// Poseidon digest, over BW6-761, of every batched slot's fields.
    pub aggregator_digest: F,
    /// `AggregatedInputsHash` (§4.6), limb-packed into [`INPUTS_HASH_LIMBS_OUT`] BW6-761-native
    /// elements.
    pub inputs_hash_limbs: [F; INPUTS_HASH_LIMBS_OUT],
}

impl PublicInputs {
    /// Derive the public inputs a given witness's proof must satisfy.
    #[must_use]
    pub fn from_witness(witness: &AggregatorWitness) -> Self {
        let aggregator_digest = sequencer_hash::nonnative::bridge_hash(&preimage_fields(witness));
        let limbs: Vec<F> = sequencer_hash::nonnative::pack_limbs(witness.aggregated_inputs_hash(), INPUTS_HASH_LIMBS_OUT);
        let inputs_hash_limbs = std::array::from_fn(|i| limbs.get(i).copied().unwrap_or(F::from(0_u64)));
        Self { aggregator_digest, inputs_hash_limbs }
    }

    /// Flatten to the field-element vector Groth16 verification expects: the digest, then the
    /// `AggregatedInputsHash` limbs in little-endian order.
    #[must_use]
    pub fn to_field_elements(self) -> Vec<F> {
        let mut out = vec![self.aggregator_digest];
        out.extend(self.inputs_hash_limbs);
        out
    }

    /// Serialize to the flat byte encoding the state-transition worker needs to recursively
    /// verify an Aggregator proof after rebuilding its witness from a closed batch.
    #[must_use]
    pub fn to_bytes(self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for limb in self.to_field_elements() {
            limb.serialize_compressed(&mut bytes)
                .unwrap_or_else(|err| unreachable!("a field element always serializes: {err}"));
        }
        bytes
    }

    /// Parse the encoding [`Self::to_bytes`] produces.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let mut reader = bytes;
        let aggregator_digest = F::deserialize_compressed(&mut reader).ok()?;
        let mut inputs_hash_limbs = [F::from(0_u64); INPUTS_HASH_LIMBS_OUT];
        for limb in &mut inputs_hash_limbs {
            *limb = F::deserialize_compressed(&mut reader).ok()?;
        }
        Some(Self { aggregator_digest, inputs_hash_limbs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_std::rand::SeedableRng;
    use sequencer_core::constants::VOTES_PER_BATCH;
    use sequencer_core::schema::{BallotMode, CostExponent, EncryptionKeyCoords};
    use sequencer_core::StateKey;
    use sequencer_vote_circuit::generate_keys as generate_vote_keys;

    use crate::dummy::build_dummy_vote;

    fn mode() -> BallotMode {
        BallotMode {
            max_count: 1,
            force_uniqueness: false,
            max_value: 9,
            min_value: 0,
            max_total_cost: 9,
            min_total_cost: 0,
            cost_exp: Some(CostExponent::Linear),
            cost_from_weight: false,
        }
    }

    fn empty_witness() -> AggregatorWitness {
        let mut rng = ark_std::rand::rngs::StdRng::seed_from_u64(0);
        let (ballot_pk, ballot_vk) = sequencer_ballot_circuit::generate_keys(&mut rng).expect("ballot keys");
        let (vote_pk, vote_vk) = generate_vote_keys(&mut rng).expect("vote keys");
        let dummy = build_dummy_vote(&ballot_pk, ballot_vk, &vote_pk, &mut rng).expect("dummy vote");
        AggregatorWitness::new(
            StateKey::ZERO,
            sequencer_core::Fr::from(0_u64),
            mode(),
            EncryptionKeyCoords { x: sequencer_core::Fr::from(1_u64), y: sequencer_core::Fr::from(2_u64) },
            Vec::new(),
            &vote_vk,
            &dummy,
        )
        .expect("empty batch is always valid")
    }

    #[test]
    fn bytes_round_trip() {
        let witness = empty_witness();
        let public_inputs = PublicInputs::from_witness(&witness);
        let restored = PublicInputs::from_bytes(&public_inputs.to_bytes()).expect("decodes");
        assert_eq!(public_inputs, restored);
    }

    #[test]
    fn truncated_bytes_fail_to_decode() {
        let witness = empty_witness();
        let public_inputs = PublicInputs::from_witness(&witness);
        let bytes = public_inputs.to_bytes();
        assert!(PublicInputs::from_bytes(&bytes[..bytes.len() / 2]).is_none());
    }

    #[test]
    fn derivation_covers_all_votes_per_batch_slots() {
        let witness = empty_witness();
        assert_eq!(witness.slots.len(), VOTES_PER_BATCH);
        assert_eq!(witness.real_count, 0);
    }
}
