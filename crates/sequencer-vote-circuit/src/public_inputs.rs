//! The public values a VoteVerifier proof exposes (§4.5, §6).

use ark_bls12_377::Fr as F;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};

use crate::circuit::{preimage_fields, INPUTS_HASH_LIMBS};
use crate::witness::VoteWitness;

/// `VoteDigest` binds every witnessed field together natively within this stage's own field
/// (§REDESIGN, "cross-field recursion boundaries"); the limb-packed `InputsHash` alongside it is
/// §4.5's own BN254-native public input, carried across the boundary a limb at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicInputs {
    /// Poseidon digest, over BLS12-377, of every field this witness commits to.
    pub vote_digest: F,
    /// `InputsHash` (§4.5), limb-packed into [`INPUTS_HASH_LIMBS`] BLS12-377-native elements.
    pub inputs_hash_limbs: [F; INPUTS_HASH_LIMBS],
}

impl PublicInputs {
    /// Derive the public inputs a given witness's proof must satisfy.
    #[must_use]
    pub fn from_witness(witness: &VoteWitness) -> Self {
        let vote_digest = sequencer_hash::nonnative::bridge_hash(&preimage_fields(witness));
        let limbs: Vec<F> = sequencer_hash::nonnative::pack_limbs(witness.inputs_hash(), INPUTS_HASH_LIMBS);
        let inputs_hash_limbs = std::array::from_fn(|i| limbs.get(i).copied().unwrap_or(F::from(0_u64)));
        Self { vote_digest, inputs_hash_limbs }
    }

    /// Flatten to the field-element vector Groth16 verification expects: the digest, then the
    /// `InputsHash` limbs in little-endian order.
    #[must_use]
    pub fn to_field_elements(self) -> Vec<F> {
        let mut out = vec![self.vote_digest];
        out.extend(self.inputs_hash_limbs);
        out
    }

    /// Serialize to the flat byte encoding a `VerifiedBallot` carries downstream of this stage,
    /// so the Aggregator can recursively verify `VoteProof` without re-deriving the voter's
    /// private witness.
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
        let vote_digest = F::deserialize_compressed(&mut reader).ok()?;
        let mut inputs_hash_limbs = [F::from(0_u64); INPUTS_HASH_LIMBS];
        for limb in &mut inputs_hash_limbs {
            *limb = F::deserialize_compressed(&mut reader).ok()?;
        }
        Some(Self { vote_digest, inputs_hash_limbs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_std::UniformRand;
    use k256::ecdsa::signature::Signer;
    use k256::ecdsa::{Signature as EcdsaSignature, SigningKey};
    use k256::elliptic_curve::sec1::ToEncodedPoint;
    use sha2::{Digest, Sha256};

    use ark_ff::{BigInteger, PrimeField};
    use sequencer_ballot_circuit::{create_ballot_proof, generate_keys, BallotWitness};
    use sequencer_core::constants::CENSUS_PROOF_MAX_LEVELS;
    use sequencer_core::schema::{BallotMode, CostExponent, EncryptionKeyCoords};
    use sequencer_core::StateKey;
    use sequencer_curve::{Point, Scalar};

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

    fn uncompressed_pub_key(signing_key: &SigningKey) -> [u8; 64] {
        let point = signing_key.verifying_key().to_encoded_point(false);
        let bytes = point.as_bytes();
        let mut out = [0_u8; 64];
        #[allow(clippy::indexing_slicing, reason = "uncompressed SEC1 points are always 65 bytes")]
        out.copy_from_slice(&bytes[1..65]);
        out
    }

    fn witness(weight: u64) -> VoteWitness {
        let mut rng = ark_std::test_rng();
        let signing_key = SigningKey::from_bytes(&[3_u8; 32].into()).expect("valid scalar");
        let pub_key = uncompressed_pub_key(&signing_key);
        let address = crate::witness::address_from_pub_key(&pub_key);
        let address_field = sequencer_core::Fr::from_be_bytes_mod_order(address.as_ref());
        let weight_field = sequencer_core::Fr::from(weight);
        let encryption_key = EncryptionKeyCoords { x: Point::generator().x(), y: Point::generator().y() };

        let ballot_witness = BallotWitness::new(
            StateKey::ZERO,
            mode(),
            encryption_key,
            address,
            weight,
            [2, 0, 0, 0, 0, 0, 0, 0],
            Scalar::rand(&mut rng),
            sequencer_core::Fr::from(77_u64),
        )
        .expect("well-formed ballot witness");
        let ballot_inputs_hash = ballot_witness.inputs_hash();
        let (pk, vk) = generate_keys(&mut rng).expect("ballot key generation");
        let ballot_proof = create_ballot_proof(&pk, ballot_witness, &mut rng).expect("ballot proof creation");

        let path: Vec<sequencer_core::Fr> =
            (0..CENSUS_PROOF_MAX_LEVELS).map(|i| sequencer_core::Fr::from(u64::try_from(i).unwrap_or(0))).collect();
        let mut current = sequencer_hash::smt_leaf::leaf_hash(address_field, weight_field);
        let bits = {
            let mut b = address_field.into_bigint().to_bits_be();
            b.reverse();
            b
        };
        for (level, sibling) in path.iter().enumerate() {
            let goes_right = bits.get(level).copied().unwrap_or(false);
            current = if goes_right {
                sequencer_hash::smt_leaf::node_hash(*sibling, current)
            } else {
                sequencer_hash::smt_leaf::node_hash(current, *sibling)
            };
        }

        let sig: EcdsaSignature = signing_key.sign(&Sha256::digest(ballot_inputs_hash.into_bigint().to_bytes_be()));
        let mut sig_bytes = [0_u8; 64];
        sig_bytes.copy_from_slice(&sig.to_bytes());

        VoteWitness::new(
            StateKey::ZERO,
            current,
            mode(),
            encryption_key,
            sequencer_core::Fr::from(11_u64),
            ballot_witness.ballot(),
            address,
            sequencer_core::Fr::from(22_u64),
            weight,
            path,
            pub_key,
            sig_bytes,
            ballot_inputs_hash,
            ballot_proof,
            vk,
        )
        .expect("witness satisfies its own natively-checked constraints")
    }

    #[test]
    fn derivation_is_deterministic() {
        let w = witness(1);
        assert_eq!(PublicInputs::from_witness(&w), PublicInputs::from_witness(&w));
    }

    #[test]
    fn sensitive_to_weight() {
        let a = PublicInputs::from_witness(&witness(1));
        let b = PublicInputs::from_witness(&witness(2));
        assert_ne!(a, b);
    }

    #[test]
    fn bytes_round_trip() {
        let public_inputs = PublicInputs::from_witness(&witness(1));
        let restored = PublicInputs::from_bytes(&public_inputs.to_bytes()).expect("decodes");
        assert_eq!(public_inputs, restored);
    }

    #[test]
    fn truncated_bytes_fail_to_decode() {
        let public_inputs = PublicInputs::from_witness(&witness(1));
        let bytes = public_inputs.to_bytes();
        assert!(PublicInputs::from_bytes(&bytes[..bytes.len() / 2]).is_none());
    }
}
