//! Groth16 key generation, proving and verification for the VoteVerifier circuit, over BLS12-377.

use ark_bls12_377::Bls12_377;
use ark_groth16::{Groth16, Proof, ProvingKey, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use ark_std::rand::{CryptoRng, RngCore};
use thiserror::Error;

use crate::circuit::VoteCircuit;
use crate::public_inputs::PublicInputs;
use crate::witness::VoteWitness;

/// Errors raised while generating keys, proving, or verifying a VoteProof.
#[derive(Debug, Error)]
pub enum ProofError {
    /// The trusted-setup key generation step failed.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Proof creation failed for a witness that should have satisfied the circuit.
    #[error("proof creation failed: {0}")]
    ProofCreation(String),

    /// Groth16 verification rejected the proof against the given public inputs.
    #[error("proof verification failed: {0}")]
    VerificationFailed(String),

    /// Proof bytes did not deserialize as a Groth16 proof over BLS12-377.
    #[error("invalid proof bytes")]
    InvalidProofBytes,
}

/// A serialized VoteProof, opaque outside this crate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoteProof {
    bytes: Vec<u8>,
}

impl VoteProof {
    /// Wrap already-serialized proof bytes.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Borrow the serialized proof bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    /// Number of serialized bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether no bytes are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decode the underlying Groth16 proof, for recursive verification inside an Aggregator
    /// circuit (§4.6) or any other caller that needs the raw curve points rather than bytes.
    ///
    /// # Errors
    /// Returns [`ProofError::InvalidProofBytes`] if the bytes don't deserialize.
    pub fn decode(&self) -> Result<Proof<Bls12_377>, ProofError> {
        Proof::deserialize_compressed(self.bytes.as_slice()).map_err(|_| ProofError::InvalidProofBytes)
    }
}

/// Run the circuit-specific Groth16 trusted setup for the VoteVerifier shape.
///
/// This is an expensive operation that should run once per circuit shape and have its output
/// cached as an artifact (§1, the artifact cache A1 owns that caching, not this crate).
///
/// # Errors
/// Returns [`ProofError::KeyGeneration`] if key generation fails.
pub fn generate_keys<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> Result<(ProvingKey<Bls12_377>, VerifyingKey<Bls12_377>), ProofError> {
    Groth16::<Bls12_377>::circuit_specific_setup(VoteCircuit::empty(), rng)
        .map_err(|e| ProofError::KeyGeneration(format!("{e:?}")))
}

/// Prove a validated vote witness satisfies the VoteVerifier circuit.
///
/// # Errors
/// Returns [`ProofError::ProofCreation`] if proof generation fails (it should not, for a witness
/// that already passed [`VoteWitness::new`]'s validation).
pub fn create_vote_proof<R: RngCore + CryptoRng>(
    pk: &ProvingKey<Bls12_377>,
    witness: VoteWitness,
    rng: &mut R,
) -> Result<VoteProof, ProofError> {
    let circuit = VoteCircuit::new(witness);
    let proof =
        Groth16::<Bls12_377>::prove(pk, circuit, rng).map_err(|e| ProofError::ProofCreation(format!("{e:?}")))?;
    let mut bytes = Vec::new();
    proof
        .serialize_compressed(&mut bytes)
        .map_err(|e| ProofError::ProofCreation(format!("{e:?}")))?;
    Ok(VoteProof::from_bytes(bytes))
}

/// Verify a VoteProof against its claimed public inputs.
///
/// # Errors
/// Returns [`ProofError::InvalidProofBytes`] if `proof` doesn't deserialize, or
/// [`ProofError::VerificationFailed`] if the pairing check itself errors (distinct from a
/// pairing check that runs and simply returns `false`).
pub fn verify_vote_proof(
    vk: &VerifyingKey<Bls12_377>,
    proof: &VoteProof,
    public_inputs: &PublicInputs,
) -> Result<bool, ProofError> {
    let decoded = proof.decode()?;
    Groth16::<Bls12_377>::verify(vk, &public_inputs.to_field_elements(), &decoded)
        .map_err(|e| ProofError::VerificationFailed(format!("{e:?}")))
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
    use sequencer_ballot_circuit::{create_ballot_proof, generate_keys as generate_ballot_keys, BallotWitness};
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

    fn sample_witness() -> VoteWitness {
        let mut rng = ark_std::test_rng();
        let signing_key = SigningKey::from_bytes(&[5_u8; 32].into()).expect("valid scalar");
        let pub_key = uncompressed_pub_key(&signing_key);
        let address = crate::witness::address_from_pub_key(&pub_key);
        let address_field = sequencer_core::Fr::from_be_bytes_mod_order(address.as_ref());
        let weight = 4_u64;
        let weight_field = sequencer_core::Fr::from(weight);
        let encryption_key = EncryptionKeyCoords { x: Point::generator().x(), y: Point::generator().y() };

        let ballot_witness = BallotWitness::new(
            StateKey::ZERO,
            mode(),
            encryption_key,
            address,
            weight,
            [1, 0, 0, 0, 0, 0, 0, 0],
            Scalar::rand(&mut rng),
            sequencer_core::Fr::from(13_u64),
        )
        .expect("well-formed ballot witness");
        let ballot_inputs_hash = ballot_witness.inputs_hash();
        let (bpk, bvk) = generate_ballot_keys(&mut rng).expect("ballot key generation");
        let ballot_proof = create_ballot_proof(&bpk, ballot_witness, &mut rng).expect("ballot proof creation");

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
            sequencer_core::Fr::from(88_u64),
            ballot_witness.ballot(),
            address,
            sequencer_core::Fr::from(99_u64),
            weight,
            path,
            pub_key,
            sig_bytes,
            ballot_inputs_hash,
            ballot_proof,
            bvk,
        )
        .expect("witness satisfies its own natively-checked constraints")
    }

    #[test]
    fn proof_round_trips_through_bytes() {
        let mut rng = ark_std::test_rng();
        let (pk, _vk) = generate_keys(&mut rng).expect("key generation");
        let proof = create_vote_proof(&pk, sample_witness(), &mut rng).expect("proof creation");

        let restored = VoteProof::from_bytes(proof.to_bytes());
        assert_eq!(proof, restored);
        assert!(!proof.is_empty());
    }

    #[test]
    fn valid_proof_verifies() {
        let mut rng = ark_std::test_rng();
        let (pk, vk) = generate_keys(&mut rng).expect("key generation");
        let witness = sample_witness();
        let public_inputs = PublicInputs::from_witness(&witness);
        let proof = create_vote_proof(&pk, witness, &mut rng).expect("proof creation");

        assert!(verify_vote_proof(&vk, &proof, &public_inputs).expect("verification runs"));
    }
}
