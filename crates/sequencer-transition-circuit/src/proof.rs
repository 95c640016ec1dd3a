//! Groth16 key generation, proving and verification for the StateTransition circuit, over BN254.

use ark_bn254::Bn254;
use ark_groth16::{Groth16, Proof, ProvingKey, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use ark_std::rand::{CryptoRng, RngCore};
use thiserror::Error;

use crate::circuit::TransitionCircuit;
use crate::public_inputs::PublicInputs;
use crate::witness::TransitionWitness;

/// Errors raised while generating keys, proving, or verifying a TransitionProof.
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

    /// Proof bytes did not deserialize as a Groth16 proof over BN254.
    #[error("invalid proof bytes")]
    InvalidProofBytes,
}

/// A serialized TransitionProof, opaque outside this crate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionProof {
    bytes: Vec<u8>,
}

impl TransitionProof {
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

    /// Decode the underlying Groth16 proof, for a caller outside this crate that needs the raw
    /// curve points rather than bytes (the pipeline's own archive, not a further recursion step:
    /// the state-transition stage is the tower's terminus).
    ///
    /// # Errors
    /// Returns [`ProofError::InvalidProofBytes`] if the bytes don't deserialize.
    pub fn decode(&self) -> Result<Proof<Bn254>, ProofError> {
        Proof::deserialize_compressed(self.bytes.as_slice()).map_err(|_| ProofError::InvalidProofBytes)
    }
}

/// Run the circuit-specific Groth16 trusted setup for the StateTransition shape.
///
/// # Errors
/// Returns [`ProofError::KeyGeneration`] if key generation fails.
pub fn generate_keys<R: RngCore + CryptoRng>(rng: &mut R) -> Result<(ProvingKey<Bn254>, VerifyingKey<Bn254>), ProofError> {
    Groth16::<Bn254>::circuit_specific_setup(TransitionCircuit::empty(), rng)
        .map_err(|e| ProofError::KeyGeneration(format!("{e:?}")))
}

/// Prove a validated StateTransition witness satisfies the circuit.
///
/// # Errors
/// Returns [`ProofError::ProofCreation`] if proof generation fails (it should not, for a witness
/// that already passed [`TransitionWitness::new`]'s validation).
pub fn create_transition_proof<R: RngCore + CryptoRng>(
    pk: &ProvingKey<Bn254>,
    witness: TransitionWitness,
    rng: &mut R,
) -> Result<TransitionProof, ProofError> {
    let circuit = TransitionCircuit::new(witness);
    let proof = Groth16::<Bn254>::prove(pk, circuit, rng).map_err(|e| ProofError::ProofCreation(format!("{e:?}")))?;
    let mut bytes = Vec::new();
    proof
        .serialize_compressed(&mut bytes)
        .map_err(|e| ProofError::ProofCreation(format!("{e:?}")))?;
    Ok(TransitionProof::from_bytes(bytes))
}

/// Verify a TransitionProof against its claimed public inputs.
///
/// # Errors
/// Returns [`ProofError::InvalidProofBytes`] if `proof` doesn't deserialize, or
/// [`ProofError::VerificationFailed`] if the pairing check itself errors (distinct from a pairing
/// check that runs and simply returns `false`).
pub fn verify_transition_proof(
    vk: &VerifyingKey<Bn254>,
    proof: &TransitionProof,
    public_inputs: &PublicInputs,
) -> Result<bool, ProofError> {
    let decoded = proof.decode()?;
    Groth16::<Bn254>::verify(vk, &public_inputs.to_field_elements(), &decoded)
        .map_err(|e| ProofError::VerificationFailed(format!("{e:?}")))
}
