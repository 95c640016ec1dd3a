//! The fixed dummy vote every Aggregator batch pads unused slots with (§4.6: "a fixed dummy proof
//! against a fixed dummy inputs-hash").
//!
//! A padding slot still has to recursively verify under the very same `VoteVerifier` verifying
//! key real slots do — that's what makes a later forged or stale dummy detectable as
//! [`crate::witness::WitnessError::DummyIncompatible`] rather than silently accepted. So the
//! dummy is a genuine, fully-valid [`VoteWitness`] over fixed, canonical values, proved once
//! (typically at the same `setup()` call that produces the real VoteVerifier keys) and reused
//! unchanged by every batch's padding slots thereafter.

use ark_bls12_377::Bls12_377;
use ark_groth16::{ProvingKey, VerifyingKey};
use ark_std::rand::{CryptoRng, RngCore};
use k256::ecdsa::signature::Signer;
use k256::ecdsa::{Signature as EcdsaSignature, SigningKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha2::{Digest, Sha256};
use thiserror::Error;

use ark_ff::{BigInteger, PrimeField};
use sequencer_ballot_circuit::{
    create_ballot_proof, generate_keys as generate_ballot_keys, BallotWitness,
    ProofError as BallotProofError,
};
use sequencer_core::constants::CENSUS_PROOF_MAX_LEVELS;
use sequencer_core::schema::{BallotMode, EncryptionKeyCoords};
use sequencer_core::{Fr, StateKey};
use sequencer_curve::{Ballot, Point, Scalar};
use sequencer_vote_circuit::{
    address_from_pub_key, create_vote_proof, PublicInputs as VotePublicInputs, ProofError as VoteProofError, VoteProof,
    VoteWitness,
};

/// A fixed, reusable dummy vote, used to pad every Aggregator batch's unused slots.
#[derive(Clone)]
pub struct DummyVote {
    /// The dummy's (always-verifying) VoteVerifier proof.
    pub vote_proof: VoteProof,
    /// The dummy's public inputs, matching `vote_proof`.
    pub vote_public_inputs: VotePublicInputs,
    /// The dummy's (zero) nullifier.
    pub nullifier: Fr,
    /// The dummy's (zero) ballot.
    pub ballot: Ballot,
    /// The dummy's (zero) address.
    pub address: StateKey,
    /// The dummy's (zero) commitment.
    pub commitment: Fr,
}

/// Errors raised while building the fixed dummy vote.
#[derive(Debug, Error)]
pub enum DummyError {
    /// Building the dummy's inner BallotProof failed.
    #[error("dummy ballot proof creation failed: {0}")]
    BallotProof(#[from] BallotProofError),
    /// Building the dummy's VoteVerifier proof failed.
    #[error("dummy vote proof creation failed: {0}")]
    VoteProof(#[from] VoteProofError),
}

fn uncompressed_pub_key(signing_key: &SigningKey) -> [u8; 64] {
    let point = signing_key.verifying_key().to_encoded_point(false);
    let bytes = point.as_bytes();
    let mut out = [0_u8; 64];
    #[allow(clippy::indexing_slicing, reason = "uncompressed SEC1 points are always 65 bytes")]
    out.copy_from_slice(&bytes[1..65]);
    out
}

/// The canonical all-zero `BallotMode` the dummy is proved under; never a real process's mode.
#[must_use]
pub fn dummy_ballot_mode() -> BallotMode {
    BallotMode {
        max_count: 0,
        force_uniqueness: false,
        max_value: 0,
        min_value: 0,
        max_total_cost: 0,
        min_total_cost: 0,
        cost_exp: None,
        cost_from_weight: false,
    }
}

/// Build the fixed dummy vote, proving a canonical zero-weight, zero-plaintext ballot and a
/// matching VoteVerifier proof signed by a fixed (never-secret, since this is public padding
/// material) signing key.
///
/// # Errors
/// Returns [`DummyError`] if either inner proof fails to generate.
pub fn build<R: RngCore + CryptoRng>(
    ballot_pk: &ProvingKey<ark_bn254::Bn254>,
    ballot_vk: VerifyingKey<ark_bn254::Bn254>,
    vote_pk: &ProvingKey<Bls12_377>,
    rng: &mut R,
) -> Result<DummyVote, DummyError> {
    let signing_key = SigningKey::from_bytes(&[0xAB_u8; 32].into()).expect("fixed dummy scalar is valid");
    let pub_key = uncompressed_pub_key(&signing_key);
    let address = address_from_pub_key(&pub_key);
    let weight = 0_u64;
    let mode = dummy_ballot_mode();
    let encryption_key = EncryptionKeyCoords { x: Point::generator().x(), y: Point::generator().y() };

    let ballot_witness = BallotWitness::new(
        StateKey::ZERO,
        mode,
        encryption_key,
        address,
        weight,
        [0_u64; sequencer_core::constants::FIELDS_PER_BALLOT],
        Scalar::from(1_u64),
        Fr::from(0_u64),
    )
    .expect("the canonical dummy ballot is well-formed by construction");
    let ballot_inputs_hash = ballot_witness.inputs_hash();
    let ballot = ballot_witness.ballot();
    let ballot_proof = create_ballot_proof(ballot_pk, ballot_witness, rng)?;

    let census_path = vec![Fr::from(0_u64); CENSUS_PROOF_MAX_LEVELS];
    let address_field = Fr::from_be_bytes_mod_order(address.as_ref());
    let weight_field = Fr::from(weight);
    let mut census_root = sequencer_hash::smt_leaf::leaf_hash(address_field, weight_field);
    for sibling in &census_path {
        census_root = sequencer_hash::smt_leaf::node_hash(census_root, *sibling);
    }

    let sig: EcdsaSignature = signing_key.sign(&Sha256::digest(ballot_inputs_hash.into_bigint().to_bytes_be()));
    let mut sig_bytes = [0_u8; 64];
    sig_bytes.copy_from_slice(&sig.to_bytes());

    let vote_witness = VoteWitness::new(
        StateKey::ZERO,
        census_root,
        mode,
        encryption_key,
        Fr::from(0_u64),
        ballot,
        address,
        Fr::from(0_u64),
        weight,
        census_path,
        pub_key,
        sig_bytes,
        ballot_inputs_hash,
        ballot_proof,
        ballot_vk,
    )
    .expect("the canonical dummy vote is well-formed by construction");

    let vote_public_inputs = VotePublicInputs::from_witness(&vote_witness);
    let vote_proof = create_vote_proof(vote_pk, vote_witness, rng)?;

    Ok(DummyVote {
        vote_proof,
        vote_public_inputs,
        nullifier: Fr::from(0_u64),
        ballot,
        address,
        commitment: Fr::from(0_u64),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sequencer_vote_circuit::verify_vote_proof;

    #[test]
    fn dummy_vote_proof_verifies_under_its_own_key() {
        let mut rng = ark_std::test_rng();
        let (ballot_pk, ballot_vk) = generate_ballot_keys(&mut rng).expect("ballot keys");
        let (vote_pk, vote_vk) = sequencer_vote_circuit::generate_keys(&mut rng).expect("vote keys");
        let dummy = build(&ballot_pk, ballot_vk, &vote_pk, &mut rng).expect("dummy vote builds");

        assert!(verify_vote_proof(&vote_vk, &dummy.vote_proof, &dummy.vote_public_inputs).expect("verification runs"));
    }

    #[test]
    fn dummy_vote_carries_zero_padding_fields() {
        let mut rng = ark_std::test_rng();
        let (ballot_pk, ballot_vk) = generate_ballot_keys(&mut rng).expect("ballot keys");
        let (vote_pk, _vote_vk) = sequencer_vote_circuit::generate_keys(&mut rng).expect("vote keys");
        let dummy = build(&ballot_pk, ballot_vk, &vote_pk, &mut rng).expect("dummy vote builds");

        assert_eq!(dummy.nullifier, Fr::from(0_u64));
        assert_eq!(dummy.commitment, Fr::from(0_u64));
    }
}
