//! Proving/verifying key material for every stage, loaded once at startup and shared immutably
//! across worker tasks behind `Arc` (§4.9, §5 "loaded once, immutable thereafter").

use std::sync::Arc;

use ark_bls12_377::Bls12_377;
use ark_bn254::Bn254;
use ark_bw6_761::BW6_761;
use ark_groth16::{ProvingKey, VerifyingKey};
use ark_serialize::CanonicalDeserialize;
use ark_std::rand::{CryptoRng, RngCore};

use sequencer_aggregator_circuit::{build_dummy_vote, DummyVote};

use crate::artifact::{ArtifactCache, ArtifactKind, ArtifactRef, ArtifactSource};
use crate::error::{ArtifactError, WorkerError};

/// Hex-encoded SHA-256 references to every key blob the recursion tower needs, resolved through
/// an [`ArtifactCache`] at startup (§4.9 `ArtifactRef`).
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ArtifactManifest {
    /// BallotProof (C4) proving key.
    pub ballot_proving_key: String,
    /// BallotProof (C4) verifying key.
    pub ballot_verifying_key: String,
    /// VoteVerifier (C5) proving key.
    pub vote_proving_key: String,
    /// VoteVerifier (C5) verifying key.
    pub vote_verifying_key: String,
    /// Aggregator (C6) proving key.
    pub aggregator_proving_key: String,
    /// Aggregator (C6) verifying key.
    pub aggregator_verifying_key: String,
    /// StateTransition (C7) proving key.
    pub transition_proving_key: String,
    /// StateTransition (C7) verifying key.
    pub transition_verifying_key: String,
}

fn parse_ref(hex_hash: &str, kind: ArtifactKind) -> Result<ArtifactRef, ArtifactError> {
    let bytes = hex::decode(hex_hash).map_err(|_| ArtifactError::NotFound(hex_hash.to_owned()))?;
    let sha256: [u8; 32] = bytes
        .try_into()
        .map_err(|_| ArtifactError::NotFound(hex_hash.to_owned()))?;
    Ok(ArtifactRef { sha256, kind })
}

/// Every stage's Groth16 key material, plus the fixed dummy vote (§4.6) built from C4/C5 keys,
/// shared immutably across the three worker loops.
pub struct CircuitKeys {
    /// BallotProof (C4) proving key, needed to produce the fixed dummy vote's inner proof.
    pub ballot_pk: Arc<ProvingKey<Bn254>>,
    /// BallotProof (C4) verifying key, recursively checked inside every VoteVerifier witness.
    pub ballot_vk: Arc<VerifyingKey<Bn254>>,
    /// VoteVerifier (C5) proving key.
    pub vote_pk: Arc<ProvingKey<Bls12_377>>,
    /// VoteVerifier (C5) verifying key, recursively checked inside every Aggregator witness.
    pub vote_vk: Arc<VerifyingKey<Bls12_377>>,
    /// Aggregator (C6) proving key.
    pub aggregator_pk: Arc<ProvingKey<BW6_761>>,
    /// Aggregator (C6) verifying key, recursively checked inside every StateTransition witness.
    pub aggregator_vk: Arc<VerifyingKey<BW6_761>>,
    /// StateTransition (C7) proving key.
    pub transition_pk: Arc<ProvingKey<Bn254>>,
    /// StateTransition (C7) verifying key.
    pub transition_vk: Arc<VerifyingKey<Bn254>>,
    /// The fixed dummy vote every under-full Aggregator batch pads with.
    pub dummy: Arc<DummyVote>,
}

impl CircuitKeys {
    /// Load every key blob through `cache`, then build the shared dummy vote.
    ///
    /// # Errors
    /// Returns [`WorkerError::Artifact`] if a blob can't be resolved, or
    /// [`WorkerError::ProofFailure`] if a blob doesn't deserialize as its expected key type, or
    /// if building the dummy vote fails.
    pub fn load<S: ArtifactSource, R: RngCore + CryptoRng>(
        cache: &ArtifactCache<S>,
        manifest: &ArtifactManifest,
        rng: &mut R,
    ) -> Result<Self, WorkerError> {
        let ballot_pk: ProvingKey<Bn254> = deserialize(
            cache,
            &parse_ref(&manifest.ballot_proving_key, ArtifactKind::ProvingKey)?,
        )?;
        let ballot_vk: VerifyingKey<Bn254> = deserialize(
            cache,
            &parse_ref(&manifest.ballot_verifying_key, ArtifactKind::VerifyingKey)?,
        )?;
        let vote_pk: ProvingKey<Bls12_377> =
            deserialize(cache, &parse_ref(&manifest.vote_proving_key, ArtifactKind::ProvingKey)?)?;
        let vote_vk: VerifyingKey<Bls12_377> = deserialize(
            cache,
            &parse_ref(&manifest.vote_verifying_key, ArtifactKind::VerifyingKey)?,
        )?;
        let aggregator_pk: ProvingKey<BW6_761> = deserialize(
            cache,
            &parse_ref(&manifest.aggregator_proving_key, ArtifactKind::ProvingKey)?,
        )?;
        let aggregator_vk: VerifyingKey<BW6_761> = deserialize(
            cache,
            &parse_ref(&manifest.aggregator_verifying_key, ArtifactKind::VerifyingKey)?,
        )?;
        let transition_pk: ProvingKey<Bn254> = deserialize(
            cache,
            &parse_ref(&manifest.transition_proving_key, ArtifactKind::ProvingKey)?,
        )?;
        let transition_vk: VerifyingKey<Bn254> = deserialize(
            cache,
            &parse_ref(&manifest.transition_verifying_key, ArtifactKind::VerifyingKey)?,
        )?;

        let dummy = build_dummy_vote(&ballot_pk, ballot_vk.clone(), &vote_pk, rng)
            .map_err(|err| WorkerError::ProofFailure(err.to_string()))?;

        Ok(Self {
            ballot_pk: Arc::new(ballot_pk),
            ballot_vk: Arc::new(ballot_vk),
            vote_pk: Arc::new(vote_pk),
            vote_vk: Arc::new(vote_vk),
            aggregator_pk: Arc::new(aggregator_pk),
            aggregator_vk: Arc::new(aggregator_vk),
            transition_pk: Arc::new(transition_pk),
            transition_vk: Arc::new(transition_vk),
            dummy: Arc::new(dummy),
        })
    }
}

fn deserialize<T: CanonicalDeserialize, S: ArtifactSource>(
    cache: &ArtifactCache<S>,
    artifact_ref: &ArtifactRef,
) -> Result<T, WorkerError> {
    let bytes = cache.open_bytes(artifact_ref)?;
    T::deserialize_compressed(bytes.as_slice())
        .map_err(|err| WorkerError::ProofFailure(format!("malformed {}: {err}", artifact_ref.kind)))
}
