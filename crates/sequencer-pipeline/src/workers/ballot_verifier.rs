//! `NextBallot -> processBallot -> MarkBallotDone` worker loop (§4.8, §5, C5).
//!
//! One submitted [`Vote`] in, one [`VerifiedBallot`] out: the witness check natively re-verifies
//! the voter's inner BallotProof, so a rejected vote never reaches a single R1CS constraint of
//! its own circuit. Rejections (malformed fields, a bad signature, a failing BallotProof) and
//! genuine prover failures are both treated as "this ballot cannot be advanced" and dropped —
//! §7's `ProofFailure` is reserved for failures that should be structurally impossible, so a
//! dropped ballot here is always logged at `warn!`, never silently discarded.

use std::sync::Arc;
use std::time::Duration;

use ark_ff::{BigInteger, PrimeField};
use ark_std::rand::rngs::StdRng;
use ark_std::rand::SeedableRng;

use sequencer_ballot_circuit::BallotProof;
use sequencer_core::schema::{EncryptionKeyCoords, Process};
use sequencer_core::Fr;
use sequencer_queue::{QueueError, QueueKey, Queues};
use sequencer_state::{RecursionProof, Vote, VerifiedBallot};
use sequencer_vote_circuit::{create_vote_proof, PublicInputs as VotePublicInputs, VoteWitness};

use crate::error::WorkerError;
use crate::keys::CircuitKeys;
use crate::registry::{self, ProcessRegistry};
use crate::shutdown::ShutdownSignal;

/// Run until `shutdown` is signaled, polling `queues` for pending ballots.
pub async fn run(
    queues: Arc<Queues>,
    registry: Arc<ProcessRegistry>,
    keys: Arc<CircuitKeys>,
    shutdown: ShutdownSignal,
    idle_backoff: Duration,
) {
    while !shutdown.is_shutting_down() {
        match queues.next_ballot() {
            Ok((key, vote)) => {
                if let Err(err) = process_ballot(&queues, &registry, &keys, &key, vote).await {
                    tracing::error!(error = %err, "ballot verifier failed, ballot left reserved for retry");
                }
            }
            Err(QueueError::NoMoreElements) => tokio::time::sleep(idle_backoff).await,
            Err(err) => {
                tracing::error!(error = %err, "ballot queue read failed");
                tokio::time::sleep(idle_backoff).await;
            }
        }
    }
}

async fn process_ballot(
    queues: &Queues,
    registry: &ProcessRegistry,
    keys: &CircuitKeys,
    key: &QueueKey,
    vote: Vote,
) -> Result<(), WorkerError> {
    let process = match registry::require(registry, vote.process_id) {
        Ok(process) => process,
        Err(err) => {
            tracing::warn!(process_id = %vote.process_id, error = %err, "dropping ballot for unregistered process");
            queues.drop_ballot(key)?;
            return Ok(());
        }
    };

    let witness = match build_witness(&vote, &process, keys) {
        Ok(witness) => witness,
        Err(reason) => {
            tracing::warn!(process_id = %vote.process_id, address = %vote.address, reason, "dropping rejected ballot");
            queues.drop_ballot(key)?;
            return Ok(());
        }
    };

    let public_inputs = VotePublicInputs::from_witness(&witness);
    let inputs_hash = witness.inputs_hash();
    let process_id = vote.process_id;
    let address = vote.address;
    let nullifier = vote.nullifier;
    let commitment = vote.commitment;
    let ballot = vote.ballot;
    let voter_weight = vote.voter_weight;

    let vote_pk = Arc::clone(&keys.vote_pk);
    let proof = tokio::task::spawn_blocking(move || {
        let mut rng = StdRng::from_entropy();
        create_vote_proof(&vote_pk, witness, &mut rng)
    })
    .await
    .map_err(|err| WorkerError::ProofFailure(format!("vote prover task panicked: {err}")))?;

    let proof = match proof {
        Ok(proof) => proof,
        Err(err) => {
            tracing::warn!(process_id = %process_id, address = %address, error = %err, "dropping ballot whose proof could not be produced");
            queues.drop_ballot(key)?;
            return Ok(());
        }
    };

    let verified = VerifiedBallot {
        process_id,
        address,
        nullifier,
        commitment,
        ballot,
        voter_weight,
        inputs_hash,
        proof: RecursionProof(proof.to_bytes()),
        vote_public_inputs: RecursionProof(public_inputs.to_bytes()),
    };

    queues.mark_ballot_done(key, process_id, &verified)?;
    Ok(())
}

fn build_witness(vote: &Vote, process: &Process, keys: &CircuitKeys) -> Result<VoteWitness, String> {
    let signature: [u8; 64] = vote
        .signature
        .as_slice()
        .try_into()
        .map_err(|_| format!("signature is {} bytes, expected 64", vote.signature.len()))?;

    VoteWitness::new(
        vote.process_id,
        process.census_root,
        process.ballot_mode,
        process.encryption_key,
        Fr::from_be_bytes_mod_order(vote.nullifier.as_bytes()),
        vote.ballot,
        vote.address,
        vote.commitment,
        vote.voter_weight,
        vote.census_proof.clone(),
        raw_pub_key(&vote.voter_pub_key),
        signature,
        vote.ballot_inputs_hash,
        BallotProof::from_bytes(vote.ballot_proof.0.clone()),
        keys.ballot_vk.as_ref().clone(),
    )
    .map_err(|err| err.to_string())
}

/// Flatten the voter's secp256k1 public key, carried as a generic coordinate pair, back to the
/// raw uncompressed SEC1 bytes `VoteWitness::new` expects.
fn raw_pub_key(coords: &EncryptionKeyCoords) -> [u8; 64] {
    let mut out = [0_u8; 64];
    out[..32].copy_from_slice(&pad_be_32(coords.x));
    out[32..].copy_from_slice(&pad_be_32(coords.y));
    out
}

fn pad_be_32(value: Fr) -> [u8; 32] {
    let raw = value.into_bigint().to_bytes_be();
    let mut out = [0_u8; 32];
    let offset = 32_usize.saturating_sub(raw.len());
    out[offset..].copy_from_slice(&raw);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_be_32_left_pads_short_values() {
        let bytes = pad_be_32(Fr::from(1_u64));
        assert_eq!(bytes[..31], [0_u8; 31]);
        assert_eq!(bytes[31], 1);
    }

    #[test]
    fn raw_pub_key_concatenates_both_coordinates() {
        let coords = EncryptionKeyCoords { x: Fr::from(1_u64), y: Fr::from(2_u64) };
        let bytes = raw_pub_key(&coords);
        assert_eq!(bytes[31], 1);
        assert_eq!(bytes[63], 2);
    }
}
