//! Aggregator-scheduler worker: batches verified ballots once a process either fills a full
//! batch or has sat non-empty past its max time window (§4.8's trigger policy, §5, C6).
//!
//! Unlike the other two workers this one is not queue-driven in a tight loop — there is nothing
//! to pull until a process crosses one of its two triggers — so it polls on a fixed tick and
//! evaluates every registered process each time.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ark_ff::PrimeField;
use ark_std::rand::rngs::StdRng;
use ark_std::rand::SeedableRng;

use sequencer_aggregator_circuit::{
    create_aggregator_proof, AggregatorWitness, PublicInputs as AggregatorPublicInputs, RealVote,
};
use sequencer_core::StateKey;
use sequencer_queue::Queues;
use sequencer_state::{AggregatedBatch, RecursionProof, VerifiedBallot};
use sequencer_vote_circuit::{PublicInputs as VotePublicInputs, VoteProof};

use crate::error::WorkerError;
use crate::keys::CircuitKeys;
use crate::registry::{self, ProcessRegistry};
use crate::shutdown::ShutdownSignal;

/// Run until `shutdown` is signaled, ticking every `tick_interval` and evaluating every
/// registered process's trigger policy.
pub async fn run(
    queues: Arc<Queues>,
    registry: Arc<ProcessRegistry>,
    keys: Arc<CircuitKeys>,
    votes_per_batch: usize,
    max_time_window: Duration,
    tick_interval: Duration,
    shutdown: ShutdownSignal,
) {
    let mut ticker = tokio::time::interval(tick_interval);
    let mut pending_since: HashMap<StateKey, Instant> = HashMap::new();
    while !shutdown.is_shutting_down() {
        ticker.tick().await;

        let process_ids = match registry.process_ids() {
            Ok(ids) => ids,
            Err(err) => {
                tracing::error!(error = %err, "failed to list registered processes");
                continue;
            }
        };
        for process_id in process_ids {
            let outcome = maybe_aggregate(
                &queues,
                &registry,
                &keys,
                process_id,
                votes_per_batch,
                max_time_window,
                &mut pending_since,
            )
            .await;
            if let Err(err) = outcome {
                tracing::error!(process_id = %process_id, error = %err, "aggregator scheduler failed for process");
            }
        }
    }
}

async fn maybe_aggregate(
    queues: &Queues,
    registry: &ProcessRegistry,
    keys: &CircuitKeys,
    process_id: StateKey,
    votes_per_batch: usize,
    max_time_window: Duration,
    pending_since: &mut HashMap<StateKey, Instant>,
) -> Result<(), WorkerError> {
    let count = queues.count_verified_ballots(process_id)?;
    if count == 0 {
        pending_since.remove(&process_id);
        return Ok(());
    }

    let first_seen = *pending_since.entry(process_id).or_insert_with(Instant::now);
    let due = count >= votes_per_batch || first_seen.elapsed() >= max_time_window;
    if !due {
        return Ok(());
    }

    let process = registry::require(registry, process_id)?;
    let pulled = queues.pull_verified_ballots(process_id, votes_per_batch)?;
    if pulled.is_empty() {
        return Ok(());
    }
    let reserved_keys: Vec<_> = pulled.iter().map(|(key, _)| key.clone()).collect();

    // A pulled ballot whose own recursive checks fail here would be a corrupted queue entry,
    // not a voter-side rejection (the ballot verifier already checked it once) — treated as a
    // hard failure so the batch, and this process's reservation, stay intact for inspection
    // rather than silently dropping a vote that was already accepted.
    let real_votes: Vec<RealVote> = pulled.iter().map(|(_, verified)| to_real_vote(verified)).collect::<Result<_, _>>()?;

    let witness = AggregatorWitness::new(
        process_id,
        process.census_root,
        process.ballot_mode,
        process.encryption_key,
        real_votes,
        &keys.vote_vk,
        &keys.dummy,
    )?;

    let aggregator_pk = Arc::clone(&keys.aggregator_pk);
    let proof = tokio::task::spawn_blocking(move || {
        let mut rng = StdRng::from_entropy();
        create_aggregator_proof(&aggregator_pk, witness, &mut rng)
    })
    .await
    .map_err(|err| WorkerError::ProofFailure(format!("aggregator prover task panicked: {err}")))?
    .map_err(|err| WorkerError::ProofFailure(err.to_string()))?;

    let dummy_proof = RecursionProof(keys.dummy.vote_proof.to_bytes());
    let verified_votes: Vec<VerifiedBallot> = pulled.into_iter().map(|(_, verified)| verified).collect();
    let batch = AggregatedBatch::pad(
        process_id,
        verified_votes,
        votes_per_batch,
        dummy_proof,
        RecursionProof(proof.to_bytes()),
    )?;

    queues.mark_verified_done(&reserved_keys, process_id, &batch)?;
    pending_since.remove(&process_id);
    Ok(())
}

/// Decode a queued `VerifiedBallot` back into the `RealVote` `AggregatorWitness::new` needs to
/// recursively re-verify its VoteVerifier proof.
fn to_real_vote(verified: &VerifiedBallot) -> Result<RealVote, WorkerError> {
    let vote_public_inputs = VotePublicInputs::from_bytes(&verified.vote_public_inputs.0)
        .ok_or_else(|| WorkerError::Malformed("malformed vote public inputs in queue entry".to_owned()))?;
    Ok(RealVote {
        vote_proof: VoteProof::from_bytes(verified.proof.0.clone()),
        vote_public_inputs,
        nullifier: sequencer_core::Fr::from_be_bytes_mod_order(verified.nullifier.as_bytes()),
        ballot: verified.ballot,
        address: verified.address,
        commitment: verified.commitment,
    })
}
