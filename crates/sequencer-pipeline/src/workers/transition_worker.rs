//! State-transition worker: applies a closed batch to the tally tree and produces the
//! StateTransition proof (§4.7, §5, C7). The only worker that mutates the tree (§5 "single
//! writer"), and the recursion tower's terminus.

use std::sync::Arc;
use std::time::Duration;

use ark_ff::PrimeField;
use ark_std::rand::rngs::StdRng;
use ark_std::rand::SeedableRng;

use sequencer_aggregator_circuit::{
    AggregatorProof, AggregatorWitness, PublicInputs as AggregatorPublicInputs, RealVote,
};
use sequencer_queue::{QueueError, QueueKey, Queues};
use sequencer_state::{AggregatedBatch, VerifiedBallot};
use sequencer_transition_circuit::{create_transition_proof, TransitionWitness};
use sequencer_vote_circuit::{PublicInputs as VotePublicInputs, VoteProof};

use crate::error::WorkerError;
use crate::keys::CircuitKeys;
use crate::registry::{self, ProcessRegistry};
use crate::shutdown::ShutdownSignal;
use crate::state::EngineStore;

/// Run until `shutdown` is signaled, polling `queues` for closed batches.
pub async fn run(
    queues: Arc<Queues>,
    registry: Arc<ProcessRegistry>,
    keys: Arc<CircuitKeys>,
    engines: Arc<EngineStore>,
    shutdown: ShutdownSignal,
    idle_backoff: Duration,
) {
    while !shutdown.is_shutting_down() {
        match queues.next_batch() {
            Ok((key, batch)) => {
                if let Err(err) = apply_batch(&queues, &registry, &keys, &engines, &key, batch).await {
                    tracing::error!(error = %err, "state-transition worker failed, batch left reserved for retry");
                }
            }
            Err(QueueError::NoMoreElements) => tokio::time::sleep(idle_backoff).await,
            Err(err) => {
                tracing::error!(error = %err, "batch queue read failed");
                tokio::time::sleep(idle_backoff).await;
            }
        }
    }
}

async fn apply_batch(
    queues: &Queues,
    registry: &ProcessRegistry,
    keys: &CircuitKeys,
    engines: &EngineStore,
    key: &QueueKey,
    batch: AggregatedBatch,
) -> Result<(), WorkerError> {
    let process = registry::require(registry, batch.process_id)?;
    let mut engine = engines.engine_for(&process)?;

    let real_votes: Vec<RealVote> = batch.votes[..batch.real_count]
        .iter()
        .map(to_real_vote)
        .collect::<Result<_, _>>()?;

    let aggregator_witness = AggregatorWitness::new(
        batch.process_id,
        process.census_root,
        process.ballot_mode,
        process.encryption_key,
        real_votes,
        &keys.vote_vk,
        &keys.dummy,
    )?;
    let aggregator_public_inputs = AggregatorPublicInputs::from_witness(&aggregator_witness);
    let aggregator_proof = AggregatorProof::from_bytes(batch.aggregator_proof.0.clone());

    let header_inclusion = engine.header_inclusion()?;
    let root_before = engine.root();

    engine.start_batch()?;
    for vote in &batch.votes[..batch.real_count] {
        engine.add_vote(vote)?;
    }
    let transitions = engine.end_batch()?;
    let results = engine
        .last_results_snapshot()
        .ok_or_else(|| WorkerError::Malformed("batch closed without producing a results snapshot".to_owned()))?;

    let witness = TransitionWitness::new(
        root_before,
        process,
        &header_inclusion,
        transitions,
        results,
        &aggregator_witness,
        &aggregator_proof,
        &aggregator_public_inputs,
        &keys.aggregator_vk,
    )?;

    let transition_pk = Arc::clone(&keys.transition_pk);
    let proof = tokio::task::spawn_blocking(move || {
        let mut rng = StdRng::from_entropy();
        create_transition_proof(&transition_pk, witness, &mut rng)
    })
    .await
    .map_err(|err| WorkerError::ProofFailure(format!("transition prover task panicked: {err}")))?
    .map_err(|err| WorkerError::ProofFailure(err.to_string()))?;

    engines.save_root(batch.process_id, engine.root())?;
    tracing::info!(
        process_id = %batch.process_id,
        new_root = ?engine.root(),
        proof_len = proof.len(),
        "closed batch and produced a state-transition proof",
    );

    queues.mark_batch_done(key)?;
    Ok(())
}

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
