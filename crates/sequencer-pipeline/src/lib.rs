//! Artifact cache, process registry, and worker orchestration for the voting-sequencer node
//! (§4.8, §4.9, §4.10, §5, §9).
//!
//! [`Pipeline`] is the node binary's single entry point: it opens the queue and state
//! substrates, loads the recursion tower's Groth16 key material, and spawns the three worker
//! loops that carry a ballot from submission to a settled state-transition proof.

pub mod artifact;
pub mod config;
pub mod error;
pub mod keys;
pub mod registry;
pub mod shutdown;
pub mod state;
pub mod workers;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ark_std::rand::rngs::StdRng;
use ark_std::rand::SeedableRng;

use sequencer_queue::Queues;

use artifact::{ArtifactCache, FsArtifactSource};
use config::NodeConfig;
use error::WorkerError;
use keys::CircuitKeys;
use registry::ProcessRegistry;
use shutdown::{channel, ShutdownHandle, ShutdownSignal};
use state::EngineStore;

/// Every long-lived substrate and handle the three worker loops share, assembled once at
/// startup and held behind `Arc` for the lifetime of the process (§5).
pub struct Pipeline {
    queues: Arc<Queues>,
    registry: Arc<ProcessRegistry>,
    engines: Arc<EngineStore>,
    keys: Arc<CircuitKeys>,
    config: NodeConfig,
    shutdown_handle: ShutdownHandle,
    shutdown_signal: ShutdownSignal,
}

impl Pipeline {
    /// Open every substrate named in `config`: the queue database, the process/engine state
    /// database, the artifact cache, and the recursion tower's key material.
    ///
    /// # Errors
    /// Returns [`WorkerError`] if any substrate fails to open, or a key blob fails to resolve
    /// or deserialize.
    pub fn open(config: NodeConfig) -> Result<Self, WorkerError> {
        let queues = Queues::open(config.data_dir.join("queues"))?;

        let state_db = sled::open(config.data_dir.join("state"))?;
        let registry = ProcessRegistry::new(state_db.open_tree("processes")?);
        let engines = EngineStore::open(&state_db)?;

        let cache = ArtifactCache::open(
            config.artifact_base_dir.clone(),
            FsArtifactSource::new(config.artifact_base_dir.clone()),
        )?;
        let mut rng = StdRng::seed_from_u64(0);
        let keys = CircuitKeys::load(&cache, &config.artifact_manifest, &mut rng)?;

        let (shutdown_handle, shutdown_signal) = channel();

        Ok(Self {
            queues: Arc::new(queues),
            registry: Arc::new(registry),
            engines: Arc::new(engines),
            keys: Arc::new(keys),
            config,
            shutdown_handle,
            shutdown_signal,
        })
    }

    /// Warn about any process named in `NodeConfig::processes` that this node's registry
    /// doesn't actually have a header for (§9): registration itself happens out of band (an
    /// operator or admin interface supplies the full `Process` record), this only confirms the
    /// startup poll list and the registry agree before the worker loops start consuming queues
    /// for processes that would otherwise silently sit unregistered.
    ///
    /// # Errors
    /// Returns [`WorkerError`] if the registry read fails.
    pub fn check_processes_registered(&self) -> Result<(), WorkerError> {
        for process_id in self.config.process_ids() {
            if self.registry.get(process_id)?.is_none() {
                tracing::warn!(process_id = %process_id, "configured process has no registered header yet");
            }
        }
        Ok(())
    }

    /// The process registry, for an operator-facing layer (out of this crate's scope) to
    /// register or unregister processes against.
    #[must_use]
    pub fn registry(&self) -> Arc<ProcessRegistry> {
        Arc::clone(&self.registry)
    }

    /// A handle that can signal every worker loop to stop.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown_handle.clone()
    }

    /// Spawn the three worker loops and run until `shutdown_handle()` is signaled, then wait for
    /// every loop to observe it and return, flushing the queue store on the way out.
    ///
    /// # Errors
    /// Returns [`WorkerError`] if the final flush fails. Worker-loop failures are logged and
    /// retried internally; they never make this future return early.
    pub async fn run(&self) -> Result<(), WorkerError> {
        let idle_backoff = Duration::from_millis(200);
        let max_time_window = Duration::from_secs(self.config.max_time_window_secs);
        let tick_interval = Duration::from_secs(self.config.tick_interval_secs);
        let stale_age = Duration::from_secs(self.config.stale_reservation_age_secs);

        let ballot_verifier = tokio::spawn(workers::ballot_verifier::run(
            Arc::clone(&self.queues),
            Arc::clone(&self.registry),
            Arc::clone(&self.keys),
            self.shutdown_signal.clone(),
            idle_backoff,
        ));

        let aggregator_scheduler = tokio::spawn(workers::aggregator_scheduler::run(
            Arc::clone(&self.queues),
            Arc::clone(&self.registry),
            Arc::clone(&self.keys),
            self.config.votes_per_batch,
            max_time_window,
            tick_interval,
            self.shutdown_signal.clone(),
        ));

        let transition_worker = tokio::spawn(workers::transition_worker::run(
            Arc::clone(&self.queues),
            Arc::clone(&self.registry),
            Arc::clone(&self.keys),
            Arc::clone(&self.engines),
            self.shutdown_signal.clone(),
            idle_backoff,
        ));

        let sweeper = {
            let queues = Arc::clone(&self.queues);
            let shutdown = self.shutdown_signal.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(tick_interval);
                while !shutdown.is_shutting_down() {
                    ticker.tick().await;
                    if let Err(err) = queues.sweep_stale_reservations(stale_age) {
                        tracing::error!(error = %err, "stale-reservation sweep failed");
                    }
                }
            })
        };

        for task in [ballot_verifier, aggregator_scheduler, transition_worker, sweeper] {
            if let Err(err) = task.await {
                tracing::error!(error = %err, "a worker task panicked");
            }
        }

        self.queues.flush()?;
        Ok(())
    }
}
