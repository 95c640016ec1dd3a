//! Error taxonomy for the artifact cache and worker orchestration (§4.9, §4.10, §7).

use thiserror::Error;

/// Errors raised while resolving or fetching a cached artifact.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The cache directory or the artifact blob itself could not be read or written.
    #[error("artifact I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The on-disk (or freshly fetched) blob's SHA-256 did not match the expected hash.
    #[error("artifact hash mismatch: expected {expected}, got {got}")]
    HashMismatch {
        /// Hex-encoded expected hash.
        expected: String,
        /// Hex-encoded hash of the bytes actually read.
        got: String,
    },

    /// No `ArtifactSource` could produce the requested artifact.
    #[error("artifact not found: {0}")]
    NotFound(String),
}

/// Errors raised while loading [`crate::config::NodeConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file's contents were not valid TOML for `NodeConfig`.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: String,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// An environment-variable override did not parse as the field's expected type.
    #[error("environment variable {var} has an invalid value: {value}")]
    InvalidEnvValue {
        /// Name of the offending environment variable.
        var: String,
        /// The value that failed to parse.
        value: String,
    },
}

/// Errors raised while a worker processes one queue entry.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The queue substrate failed.
    #[error("queue error: {0}")]
    Queue(#[from] sequencer_queue::QueueError),

    /// The state engine rejected a batch operation.
    #[error("state error: {0}")]
    State(#[from] sequencer_state::StateError),

    /// The submitted vote failed a VoteVerifier-witness check.
    #[error("vote rejected: {0}")]
    VoteRejected(#[from] sequencer_vote_circuit::WitnessError),

    /// The batch failed an Aggregator-witness check.
    #[error("batch rejected: {0}")]
    BatchRejected(#[from] sequencer_aggregator_circuit::WitnessError),

    /// The closed batch failed a StateTransition-witness check.
    #[error("transition rejected: {0}")]
    TransitionRejected(#[from] sequencer_transition_circuit::WitnessError),

    /// Proof generation or verification failed for a witness that should have satisfied its
    /// circuit (§7 `ProofFailure`).
    #[error("proof failure: {0}")]
    ProofFailure(String),

    /// No process is registered for a vote or batch's declared `ProcessID`.
    #[error("process {0} is not registered")]
    UnknownProcess(String),

    /// An artifact needed to prove or verify could not be resolved.
    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    /// The process registry or engine-root store failed.
    #[error("store error: {0}")]
    Sled(#[from] sled::Error),

    /// A queue entry carried a proof or public-input encoding that failed to decode.
    #[error("malformed queue entry: {0}")]
    Malformed(String),
}
