//! Protocol-wide constants pinned by §6 of the specification.

/// Number of ElGamal ciphertexts carried per ballot.
pub const FIELDS_PER_BALLOT: usize = 8;

/// Number of verified ballots aggregated into a single batch proof.
pub const VOTES_PER_BATCH: usize = 10;

/// Depth of the sparse Merkle tree backing the state engine.
pub const STATE_PROOF_MAX_LEVELS: usize = 160;

/// Depth of the census Merkle tree voters prove membership against.
pub const CENSUS_PROOF_MAX_LEVELS: usize = 160;

/// Byte width of a state-tree key (`StateProofMaxLevels / 8`).
pub const STATE_KEY_BYTES: usize = STATE_PROOF_MAX_LEVELS / 8;

/// Default tick period for the aggregator scheduler, in seconds.
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 10;

/// Default maximum time a process may sit below `VOTES_PER_BATCH` before a short batch is forced.
pub const DEFAULT_MAX_TIME_WINDOW_SECS: u64 = 300;
