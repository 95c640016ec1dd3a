//! `NodeConfig` loading: a TOML file merged with `DAVINCI_*` environment-variable overrides
//! (§4.10, §6, §9 — a hand-rolled `serde` loader, not the generic `config` crate).

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use sequencer_core::constants::{DEFAULT_MAX_TIME_WINDOW_SECS, DEFAULT_TICK_INTERVAL_SECS, VOTES_PER_BATCH};
use sequencer_core::StateKey;

use crate::artifact::default_base_dir;
use crate::error::ConfigError;
use crate::keys::ArtifactManifest;

/// Typed node configuration (§3A `NodeConfig`): the sled data directory, the artifact cache
/// location, batching parameters, log filter, and the set of processes to poll at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Directory the queue substrate and state trees persist under.
    pub data_dir: PathBuf,
    /// Directory cached artifacts (proving/verifying keys, circuit params) live under.
    pub artifact_base_dir: PathBuf,
    /// Votes batched into a single Aggregator proof.
    pub votes_per_batch: usize,
    /// Maximum time a process may sit below `votes_per_batch` before a short batch is forced.
    pub max_time_window_secs: u64,
    /// Aggregator scheduler tick period.
    pub tick_interval_secs: u64,
    /// Age past which a held queue reservation is considered stale and swept.
    pub stale_reservation_age_secs: u64,
    /// `tracing-subscriber` `EnvFilter` string.
    pub log_filter: String,
    /// Processes to poll for registration at startup, as hex-encoded `StateKey`s.
    pub processes: Vec<String>,
    /// Hex-encoded SHA-256 references to the recursion tower's eight key blobs.
    pub artifact_manifest: ArtifactManifest,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            artifact_base_dir: default_base_dir(),
            votes_per_batch: VOTES_PER_BATCH,
            max_time_window_secs: DEFAULT_MAX_TIME_WINDOW_SECS,
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
            stale_reservation_age_secs: DEFAULT_MAX_TIME_WINDOW_SECS,
            log_filter: "info".to_owned(),
            processes: Vec::new(),
            artifact_manifest: ArtifactManifest::default(),
        }
    }
}

impl NodeConfig {
    /// Parse the process ID list into `StateKey`s, skipping (and logging) any malformed entry.
    #[must_use]
    pub fn process_ids(&self) -> Vec<StateKey> {
        self.processes
            .iter()
            .filter_map(|hex_id| {
                let bytes = hex::decode(hex_id).ok()?;
                let key = StateKey::from_slice(&bytes).ok();
                if key.is_none() {
                    tracing::warn!(hex_id, "ignoring malformed process id in configuration");
                }
                key
            })
            .collect()
    }
}

/// Load a [`NodeConfig`] from an optional TOML file, then apply `DAVINCI_*` environment-variable
/// overrides (§6, §9). Env vars always take precedence over the file, and the file is optional:
/// a `None` path (or a file that doesn't exist) starts from [`NodeConfig::default`].
///
/// # Errors
/// Returns [`ConfigError::Read`] or [`ConfigError::Parse`] if a given `path` exists but can't be
/// read or parsed, or [`ConfigError::InvalidEnvValue`] if an override doesn't parse.
pub fn load(path: Option<&Path>) -> Result<NodeConfig, ConfigError> {
    let mut config = match path {
        Some(path) if path.exists() => {
            let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
            toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?
        }
        _ => NodeConfig::default(),
    };

    apply_env_overrides(&mut config)?;
    Ok(config)
}

fn apply_env_overrides(config: &mut NodeConfig) -> Result<(), ConfigError> {
    if let Some(value) = env_var("DAVINCI_DATA_DIR") {
        config.data_dir = PathBuf::from(value);
    }
    if let Some(value) = env_var("DAVINCI_ARTIFACT_BASE_DIR") {
        config.artifact_base_dir = PathBuf::from(value);
    }
    if let Some(value) = env_var("DAVINCI_VOTES_PER_BATCH") {
        config.votes_per_batch = parse_env("DAVINCI_VOTES_PER_BATCH", &value)?;
    }
    if let Some(value) = env_var("DAVINCI_MAX_TIME_WINDOW_SECS") {
        config.max_time_window_secs = parse_env("DAVINCI_MAX_TIME_WINDOW_SECS", &value)?;
    }
    if let Some(value) = env_var("DAVINCI_TICK_INTERVAL_SECS") {
        config.tick_interval_secs = parse_env("DAVINCI_TICK_INTERVAL_SECS", &value)?;
    }
    if let Some(value) = env_var("DAVINCI_STALE_RESERVATION_AGE_SECS") {
        config.stale_reservation_age_secs = parse_env("DAVINCI_STALE_RESERVATION_AGE_SECS", &value)?;
    }
    if let Some(value) = env_var("DAVINCI_LOG_FILTER") {
        config.log_filter = value;
    }
    if let Some(value) = env_var("DAVINCI_PROCESSES") {
        config.processes = value.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned).collect();
    }
    Ok(())
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvValue {
        var: var.to_owned(),
        value: value.to_owned(),
    })
}
