//! Command-line surface for the sequencer node binary (§4.10, §6).
//!
//! Deliberately thin: a config path and the handful of overrides an operator starting the
//! process needs at the command line. The broader operator CLI (registering processes, reading
//! back queue/state contents) is out of scope (§1 Non-goals) and lives, if it ever does, behind
//! [`sequencer_pipeline::Pipeline::registry`].

use std::path::PathBuf;

use clap::Parser;

/// Run the voting-sequencer node: verify ballots, aggregate batches, and apply them to the tally
/// tree, each stage producing its recursive Groth16 proof.
#[derive(Debug, Parser)]
#[command(name = "davinci-sequencer")]
#[command(about = "DAVINCI voting-sequencer node")]
pub struct Cli {
    /// Path to a TOML configuration file. Missing fields fall back to defaults; `DAVINCI_*`
    /// environment variables override both.
    #[arg(long, env = "DAVINCI_CONFIG")]
    pub config: Option<PathBuf>,
}
