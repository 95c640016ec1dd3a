//! Voting-sequencer node binary.

mod cli;

use clap::Parser as _;
use sequencer_pipeline::config;
use sequencer_pipeline::Pipeline;

fn init_tracing(log_filter: &str) -> eyre::Result<()> {
    #[cfg(feature = "tokio-console")]
    {
        // tokio-console: layers the console subscriber with fmt
        use tracing_subscriber::prelude::*;
        tracing_subscriber::registry()
            .with(console_subscriber::spawn())
            .with(
                tracing_subscriber::fmt::layer().with_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_filter)),
                ),
            )
            .try_init()
            .map_err(|e| eyre::eyre!("Failed to initialize tracing: {:?}", e))?;
    }

    #[cfg(not(feature = "tokio-console"))]
    {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_filter.to_owned())),
            )
            .with_timer(tracing_subscriber::fmt::time::uptime())
            .with_target(false)
            .try_init()
            .map_err(|e| eyre::eyre!("Failed to initialize tracing: {:?}", e))?;
    }

    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> eyre::Result<()> {
    // Load .env file (fails silently if not found)
    let _ = dotenvy::dotenv();

    let cli = cli::Cli::parse();
    let node_config = config::load(cli.config.as_deref())?;

    init_tracing(&node_config.log_filter)?;

    tracing::info!(data_dir = ?node_config.data_dir, "opening sequencer pipeline");
    let pipeline = Pipeline::open(node_config)?;
    pipeline.check_processes_registered()?;

    let shutdown = pipeline.shutdown_handle();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install ctrl-c handler");
            return;
        }
        tracing::info!("shutdown signal received, draining worker loops");
        shutdown.shutdown();
    });

    pipeline.run().await?;
    tracing::info!("sequencer node stopped");
    Ok(())
}
