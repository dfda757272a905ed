//! jobwatch controller
//!
//! Reads job status records from the shared store, lists them and files
//! kill requests for running jobs.

use std::path::PathBuf;

use clap::Parser;

mod cli;
mod commands;
mod config_helpers;
mod tracing_setup;

use cli::Cli;
use config_helpers::status_client_from_config;
use tracing_setup::install_tracing_from_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    // Resolve config path: CLI > environment variable
    let config_path = args
        .config_path
        .clone()
        .or_else(|| std::env::var_os("JOBWATCH_CONFIG_PATH").map(PathBuf::from));

    let mut config = load_config(config_path.as_ref())?;
    if let Some(url) = &args.redis_url {
        config.redis.url = url.clone();
    }
    jobwatch_config::validate_config(&config)?;

    install_tracing_from_config(&config.logging);
    tracing::debug!(config_path = ?config_path, "configuration loaded");

    let client = status_client_from_config(&config).await?;
    let stdout = std::io::stdout();
    commands::run(&args.command, &client, &mut stdout.lock()).await
}

/// Load configuration from file or defaults.
fn load_config(path: Option<&PathBuf>) -> anyhow::Result<jobwatch_config::Config> {
    jobwatch_config::load_config(path).map_err(|e| {
        eprintln!("failed to load configuration: {e}");
        anyhow::anyhow!(e)
    })
}
