//! duel-relay binary entry point.
//!
//! Usage:
//! ```bash
//! duel-relay --config relay.toml
//! duel-relay --bind 127.0.0.1:8080
//! duel-relay --help
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use duel_relay::{serve, Config, DuelRelay};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Room relay server for duel-sync.
#[derive(Parser, Debug)]
#[command(name = "duel-relay")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file (defaults apply if omitted)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Override the bind address from the configuration
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }

    tracing::info!("duel-relay v{}", env!("CARGO_PKG_VERSION"));

    let relay = Arc::new(DuelRelay::new(config));
    serve(relay).await.context("relay server failed")?;
    Ok(())
}
