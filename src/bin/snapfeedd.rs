//! snapfeedd - Snapfeed daemon.
//!
//! Serves the configured feeds over HTTP.

use std::net::SocketAddr;
use std::sync::{Arc, LazyLock};

use clap::Parser;
use tracing::info;

use snapfeed::Snapfeed;
use snapfeed::server::config::{Config, Secrets};
use snapfeed::server::{AppState, router};

/// `--version` output, with the git metadata stamped at build time.
static VERSION: LazyLock<String> = LazyLock::new(snapfeed::version_string);

/// Snapfeed daemon: cached JSON Feed snapshots.
#[derive(Parser)]
#[command(name = "snapfeedd")]
#[command(version = VERSION.as_str())]
#[command(about = "Snapfeed JSON Feed daemon")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Override the bind address from the config file.
    #[arg(short, long, env = "SNAPFEED_ADDRESS")]
    address: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // Load configuration
    let config = Config::load(args.config.as_deref())?;
    let secrets = Secrets::load()?;

    // Build the gateway from config
    let gateway = config.apply(&secrets, Snapfeed::builder())?.build()?;

    // Parse address
    let address = args.address.as_deref().unwrap_or(&config.server.address);
    let addr: SocketAddr = address.parse().map_err(|e| {
        snapfeed::FeedError::Configuration(format!("Invalid address {address}: {e}"))
    })?;

    let state = AppState::new(Arc::new(gateway), config.server.public_url.clone());
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(version = VERSION.as_str(), %addr, "snapfeedd starting");

    axum::serve(listener, router(state)).await?;

    Ok(())
}
