//! weft-node: one crawl worker of the fleet
//!
//! Joins the exchange, crawls the sites routed to it with per-site courtesy
//! spacing, and reports every discovered link back for routing. Reconnects
//! with a fixed backoff when the exchange goes away; exits only on a
//! termination signal.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use weft::config::{load_node_config, NodeConfig};
use weft::node::Node;
use weft::store::SqlitePageStore;

/// Crawl node for a weft fleet
#[derive(Parser, Debug)]
#[command(name = "weft-node")]
#[command(version)]
#[command(about = "Crawls the sites assigned by a weft exchange", long_about = None)]
struct Cli {
    /// Node identifier (a random UUID when absent)
    #[arg(long)]
    id: Option<String>,

    /// IP address of the exchange
    #[arg(long, default_value = "127.0.0.1")]
    ip: String,

    /// Port of the exchange
    #[arg(long, default_value_t = 9000)]
    port: u16,

    /// Path to TOML configuration file
    #[arg(long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => load_node_config(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => NodeConfig::default(),
    };

    let id = cli
        .id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let exchange_addr = format!("{}:{}", cli.ip, cli.port);

    let store = SqlitePageStore::new(Path::new(&config.store.database_path))
        .with_context(|| format!("opening page store at {}", config.store.database_path))?;

    let (stop_tx, stop_rx) = watch::channel(false);
    let node = Node::new(id, exchange_addr, config);
    let runner = tokio::spawn(node.run(store, stop_rx));

    tokio::signal::ctrl_c().await?;
    tracing::info!("termination signal received, shutting down");
    let _ = stop_tx.send(true);

    runner.await??;
    Ok(())
}

/// Sets up the tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("weft=info,warn"),
            1 => EnvFilter::new("weft=debug,info"),
            2 => EnvFilter::new("weft=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
