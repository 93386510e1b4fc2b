//! weft-exchange: the fleet's URL coordinator
//!
//! Listens for crawl node connections and routes every submitted URL to the
//! node that owns its site. Runs until a termination signal, then drains
//! in-flight submissions before exiting.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use weft::config::{load_exchange_config, ExchangeConfig};
use weft::exchange::{Exchange, ExchangeId};

/// URL exchange for a weft crawl fleet
#[derive(Parser, Debug)]
#[command(name = "weft-exchange")]
#[command(version)]
#[command(about = "Routes URLs to the crawl nodes that own their sites", long_about = None)]
struct Cli {
    /// Exchange identifier (a random UUID when absent)
    #[arg(long)]
    id: Option<String>,

    /// IP address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    ip: String,

    /// Port number to listen on
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
        Some(path) => load_exchange_config(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => ExchangeConfig::default(),
    };

    let id = cli
        .id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let addr = format!("{}:{}", cli.ip, cli.port);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!(id = %id, addr = %addr, "exchange listening");

    let (stop_tx, stop_rx) = watch::channel(false);
    let exchange = Exchange::with_config(ExchangeId::new(id), config);
    let server = tokio::spawn(exchange.run(listener, stop_rx));

    tokio::signal::ctrl_c().await?;
    tracing::info!("termination signal received, shutting down");
    let _ = stop_tx.send(true);

    server.await??;
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
