//! listd
//!
//! Connects to a playout service, then accepts clients and relays between
//! them, adding a shared playlist on top.

use anyhow::{Context, Result};
use clap::Parser;
use listd_core::VERSION;
use listd_hub::{Downstream, Hub, HubConfig, Server};
use listd_transport::TcpConfig;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinError;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "listd")]
#[command(about = "Playlist hub for line-oriented playout services")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    setup_logging(cli.verbose, &config.log.level)?;

    info!("Starting listd {}", VERSION);

    let tcp = TcpConfig {
        outbound_queue_depth: config.hub.outbound_queue_depth,
        ..Default::default()
    };

    let downstream = Downstream::connect_tcp(&config.playout.uri, tcp.clone())
        .await
        .with_context(|| format!("Could not connect to playout at {}", config.playout.uri))?;

    let hub_config = HubConfig {
        name: config.hub.name.clone(),
        slow_client_timeout: Duration::from_millis(config.hub.slow_client_timeout_ms),
        ..Default::default()
    };
    let (hub, handle) = Hub::new(hub_config, downstream);
    let mut hub_task = tokio::spawn(hub.run());

    let server = Server::new(handle.clone()).with_tcp_config(tcp);

    tokio::select! {
        result = server.serve_tcp(&config.server.listen) => {
            result.with_context(|| format!("Could not serve on {}", config.server.listen))?;
        }
        result = &mut hub_task => {
            server.shutdown().await;
            return hub_outcome(result);
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            let _ = handle.quit().await;
            server.shutdown().await;
        }
    }

    hub_outcome(hub_task.await)
}

fn hub_outcome(result: std::result::Result<listd_hub::Result<()>, JoinError>) -> Result<()> {
    match result {
        Ok(Ok(())) => {
            info!("Hub stopped");
            Ok(())
        }
        Ok(Err(e)) => Err(e).context("Hub stopped with an error"),
        Err(e) => Err(e).context("Hub task failed"),
    }
}

/// `--verbose` forces debug; otherwise `RUST_LOG` wins over the config file
fn setup_logging(verbose: bool, level: &str) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level))
            .context("Failed to parse log level")?
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
    Ok(())
}
