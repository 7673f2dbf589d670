//! Registry node executable.
//!
//! ```text
//! svcreg                              # found a ring on the well-known port
//! svcreg --join root                  # join the ring founded on host "root"
//! svcreg --config registry.yaml -d    # YAML config, debug logging
//! ```

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use svcreg_registry::config::DhtMode;
use svcreg_registry::{RegistryConfig, RegistryServer};

/// Distributed service registry node
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (YAML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Join the ring founded on this host instead of founding one
    #[arg(long, value_name = "HOST")]
    join: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    initialize_logging(args.debug);

    let mut config = match &args.config {
        Some(path) => {
            info!("Config file: {}", path);
            RegistryConfig::load_from_file(path)?
        }
        None => RegistryConfig::default(),
    };

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.join {
        config.dht.mode = DhtMode::Join;
        config.dht.bootstrap_host = host;
    }
    config.validate()?;

    info!("Starting registry node (DHT mode: {:?})", config.dht.mode);

    let server = RegistryServer::new(config).await?;
    if let Err(e) = server.run_until(shutdown_signal()).await {
        error!("Registry node stopped with error: {}", e);
        return Err(e.into());
    }

    Ok(())
}

fn initialize_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .with_thread_ids(true)
        .init();
}

async fn shutdown_signal() {
    use tokio::signal;

    #[cfg(unix)]
    {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!("Failed to create SIGTERM handler: {}", e);
                let _ = signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM signal"),
            _ = signal::ctrl_c() => info!("Received SIGINT signal"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
        info!("Received Ctrl+C signal");
    }
}
