//! Sandbox gateway server.
//!
//! Serves confined file, shell and git operations over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use sandbox_gateway::config::{GatewayConfig, Validate};
use sandbox_gateway::{server, Gateway};

/// Remote execution gateway confined to a single directory subtree.
#[derive(Debug, Parser)]
#[command(name = "sandbox-gateway", version, about)]
struct Cli {
    /// Configuration file (TOML, or YAML with a .yaml/.yml extension).
    #[arg(short, long, env = "SANDBOX_GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Sandbox root directory; overrides the configuration file.
    #[arg(short, long, env = "SANDBOX_GATEWAY_ROOT")]
    root: Option<PathBuf>,

    /// Listen address; overrides the configuration file.
    #[arg(short, long, env = "SANDBOX_GATEWAY_BIND")]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("sandbox-gateway: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> sandbox_gateway::Result<()> {
    let mut config = match &cli.config {
        Some(path) => GatewayConfig::load(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(root) = cli.root {
        config = config.with_sandbox_root(root);
    }
    if let Some(bind) = cli.bind {
        config = config.with_bind_addr(bind);
    }

    for warning in config.validate().into_result()? {
        tracing::warn!("{}", warning);
    }

    let gateway = Arc::new(Gateway::from_config(&config)?);
    tracing::info!(
        root = ?gateway.root().path(),
        allowed = ?gateway.policy().allowed().collect::<Vec<_>>(),
        "sandbox gateway configured"
    );

    server::serve(gateway, config.bind_addr, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
