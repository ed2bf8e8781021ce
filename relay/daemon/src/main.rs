//! Confab Daemon
//!
//! Standalone relay server: accepts conversations over HTTP and forwards
//! them to the configured model provider.
//!
//! # Usage
//!
//! ```bash
//! # Start on the default address
//! confab-daemon
//!
//! # Custom bind address
//! confab-daemon --bind 0.0.0.0:8080
//!
//! # With verbose logging
//! RUST_LOG=debug confab-daemon
//! ```
//!
//! # Environment Variables
//!
//! - `CONFAB_BIND`: listen address (default: 127.0.0.1:3000)
//! - `CONFAB_STREAM`: `false` to forward complete JSON bodies instead of
//!   streaming
//! - `CONFAB_INSTRUCTION`: override the built-in instruction prompt
//! - `CONFAB_REGION` / `AWS_REGION`: provider region
//! - `CONFAB_BEDROCK_ENDPOINT`: provider endpoint override
//! - `AWS_BEARER_TOKEN_BEDROCK`: provider credentials
//! - `CONFAB_STREAM_MODEL`, `CONFAB_INVOKE_MODEL`, `CONFAB_EMBED_MODEL`:
//!   model ids
//! - `CONFAB_INDEX_HOST`, `CONFAB_INDEX_API_KEY`: vector index; unset
//!   disables context augmentation
//! - `RUST_LOG`: log level (trace, debug, info, warn, error)
//!
//! # Signals
//!
//! SIGTERM/SIGINT trigger a graceful shutdown.

use std::net::SocketAddr;

use clap::Parser;
use tokio::signal;
use tracing::info;

use confab_core::{BedrockProvider, ContextRetriever, Relay, RelayConfig};
use confab_daemon::router;

/// Confab relay daemon
#[derive(Debug, Parser)]
#[command(name = "confab-daemon", version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "CONFAB_BIND", default_value = "127.0.0.1:3000")]
    bind: SocketAddr,
}

/// Resolve when a shutdown signal arrives
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("confab_daemon=info".parse()?)
                .add_directive("confab_core=info".parse()?),
        )
        .with_target(true)
        .init();

    let args = Args::parse();

    info!("Starting Confab Daemon");
    info!("PID: {}", std::process::id());

    let provider = BedrockProvider::from_env();
    let retriever = ContextRetriever::from_env();
    let config = RelayConfig::from_env();

    info!(
        streaming = config.streaming,
        retrieval = retriever.is_some(),
        "Relay configured"
    );

    let relay = Relay::new(provider, config).with_retriever(retriever);

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    info!(addr = %args.bind, "Listening for connections");

    axum::serve(listener, router(relay))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Confab daemon stopped cleanly");
    Ok(())
}
