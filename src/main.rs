use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use turnstile::config::ServerConfig;
use turnstile::http::HttpServer;
use turnstile::ratelimit::{RateLimitConfig, RateLimiter};

/// In-process request admission controller.
#[derive(Debug, Parser)]
#[command(name = "turnstile", version, about)]
struct Args {
    /// Path to the route rules file (.json, .yaml or .yml)
    #[arg(short = 'f', long = "config")]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. ":4000" or "127.0.0.1:4000"
    #[arg(short = 'p', long = "port")]
    port: Option<String>,

    /// Optional service settings file
    #[arg(long)]
    settings: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = ServerConfig::load(args.settings.as_deref())?;
    if let Some(rules_path) = args.config {
        settings.rules_path = rules_path;
    }
    if let Some(listen_addr) = args.port {
        settings.listen_addr = listen_addr;
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&settings.log_filter)?)
        .with_target(false)
        .with_thread_ids(true)
        .init();

    info!("Starting Turnstile Admission Controller");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Configuration errors are fatal; nothing is served until rules load.
    let rules = RateLimitConfig::from_file(&settings.rules_path)?;
    let addr = settings.socket_addr()?;
    info!(addr = %addr, rules = %settings.rules_path.display(), "Configuration loaded");

    let rate_limiter = Arc::new(RateLimiter::from_config(&rules));

    HttpServer::new(addr, rate_limiter)
        .serve_with_shutdown(shutdown_signal())
        .await?;

    info!("Turnstile Admission Controller stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
