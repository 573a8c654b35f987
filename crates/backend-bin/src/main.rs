// ============================
// keystone-server/src/main.rs
// ============================
//! Tokio / Axum entry-point for the Keystone auth server.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use keystone_backend::{config::Settings, create_router, AppState};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Credential and session server
#[derive(Parser, Debug)]
#[command(name = "keystone", version, about)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "KEYSTONE_CONFIG")]
    config: Option<PathBuf>,
}

fn init_tracing(settings: &Settings) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.as_str()));
    let registry = tracing_subscriber::registry().with(filter);

    if settings.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let settings = match &args.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .context("failed to load configuration")?;

    init_tracing(&settings);

    if !settings.oauth.is_configured() {
        tracing::warn!("Google client credentials missing, OAuth login disabled");
    }

    let addr = settings.bind_addr;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        service = %settings.service_name,
        mode = ?settings.mode,
        "starting keystone"
    );

    let state = Arc::new(AppState::in_memory(settings).context("failed to build application state")?);
    let app = create_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}
