//! # azadi-rs
//!
//! Self-hosted DNS-over-HTTPS relay with a password-gated settings panel.
//!
//! Forwards DoH wire-format queries (`/dns-query`) to a configurable upstream
//! resolver and serves a small admin panel for changing that upstream.
//!
//! ## Architecture
//!
//! - **Store**: TOML-file-backed key-value settings store (upstream address,
//!   password record, session token), injected into the HTTP layer
//! - **Upstream**: resolves the current DoH target, degrading to a default
//! - **Auth**: salted password hashing and a single global session cookie
//! - **HTTP**: Axum router with request IDs, tracing, and graceful shutdown

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

mod auth;
mod config;
mod http;
mod store;
mod upstream;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::serve;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, Cli};
use crate::http::{router, AppState};
use crate::store::{FileStore, SettingsStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging().context("failed to initialize logging")?;

    let cli = Cli::parse();
    let config = AppConfig::from_cli(cli).context("failed to load configuration")?;
    info!(
        bind = %config.bind,
        data_dir = %config.data_dir.display(),
        default_upstream = %config.default_upstream,
        "configuration loaded"
    );

    // A broken data directory degrades to "store not configured": the server
    // still starts and answers every request with the store-error page.
    let settings: Option<Arc<dyn SettingsStore>> = match FileStore::open(&config.data_dir) {
        Ok(file_store) => Some(Arc::new(file_store)),
        Err(err) => {
            error!(
                data_dir = %config.data_dir.display(),
                error = %err,
                "settings store unavailable; serving configuration error page"
            );
            None
        }
    };

    let http_client = reqwest::Client::builder()
        .user_agent(concat!("azadi-rs/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build upstream HTTP client")?;

    let state = AppState {
        settings,
        http: http_client,
        default_upstream: config.default_upstream,
    };

    let app = router(state);
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    if config.bind.ip().is_loopback() {
        tracing::warn!(
            bind = %config.bind,
            "binding to loopback; use --bind 0.0.0.0:8453 for LAN access"
        );
    }

    let shutdown = tokio::signal::ctrl_c();
    info!(bind = %config.bind, "azadi-rs listening");

    serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = shutdown.await;
        info!("shutting down gracefully");
    })
    .await
    .context("server exited with error")
}

/// Initialize tracing subscriber with `RUST_LOG` env filter (default: `info`).
fn init_logging() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}
