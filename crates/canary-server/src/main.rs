mod config;
mod logging;
mod tls;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use axum::serve::ListenerExt;
use clap::Parser;
use tracing::{info, warn};

use canary_api::{AppState, AppStateInner};
use canary_core::CanaryCore;
use canary_db::Database;

use crate::config::{Args, ServerConfig};

const ADMIN_USERNAME: &str = "admin";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let (config, ignored) = ServerConfig::load(&args)?;
    logging::init(&config)?;

    info!("Canary server {}", env!("CARGO_PKG_VERSION"));
    for key in ignored {
        warn!("Ignoring unknown config key '{}'", key);
    }
    if config.database == canary_db::IN_MEMORY {
        warn!("Using an in-memory database, everything is lost on exit");
    }

    let db = Arc::new(Database::open(Path::new(&config.database))?);
    let core = CanaryCore::new(db.clone(), &config.core_settings())?;

    if config.no_registration {
        info!("Registration is closed");
        if let Some(password) = core.sessions().bootstrap_admin(ADMIN_USERNAME)? {
            warn!(
                "Created account {}:{} - change this password after logging in",
                ADMIN_USERNAME, password
            );
        }
    }

    let state: AppState = Arc::new(AppStateInner { core });
    let app = canary_api::router(state.clone(), &config.base_path);

    let addr: SocketAddr = config
        .listener
        .parse()
        .with_context(|| format!("Invalid listen address '{}'", config.listener))?;
    let tls_config = match config.tls_files()? {
        Some((cert, key)) => Some(tls::load_server_config(cert, key)?),
        None => None,
    };
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let scheme = if tls_config.is_some() { "https" } else { "http" };
    info!("Canary server listening on {}://{}{}", scheme, addr, config.base_path);
    info!("Tokens expire after {}s", config.token_expiration.as_secs());

    let service = app.into_make_service_with_connect_info::<SocketAddr>();
    let served = match tls_config {
        Some(tls_config) => {
            // Wrapped so `ConnectInfo<SocketAddr>` is available for a custom listener.
            let listener = tls::TlsListener::new(listener, tls_config)?.tap_io(|_| {});
            axum::serve(listener, service)
                .with_graceful_shutdown(shutdown_signal())
                .await
        }
        None => {
            axum::serve(listener, service)
                .with_graceful_shutdown(shutdown_signal())
                .await
        }
    };

    // The sweeper must be gone before the store closes.
    state.core.shutdown().await;
    drop(state);
    match Arc::into_inner(db) {
        Some(db) => db.close()?,
        None => warn!("Database still in use at exit, leaving it to drop"),
    }

    served?;
    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
