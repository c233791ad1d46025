use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod domain;
mod error;
mod models;
mod repository;
mod rest;

use db::DbConnection;
use domain::BannerService;
use repository::Repository;
use rest::AppState;

/// How long in-flight requests get to drain after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load().context("failed to load config")?;
    init_tracing(&config.env);

    let db = DbConnection::new(&config.database.url)
        .await
        .context("failed to initialize database")?;
    let service = BannerService::new(Arc::new(Repository::new(db)));
    let app = rest::router(AppState::new(service));

    let listener = TcpListener::bind(&config.address)
        .await
        .with_context(|| format!("failed to bind {}", config.address))?;
    info!(address = %config.address, env = %config.env, "server is running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

fn init_tracing(env: &str) {
    let default_level = match env {
        "prod" => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolves on SIGINT or SIGTERM. Once it fires, the server stops accepting
/// and drains in-flight requests; a watchdog bounds the drain.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutting down");

    tokio::spawn(async {
        tokio::time::sleep(SHUTDOWN_GRACE).await;
        error!("graceful shutdown timed out, forcing exit");
        std::process::exit(1);
    });
}
