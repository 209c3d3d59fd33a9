//! # credtrust-api: Binary Entry Point
//!
//! Starts the Axum HTTP server. Binds to `PORT` (default 8080).

use std::net::SocketAddr;
use std::sync::Arc;

use credtrust_api::config::AppConfig;
use credtrust_api::state::AppState;
use credtrust_ledger::config::ConfigError as LedgerConfigError;
use credtrust_ledger::{LedgerClient, LedgerConfig, LedgerOracle};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!("Invalid configuration: {e}");
        e
    })?;
    tracing::info!(?config, "configuration loaded");

    // Absent DATABASE_URL means in-memory only.
    let db_pool = credtrust_api::db::init_pool().await.map_err(|e| {
        tracing::error!("Database initialization failed: {e}");
        e
    })?;

    let oracle: Option<Arc<dyn LedgerOracle>> = match LedgerConfig::from_env() {
        Ok(ledger_config) => {
            let client = LedgerClient::new(ledger_config).map_err(|e| {
                tracing::error!("Failed to create ledger client: {e}");
                e
            })?;
            tracing::info!(ledger_id = client.ledger_id(), "ledger oracle configured");
            Some(Arc::new(client))
        }
        Err(LedgerConfigError::MissingUrl) => {
            tracing::warn!(
                "Ledger oracle not configured: LEDGER_URL is unset. Checks will report \
                 verification_error and anchoring will return 503."
            );
            None
        }
        Err(e) => {
            tracing::error!("Invalid ledger configuration: {e}");
            return Err(e.into());
        }
    };

    let port = config.port;
    let sweep_interval = config.sweep_interval;
    let state = AppState::new(config, oracle, db_pool);

    state.hydrate_from_db().await.map_err(|e| {
        tracing::error!("Database hydration failed: {e}");
        e
    })?;

    let sweeper = state.limiter.spawn_sweeper(sweep_interval);
    let app = credtrust_api::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("credtrust API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.shutdown().await;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
    }
}
