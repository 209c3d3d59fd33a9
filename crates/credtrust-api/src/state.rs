//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor. Every field is a cheap handle to shared
//! interior state, so cloning `AppState` per request is free.

use std::sync::Arc;

use sqlx::PgPool;

use credtrust_ledger::LedgerOracle;

use crate::artifact::{ArtifactEncoder, ArtifactGenerator, QrSvgEncoder};
use crate::auth::{AuthConfig, SessionKeys};
use crate::config::{AppConfig, ArtifactEncoding};
use crate::connections::ConnectionDirectory;
use crate::middleware::metrics::ApiMetrics;
use crate::middleware::rate_limit::RateLimiter;
use crate::orchestrator::CredentialService;
use crate::store::CredentialStore;
use crate::verifier::AnchoringVerifier;

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: CredentialStore,
    pub connections: ConnectionDirectory,
    pub limiter: RateLimiter,
    pub metrics: ApiMetrics,
    pub auth: AuthConfig,
    pub service: CredentialService,
    /// Present when `DATABASE_URL` was configured.
    pub db_pool: Option<PgPool>,
}

impl AppState {
    /// Wire the components together. `oracle` is `None` when no ledger is
    /// configured. Verification then reports `verification_error`
    /// and anchoring answers 503.
    pub fn new(
        config: AppConfig,
        oracle: Option<Arc<dyn LedgerOracle>>,
        db_pool: Option<PgPool>,
    ) -> Self {
        let store = CredentialStore::with_pool(db_pool.clone());
        let connections = ConnectionDirectory::new();
        let limiter = RateLimiter::new();

        let encoder: Option<Arc<dyn ArtifactEncoder>> = match config.artifact_encoding {
            ArtifactEncoding::Qr => Some(Arc::new(QrSvgEncoder)),
            ArtifactEncoding::Off => None,
        };

        let service = CredentialService::new(
            store.clone(),
            limiter.clone(),
            config.rate_limits.clone(),
            AnchoringVerifier::new(store.clone(), oracle, config.ledger_timeout),
            ArtifactGenerator::new(store.clone(), &config.public_base_url, encoder),
            connections.clone(),
        );

        let auth = AuthConfig {
            keys: config
                .session_secret
                .as_ref()
                .map(|secret| Arc::new(SessionKeys::from_secret(secret))),
        };

        Self {
            config: Arc::new(config),
            store,
            connections,
            limiter,
            metrics: ApiMetrics::new(),
            auth,
            service,
            db_pool,
        }
    }

    /// Load credentials and connections from the database, if one is configured.
    pub async fn hydrate_from_db(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let Some(pool) = &self.db_pool else {
            return Ok(());
        };
        let credentials = self.store.hydrate().await?;
        let connections = self.connections.hydrate(pool).await?;
        tracing::info!(credentials, connections, "hydrated state from database");
        Ok(())
    }
}
