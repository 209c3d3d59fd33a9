//! # credtrust-api: Credential Trust & Verification Service
//!
//! Axum service that lets anyone check whether a learner's credential is
//! anchored on an external ledger, lets issuers revoke credentials, and
//! produces scannable verification artifacts.
//!
//! ## API Surface
//!
//! | Path | Module | Purpose |
//! |------|--------|---------|
//! | `/credentials/*` | [`routes::credentials`] | Registration, reads, anchoring, revocation, artifacts |
//! | `/users/:id/credentials` | [`routes::credentials`] | Public listing per owner |
//! | `/verify/:id` | [`routes::verify`] | Public verification page |
//! | `/health/*` | this module | Probes and counters |
//! | `/openapi.json` | [`openapi`] | API document |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware → Handler → CredentialService
//! ```
//!
//! Rate limiting is not a layer: [`orchestrator::CredentialService`] applies
//! it per operation class, before authorization.

pub mod artifact;
pub mod auth;
pub mod config;
pub mod connections;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod orchestrator;
pub mod revocation;
pub mod routes;
pub mod state;
pub mod store;
pub mod verifier;

use axum::extract::State;
use axum::middleware::from_fn;
use axum::routing::get;
use axum::{Json, Router};

use crate::middleware::metrics::MetricsSnapshot;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes (`/health/*`) are mounted outside the auth middleware
/// so they remain accessible without a session.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::credentials::router())
        .merge(routes::verify::router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(middleware::tracing_layer::layer())
        .layer(axum::Extension(state.auth.clone()))
        .layer(axum::Extension(state.metrics.clone()))
        .layer(axum::Extension(extractors::TrustedProxies(
            state.config.trusted_proxy_hops,
        )))
        .with_state(state.clone());

    let health = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/health/metrics", get(metrics))
        .with_state(state);

    Router::new().merge(health).merge(api)
}

/// Always 200 while the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// 200 once the router is built. Hydration runs before serving starts, so
/// there is no warm-up phase to report.
async fn readiness() -> &'static str {
    "ready"
}

async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
