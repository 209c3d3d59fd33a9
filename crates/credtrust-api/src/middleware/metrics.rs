//! # Request Metrics
//!
//! Lightweight request metrics using atomic counters, served as JSON at
//! `/health/metrics`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use serde::Serialize;
use utoipa::ToSchema;

/// Shared metrics state.
#[derive(Debug, Clone, Default)]
pub struct ApiMetrics {
    request_count: Arc<AtomicU64>,
    error_count: Arc<AtomicU64>,
    rate_limited_count: Arc<AtomicU64>,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub errors: u64,
    pub rate_limited: u64,
}

impl ApiMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Responses with a 4xx or 5xx status.
    pub fn errors(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Responses with status 429.
    pub fn rate_limited(&self) -> u64 {
        self.rate_limited_count.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests(),
            errors: self.errors(),
            rate_limited: self.rate_limited(),
        }
    }

    fn record(&self, status: StatusCode) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        if status.is_client_error() || status.is_server_error() {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            self.rate_limited_count.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Middleware that counts every response by status class.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        m.record(response.status());
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_status_class() {
        let m = ApiMetrics::new();
        m.record(StatusCode::OK);
        m.record(StatusCode::NOT_FOUND);
        m.record(StatusCode::TOO_MANY_REQUESTS);
        m.record(StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            m.snapshot(),
            MetricsSnapshot {
                requests: 4,
                errors: 3,
                rate_limited: 1,
            }
        );
    }

    #[test]
    fn clones_share_counters() {
        let m = ApiMetrics::new();
        m.clone().record(StatusCode::OK);
        assert_eq!(m.requests(), 1);
    }
}
