//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps store, state machine and validation errors to HTTP status codes
//! with a JSON body of the form `{"error": {"code", "message"}}`.
//! Internal and ledger diagnostics are logged, never returned.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use credtrust_core::{TransitionError, ValidationError};

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "RATE_LIMITED").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// No valid session presented (401).
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Authenticated but lacking the required role or ownership (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Write-once field collision or unique constraint violation (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Status change not permitted by the anchor state machine (409).
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Quota exceeded (429). Carries whole seconds until the window resets.
    #[error("rate limit exceeded, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Ledger oracle unreachable or erroring (503). Message is logged only.
    #[error("verification unavailable: {0}")]
    VerificationUnavailable(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::InvalidTransition(_) => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
            Self::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
            Self::VerificationUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "VERIFICATION_UNAVAILABLE")
            }
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(detail) => {
                tracing::error!(error = %detail, "internal server error");
                "An internal error occurred".to_string()
            }
            Self::VerificationUnavailable(detail) => {
                tracing::warn!(error = %detail, "ledger verification unavailable");
                "The integrity ledger could not be reached".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let Self::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        Self::InvalidTransition(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credtrust_core::AnchorStatus;
    use http_body_util::BodyExt;

    #[test]
    fn status_codes() {
        let cases = [
            (AppError::Unauthenticated("x".into()), StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            (AppError::Forbidden("x".into()), StatusCode::FORBIDDEN, "FORBIDDEN"),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT, "CONFLICT"),
            (AppError::InvalidTransition("x".into()), StatusCode::CONFLICT, "INVALID_TRANSITION"),
            (AppError::RateLimited { retry_after_secs: 3 }, StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
            (AppError::VerificationUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE, "VERIFICATION_UNAVAILABLE"),
            (AppError::Validation("x".into()), StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_and_code(), (status, code), "{err:?}");
        }
    }

    #[test]
    fn transition_error_converts_to_invalid_transition() {
        let err = AppError::from(TransitionError {
            from: AnchorStatus::Revoked,
            to: AnchorStatus::Anchored,
        });
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[test]
    fn validation_error_converts() {
        let err = AppError::from(ValidationError::EmptyField("title"));
        match err {
            AppError::Validation(msg) => assert!(msg.contains("title"), "got: {msg}"),
            other => panic!("expected Validation, got: {other:?}"),
        }
    }

    /// Helper to extract status, headers and body from a Response.
    async fn response_parts(err: AppError) -> (StatusCode, axum::http::HeaderMap, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        (status, headers, body)
    }

    #[tokio::test]
    async fn into_response_rate_limited_sets_retry_after() {
        let (status, headers, body) =
            response_parts(AppError::RateLimited { retry_after_secs: 42 }).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body.error.code, "RATE_LIMITED");
        assert_eq!(headers.get(header::RETRY_AFTER).unwrap(), "42");
    }

    #[tokio::test]
    async fn into_response_internal_hides_details() {
        let (status, _, body) =
            response_parts(AppError::Internal("db connection failed".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.error.message.contains("db connection"));
        assert_eq!(body.error.message, "An internal error occurred");
    }

    #[tokio::test]
    async fn into_response_verification_unavailable_hides_ledger_detail() {
        let (status, _, body) = response_parts(AppError::VerificationUnavailable(
            "connection refused to 10.0.0.7".into(),
        ))
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!body.error.message.contains("10.0.0.7"));
    }

    #[tokio::test]
    async fn into_response_not_found_keeps_message() {
        let (status, headers, body) =
            response_parts(AppError::NotFound("credential abc".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.error.message.contains("credential abc"));
        assert!(headers.get(header::RETRY_AFTER).is_none());
    }
}
