//! # Custom Extractors
//!
//! Provides a helper to extract JSON bodies with a uniform 400, and the
//! [`Caller`] extractor that pairs the session context with the client
//! identity used for throttling.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::Json;

use crate::auth::AuthorizationContext;
use crate::error::AppError;
use crate::orchestrator::Caller;

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
///
/// ```ignore
/// async fn handler(body: Result<Json<T>, JsonRejection>) -> Result<..., AppError> {
///     let req = extract_json(body)?;
/// }
/// ```
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Number of reverse proxies in front of the service that append to
/// `X-Forwarded-For`. Installed as a request extension by [`crate::app`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrustedProxies(pub usize);

/// Client identity used for throttling.
///
/// With no trusted proxies the peer address is authoritative and
/// `X-Forwarded-For` is ignored, since the client controls it. Behind `n`
/// trusted proxies the client is the `n`-th hop from the right: every hop to
/// its left was supplied by the caller. A chain shorter than `n` means the
/// request did not pass through the proxies, so the peer address is used.
fn client_id(parts: &Parts) -> String {
    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    let TrustedProxies(trusted) = parts
        .extensions
        .get::<TrustedProxies>()
        .copied()
        .unwrap_or_default();

    if trusted > 0 {
        let hops: Vec<&str> = parts
            .headers
            .get_all("x-forwarded-for")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect();
        if let Some(hop) = hops.iter().rev().nth(trusted - 1) {
            return (*hop).to_string();
        }
    }

    peer.unwrap_or_else(|| "anonymous".to_string())
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ctx = AuthorizationContext::from_request_parts(parts, state).await?;
        Ok(Caller::new(ctx, client_id(parts)))
    }
}
