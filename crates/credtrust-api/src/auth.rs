//! # Authorization Gate
//!
//! Resolves the caller's [`AuthorizationContext`] from an HS256 session JWT
//! and provides the capability checks handlers call before mutating
//! anything.
//!
//! ## Token Format
//!
//! ```text
//! Authorization: Bearer <jwt>
//! claims: { "sub": "<user uuid>", "role": "learner|issuer|employer", "exp": <unix>, "iat": <unix> }
//! ```
//!
//! Tokens are issued by the external identity provider, which shares the
//! signing secret (`SESSION_SECRET`) with this service.
//!
//! ## Resolution Rules
//!
//! The middleware never rejects a request. A valid token yields a typed
//! context; a missing or invalid token yields the anonymous context, and
//! invalid tokens are logged. Operations that need a session call
//! [`require_authenticated`], which produces the 401.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use zeroize::Zeroizing;

use credtrust_core::UserId;

use crate::error::AppError;

// ── Role ────────────────────────────────────────────────────────────────────

/// Closed set of roles. There is no hierarchy: checks compare for equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Owns credentials.
    Learner,
    /// May register credentials on behalf of learners and revoke.
    Issuer,
    /// Reads credentials.
    Employer,
    /// No valid session.
    Unauthenticated,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Learner => "learner",
            Self::Issuer => "issuer",
            Self::Employer => "employer",
            Self::Unauthenticated => "unauthenticated",
        }
    }
}

// ── AuthorizationContext ────────────────────────────────────────────────────

/// Per-request identity. Built fresh for each request, never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationContext {
    /// Authenticated user, `None` for anonymous callers.
    pub subject: Option<UserId>,
    pub role: Role,
    /// Session expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthorizationContext {
    /// The context for callers without a valid session.
    pub fn anonymous() -> Self {
        Self {
            subject: None,
            role: Role::Unauthenticated,
            expires_at: None,
        }
    }

    /// A context for a signed-in user.
    pub fn user(subject: UserId, role: Role, expires_at: DateTime<Utc>) -> Self {
        Self {
            subject: Some(subject),
            role,
            expires_at: Some(expires_at),
        }
    }

    /// Whether this context carries a subject whose session has not expired at `now`.
    pub fn is_authenticated_at(&self, now: DateTime<Utc>) -> bool {
        self.subject.is_some()
            && self.role != Role::Unauthenticated
            && self.expires_at.is_some_and(|exp| exp > now)
    }
}

/// Extracts the context the auth middleware injected. Falls back to the
/// anonymous context, so extraction never fails.
#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for AuthorizationContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<AuthorizationContext>()
            .cloned()
            .unwrap_or_else(AuthorizationContext::anonymous))
    }
}

// ── Capability checks ───────────────────────────────────────────────────────

/// Require a live session. Returns the subject.
pub fn require_authenticated(ctx: &AuthorizationContext) -> Result<UserId, AppError> {
    match ctx.subject {
        Some(subject) if ctx.is_authenticated_at(Utc::now()) => Ok(subject),
        Some(_) => Err(AppError::Unauthenticated("session expired".into())),
        None => Err(AppError::Unauthenticated("no valid session".into())),
    }
}

/// Require exactly `required`.
pub fn authorize_role(ctx: &AuthorizationContext, required: Role) -> Result<(), AppError> {
    if ctx.role == required {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "role '{}' required, caller has '{}'",
            required.as_str(),
            ctx.role.as_str()
        )))
    }
}

/// Require one of `roles`.
pub fn require_any_role(ctx: &AuthorizationContext, roles: &[Role]) -> Result<(), AppError> {
    if roles.contains(&ctx.role) {
        Ok(())
    } else {
        let names: Vec<&str> = roles.iter().map(Role::as_str).collect();
        Err(AppError::Forbidden(format!(
            "one of roles [{}] required, caller has '{}'",
            names.join(", "),
            ctx.role.as_str()
        )))
    }
}

/// Require the caller to be `owner`.
pub fn require_owner(ctx: &AuthorizationContext, owner: &UserId) -> Result<(), AppError> {
    if ctx.subject.as_ref() == Some(owner) {
        Ok(())
    } else {
        Err(AppError::Forbidden("only the credential owner may do this".into()))
    }
}

// ── Session tokens ──────────────────────────────────────────────────────────

/// JWT claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

/// Signing and verification keys derived from the shared session secret.
///
/// Custom `Debug` prints no key material.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("algorithm", &"HS256")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl SessionKeys {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Build keys from a zeroizing secret.
    pub fn from_secret(secret: &Zeroizing<String>) -> Self {
        Self::new(secret.as_bytes())
    }

    /// Issue a session token valid for `ttl`.
    pub fn mint(&self, subject: UserId, role: Role, ttl: Duration) -> Result<String, AppError> {
        if role == Role::Unauthenticated {
            return Err(AppError::BadRequest("cannot mint an unauthenticated session".into()));
        }
        let now = Utc::now();
        let claims = SessionClaims {
            sub: subject.to_string(),
            role,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("failed to sign session token: {e}")))
    }

    /// Verify a token and build the context it asserts.
    pub fn verify(&self, token: &str) -> Result<AuthorizationContext, String> {
        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| e.to_string())?;
        let claims = data.claims;

        if claims.role == Role::Unauthenticated {
            return Err("token asserts the unauthenticated role".into());
        }
        let subject: UserId = claims
            .sub
            .parse()
            .map_err(|e| format!("invalid subject: {e}"))?;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| "invalid exp claim".to_string())?;

        Ok(AuthorizationContext::user(subject, claims.role, expires_at))
    }
}

/// Auth configuration injected into request extensions. `None` keys mean
/// sessions are not configured and every request is anonymous.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub keys: Option<Arc<SessionKeys>>,
}

/// Resolve the context for a request's headers.
pub fn authenticate(headers: &HeaderMap, keys: Option<&SessionKeys>) -> AuthorizationContext {
    let Some(header_value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    else {
        return AuthorizationContext::anonymous();
    };

    let Some(token) = header_value.strip_prefix("Bearer ") else {
        tracing::warn!("ignoring non-Bearer authorization header");
        return AuthorizationContext::anonymous();
    };

    let Some(keys) = keys else {
        tracing::warn!("bearer token presented but sessions are not configured");
        return AuthorizationContext::anonymous();
    };

    match keys.verify(token.trim()) {
        Ok(ctx) => ctx,
        Err(reason) => {
            tracing::warn!(%reason, "invalid session token, treating caller as anonymous");
            AuthorizationContext::anonymous()
        }
    }
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Resolve the caller's context and inject it into request extensions.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let config = request
        .extensions()
        .get::<AuthConfig>()
        .cloned()
        .unwrap_or_default();

    let ctx = authenticate(request.headers(), config.keys.as_deref());
    request.extensions_mut().insert(ctx);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::middleware::from_fn;
    use axum::routing::get;
    use axum::Router;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const SECRET: &[u8] = b"test-session-secret";

    async fn whoami(ctx: AuthorizationContext) -> String {
        format!(
            "{}:{}",
            ctx.role.as_str(),
            ctx.subject.map(|s| s.to_string()).unwrap_or_default()
        )
    }

    /// Build a minimal router with the auth middleware and a handler that echoes the context.
    fn test_app(keys: Option<SessionKeys>) -> Router {
        let auth_config = AuthConfig {
            keys: keys.map(Arc::new),
        };
        Router::new()
            .route("/whoami", get(whoami))
            .layer(from_fn(auth_middleware))
            .layer(axum::Extension(auth_config))
    }

    async fn call(app: Router, auth: Option<&str>) -> (StatusCode, String) {
        let mut builder = Request::builder().uri("/whoami");
        if let Some(value) = auth {
            builder = builder.header("Authorization", value);
        }
        let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn valid_token_yields_typed_context() {
        let keys = SessionKeys::new(SECRET);
        let user = UserId::new();
        let token = keys.mint(user, Role::Issuer, Duration::minutes(5)).unwrap();

        let (status, body) = call(test_app(Some(keys)), Some(&format!("Bearer {token}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, format!("issuer:{user}"));
    }

    #[tokio::test]
    async fn missing_header_is_anonymous_not_rejected() {
        let (status, body) = call(test_app(Some(SessionKeys::new(SECRET))), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "unauthenticated:");
    }

    #[tokio::test]
    async fn invalid_token_is_anonymous() {
        let (status, body) = call(
            test_app(Some(SessionKeys::new(SECRET))),
            Some("Bearer not-a-jwt"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "unauthenticated:");
    }

    #[tokio::test]
    async fn token_signed_with_other_secret_is_anonymous() {
        let forged = SessionKeys::new(b"other-secret")
            .mint(UserId::new(), Role::Issuer, Duration::minutes(5))
            .unwrap();
        let (_, body) = call(
            test_app(Some(SessionKeys::new(SECRET))),
            Some(&format!("Bearer {forged}")),
        )
        .await;
        assert_eq!(body, "unauthenticated:");
    }

    #[tokio::test]
    async fn expired_token_is_anonymous() {
        let keys = SessionKeys::new(SECRET);
        let token = keys
            .mint(UserId::new(), Role::Learner, Duration::seconds(-30))
            .unwrap();
        let (_, body) = call(test_app(Some(keys)), Some(&format!("Bearer {token}"))).await;
        assert_eq!(body, "unauthenticated:");
    }

    #[tokio::test]
    async fn sessions_not_configured_means_anonymous() {
        let token = SessionKeys::new(SECRET)
            .mint(UserId::new(), Role::Learner, Duration::minutes(5))
            .unwrap();
        let (_, body) = call(test_app(None), Some(&format!("Bearer {token}"))).await;
        assert_eq!(body, "unauthenticated:");
    }

    #[test]
    fn cannot_mint_unauthenticated_role() {
        let keys = SessionKeys::new(SECRET);
        assert!(keys
            .mint(UserId::new(), Role::Unauthenticated, Duration::minutes(5))
            .is_err());
    }

    #[test]
    fn authorize_role_is_exact_match() {
        let learner = AuthorizationContext::user(
            UserId::new(),
            Role::Learner,
            Utc::now() + Duration::minutes(5),
        );
        assert!(matches!(
            authorize_role(&learner, Role::Issuer),
            Err(AppError::Forbidden(_))
        ));
        assert!(authorize_role(&learner, Role::Learner).is_ok());
        assert!(matches!(
            authorize_role(&AuthorizationContext::anonymous(), Role::Issuer),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn require_authenticated_rejects_anonymous_and_expired() {
        assert!(matches!(
            require_authenticated(&AuthorizationContext::anonymous()),
            Err(AppError::Unauthenticated(_))
        ));

        let expired = AuthorizationContext::user(
            UserId::new(),
            Role::Learner,
            Utc::now() - Duration::seconds(1),
        );
        assert!(matches!(
            require_authenticated(&expired),
            Err(AppError::Unauthenticated(_))
        ));

        let user = UserId::new();
        let live = AuthorizationContext::user(user, Role::Learner, Utc::now() + Duration::hours(1));
        assert_eq!(require_authenticated(&live).unwrap(), user);
    }

    #[test]
    fn require_owner_compares_subject() {
        let owner = UserId::new();
        let exp = Utc::now() + Duration::hours(1);
        assert!(require_owner(&AuthorizationContext::user(owner, Role::Learner, exp), &owner).is_ok());
        assert!(require_owner(
            &AuthorizationContext::user(UserId::new(), Role::Learner, exp),
            &owner
        )
        .is_err());
        assert!(require_owner(&AuthorizationContext::anonymous(), &owner).is_err());
    }

    #[test]
    fn require_any_role_lists_roles() {
        let employer = AuthorizationContext::user(
            UserId::new(),
            Role::Employer,
            Utc::now() + Duration::hours(1),
        );
        match require_any_role(&employer, &[Role::Learner, Role::Issuer]) {
            Err(AppError::Forbidden(msg)) => assert!(msg.contains("learner, issuer"), "{msg}"),
            other => panic!("expected Forbidden, got {other:?}"),
        }
    }

    #[test]
    fn debug_redacts_secret() {
        let printed = format!("{:?}", SessionKeys::new(b"very-secret-value"));
        assert!(!printed.contains("very-secret-value"));
        assert!(printed.contains("[REDACTED]"));
    }
}
