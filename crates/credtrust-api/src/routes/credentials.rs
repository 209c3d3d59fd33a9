//! # Credential Endpoints
//!
//! - `POST /credentials` registers a credential.
//! - `GET /credentials/:id` fetches a public credential.
//! - `DELETE /credentials/:id` removes a credential (owner only).
//! - `GET /credentials/:id/anchor` checks the ledger anchor.
//! - `POST /credentials/:id/anchor` records a ledger-confirmed anchor.
//! - `POST /credentials/:id/revoke` revokes (issuer only).
//! - `GET|POST /credentials/:id/artifact` returns the verification artifact (owner only).
//! - `GET /users/:id/credentials` lists an owner's public credentials.
//!
//! Handlers only translate HTTP to [`CredentialService`] calls.
//!
//! [`CredentialService`]: crate::orchestrator::CredentialService

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use credtrust_core::{CredentialId, CredentialType, SkillId, UserId, Visibility};

use crate::artifact::ArtifactResponse;
use crate::error::AppError;
use crate::extractors::extract_json;
use crate::orchestrator::{Caller, CredentialDraft, CredentialView};
use crate::state::AppState;
use crate::verifier::VerificationOutcome;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request body for registering a credential.
///
/// Field rules (lengths, skill count, date order) live on
/// [`credtrust_core::NewCredential`] and surface as 422.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCredentialRequest {
    /// Owner of the credential. Required for issuers; learners may omit it.
    #[schema(value_type = Option<String>, format = Uuid)]
    pub owner_id: Option<UserId>,
    pub title: String,
    pub issuer_name: String,
    #[schema(value_type = String, example = "certification")]
    pub credential_type: CredentialType,
    pub issue_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "public")]
    pub visibility: Visibility,
    #[serde(default)]
    #[schema(value_type = Vec<String>)]
    pub skills: Vec<SkillId>,
}

/// Request body for recording a ledger anchor.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AnchorRequest {
    /// Ledger reference, typically a transaction hash.
    pub reference: String,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/credentials", post(register_credential))
        .route(
            "/credentials/:id",
            get(get_credential).delete(delete_credential),
        )
        .route(
            "/credentials/:id/anchor",
            get(check_anchor).post(anchor_credential),
        )
        .route("/credentials/:id/revoke", post(revoke_credential))
        .route(
            "/credentials/:id/artifact",
            get(generate_artifact).post(generate_artifact),
        )
        .route("/users/:id/credentials", get(list_user_credentials))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Register a credential: `POST /credentials`.
#[utoipa::path(
    post,
    path = "/credentials",
    request_body = RegisterCredentialRequest,
    responses(
        (status = 201, description = "Credential registered", body = CredentialView),
        (status = 400, description = "Malformed body", body = crate::error::ErrorBody),
        (status = 401, description = "No valid session", body = crate::error::ErrorBody),
        (status = 403, description = "Role may not register", body = crate::error::ErrorBody),
        (status = 422, description = "Validation failed", body = crate::error::ErrorBody),
        (status = 429, description = "Rate limited", body = crate::error::ErrorBody),
    ),
    tag = "credentials"
)]
pub(crate) async fn register_credential(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<RegisterCredentialRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CredentialView>), AppError> {
    let req = extract_json(body)?;
    let draft = CredentialDraft {
        title: req.title.trim().to_string(),
        issuer_name: req.issuer_name.trim().to_string(),
        credential_type: req.credential_type,
        issue_date: req.issue_date,
        expiry_date: req.expiry_date,
        visibility: req.visibility,
        skills: req.skills,
    };
    let view = state
        .service
        .register_credential(req.owner_id, draft, &caller)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Fetch a public credential: `GET /credentials/:id`.
///
/// Authenticated viewers additionally get a `viewer` block describing
/// their relationship to the owner.
#[utoipa::path(
    get,
    path = "/credentials/{id}",
    params(("id" = Uuid, Path, description = "Credential ID")),
    responses(
        (status = 200, description = "Credential found", body = CredentialView),
        (status = 404, description = "Not found or private", body = crate::error::ErrorBody),
        (status = 429, description = "Rate limited", body = crate::error::ErrorBody),
    ),
    tag = "credentials"
)]
pub(crate) async fn get_credential(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<CredentialView>, AppError> {
    let view = state
        .service
        .fetch_public_credential(CredentialId::from_uuid(id), &caller)
        .await?;
    Ok(Json(view))
}

/// Remove a credential: `DELETE /credentials/:id`.
#[utoipa::path(
    delete,
    path = "/credentials/{id}",
    params(("id" = Uuid, Path, description = "Credential ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 401, description = "No valid session", body = crate::error::ErrorBody),
        (status = 403, description = "Not the owner", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "credentials"
)]
pub(crate) async fn delete_credential(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .service
        .delete_credential(CredentialId::from_uuid(id), &caller)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Check the credential against the ledger: `GET /credentials/:id/anchor`.
///
/// Ledger failures are reported as `verified: false` with reason
/// `verification_error`, never as an HTTP error.
#[utoipa::path(
    get,
    path = "/credentials/{id}/anchor",
    params(("id" = Uuid, Path, description = "Credential ID")),
    responses(
        (status = 200, description = "Verification outcome", body = VerificationOutcome),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 429, description = "Rate limited", body = crate::error::ErrorBody),
    ),
    tag = "verification"
)]
pub(crate) async fn check_anchor(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<VerificationOutcome>, AppError> {
    let outcome = state
        .service
        .check_anchor(CredentialId::from_uuid(id), &caller)
        .await?;
    Ok(Json(outcome))
}

/// Record a ledger-confirmed anchor reference: `POST /credentials/:id/anchor`.
#[utoipa::path(
    post,
    path = "/credentials/{id}/anchor",
    params(("id" = Uuid, Path, description = "Credential ID")),
    request_body = AnchorRequest,
    responses(
        (status = 200, description = "Credential anchored", body = CredentialView),
        (status = 401, description = "No valid session", body = crate::error::ErrorBody),
        (status = 403, description = "Not owner or issuer", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Already anchored elsewhere, or revoked", body = crate::error::ErrorBody),
        (status = 422, description = "Ledger does not vouch for the reference", body = crate::error::ErrorBody),
        (status = 503, description = "Ledger unavailable", body = crate::error::ErrorBody),
    ),
    tag = "verification"
)]
pub(crate) async fn anchor_credential(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    body: Result<Json<AnchorRequest>, JsonRejection>,
) -> Result<Json<CredentialView>, AppError> {
    let req = extract_json(body)?;
    let view = state
        .service
        .anchor_credential(CredentialId::from_uuid(id), &req.reference, &caller)
        .await?;
    Ok(Json(view))
}

/// Revoke a credential: `POST /credentials/:id/revoke`.
#[utoipa::path(
    post,
    path = "/credentials/{id}/revoke",
    params(("id" = Uuid, Path, description = "Credential ID")),
    responses(
        (status = 200, description = "Credential revoked", body = CredentialView),
        (status = 401, description = "No valid session", body = crate::error::ErrorBody),
        (status = 403, description = "Caller is not an issuer", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 429, description = "Rate limited", body = crate::error::ErrorBody),
    ),
    tag = "verification"
)]
pub(crate) async fn revoke_credential(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<CredentialView>, AppError> {
    let view = state
        .service
        .request_revocation(CredentialId::from_uuid(id), &caller)
        .await?;
    Ok(Json(view))
}

/// Verification link and scannable image: `GET|POST /credentials/:id/artifact`.
#[utoipa::path(
    post,
    path = "/credentials/{id}/artifact",
    params(("id" = Uuid, Path, description = "Credential ID")),
    responses(
        (status = 200, description = "Artifact generated", body = ArtifactResponse),
        (status = 401, description = "No valid session", body = crate::error::ErrorBody),
        (status = 403, description = "Not the owner", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 429, description = "Rate limited", body = crate::error::ErrorBody),
    ),
    tag = "verification"
)]
pub(crate) async fn generate_artifact(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<ArtifactResponse>, AppError> {
    let artifact = state
        .service
        .request_artifact(CredentialId::from_uuid(id), &caller)
        .await?;
    Ok(Json(artifact))
}

/// An owner's public credentials: `GET /users/:id/credentials`.
#[utoipa::path(
    get,
    path = "/users/{id}/credentials",
    params(("id" = Uuid, Path, description = "Owner user ID")),
    responses(
        (status = 200, description = "Public credentials", body = Vec<CredentialView>),
        (status = 429, description = "Rate limited", body = crate::error::ErrorBody),
    ),
    tag = "credentials"
)]
pub(crate) async fn list_user_credentials(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<CredentialView>>, AppError> {
    let views = state
        .service
        .list_public_credentials(UserId::from_uuid(id), &caller)
        .await?;
    Ok(Json(views))
}

#[cfg(test)]
mod tests {
    use super::*;
    use credtrust_core::{MAX_SKILLS, MAX_TEXT_LEN};

    fn request(title: &str) -> RegisterCredentialRequest {
        RegisterCredentialRequest {
            owner_id: None,
            title: title.to_string(),
            issuer_name: "Linux Foundation".to_string(),
            credential_type: CredentialType::Certification,
            issue_date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            expiry_date: None,
            visibility: Visibility::Public,
            skills: vec![],
        }
    }

    #[test]
    fn blank_title_is_rejected() {
        assert!(request("  ").validate().is_err());
        assert!(request("CKA").validate().is_ok());
    }

    #[test]
    fn overlong_title_is_rejected() {
        assert!(request(&"x".repeat(MAX_TEXT_LEN + 1)).validate().is_err());
    }

    #[test]
    fn expiry_before_issue_is_rejected() {
        let mut req = request("CKA");
        req.expiry_date = NaiveDate::from_ymd_opt(2024, 1, 1);
        assert!(req.validate().unwrap_err().contains("expiryDate"));
    }

    #[test]
    fn too_many_skills_is_rejected() {
        let mut req = request("CKA");
        req.skills = (0..=MAX_SKILLS).map(|_| SkillId::new()).collect();
        assert!(req.validate().is_err());
    }

    #[test]
    fn visibility_and_skills_default() {
        let req: RegisterCredentialRequest = serde_json::from_value(serde_json::json!({
            "title": "CKA",
            "issuerName": "CNCF",
            "credentialType": "certification",
            "issueDate": "2025-01-10"
        }))
        .unwrap();
        assert_eq!(req.visibility, Visibility::Public);
        assert!(req.skills.is_empty());
        assert!(req.owner_id.is_none());
    }
}
