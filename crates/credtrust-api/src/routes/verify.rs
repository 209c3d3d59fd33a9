//! Public verification page data, served at the URL encoded in artifacts.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use uuid::Uuid;

use credtrust_core::CredentialId;

use crate::error::AppError;
use crate::orchestrator::{Caller, VerificationPage};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/verify/:id", get(verification_page))
}

/// Credential summary plus a live ledger check: `GET /verify/:id`.
#[utoipa::path(
    get,
    path = "/verify/{id}",
    params(("id" = Uuid, Path, description = "Credential ID")),
    responses(
        (status = 200, description = "Verification page", body = VerificationPage),
        (status = 404, description = "Not found or private", body = crate::error::ErrorBody),
        (status = 429, description = "Rate limited", body = crate::error::ErrorBody),
    ),
    tag = "verification"
)]
pub(crate) async fn verification_page(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<VerificationPage>, AppError> {
    let page = state
        .service
        .verification_page(CredentialId::from_uuid(id), &caller)
        .await?;
    Ok(Json(page))
}
