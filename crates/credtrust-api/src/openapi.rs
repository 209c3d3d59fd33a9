//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI document
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Credential Trust API",
        version = "0.1.0",
        description = "Ledger anchoring, public verification, role-gated revocation, and verification artifacts for learner credentials.",
        license(name = "BUSL-1.1")
    ),
    paths(
        crate::routes::credentials::register_credential,
        crate::routes::credentials::get_credential,
        crate::routes::credentials::delete_credential,
        crate::routes::credentials::check_anchor,
        crate::routes::credentials::anchor_credential,
        crate::routes::credentials::revoke_credential,
        crate::routes::credentials::generate_artifact,
        crate::routes::credentials::list_user_credentials,
        crate::routes::verify::verification_page,
    ),
    components(schemas(
        crate::orchestrator::CredentialView,
        crate::orchestrator::ViewerRelationship,
        crate::orchestrator::VerificationPage,
        crate::routes::credentials::RegisterCredentialRequest,
        crate::routes::credentials::AnchorRequest,
        crate::verifier::VerificationOutcome,
        crate::verifier::VerificationReason,
        crate::artifact::ArtifactResponse,
        crate::middleware::metrics::MetricsSnapshot,
        crate::auth::Role,
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "credentials", description = "Credential registration and public reads"),
        (name = "verification", description = "Ledger anchoring, revocation, and artifacts"),
    )
)]
pub struct ApiDoc;

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/credentials",
            "/credentials/{id}",
            "/credentials/{id}/anchor",
            "/credentials/{id}/revoke",
            "/credentials/{id}/artifact",
            "/users/{id}/credentials",
            "/verify/{id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn serializes_to_json() {
        let json = serde_json::to_value(ApiDoc::openapi()).unwrap();
        assert_eq!(json["info"]["title"], "Credential Trust API");
    }
}
