//! # Verification Orchestrator
//!
//! The façade every route calls. Each operation runs the same pipeline:
//!
//! ```text
//! rate limit (per action class) → authorization → delegate → normalized view
//! ```
//!
//! | Operation | Limit class | Authorization |
//! |-----------|-------------|---------------|
//! | `fetch_public_credential` | read | none |
//! | `list_public_credentials` | read | none |
//! | `check_anchor` | ledger_query | none |
//! | `verification_page` | ledger_query | none |
//! | `register_credential` | write | learner (self) or issuer |
//! | `anchor_credential` | write | owner or issuer |
//! | `request_revocation` | write | issuer |
//! | `request_artifact` | write | owner |
//! | `delete_credential` | write | owner |
//!
//! Public reads never look at the caller's role. An authenticated viewer
//! only adds relationship metadata to the response; it never changes what
//! is visible.

use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use credtrust_core::{
    AnchorStatus, Credential, CredentialId, CredentialType, NewCredential, SkillId,
    TransitionError, UserId, Visibility,
};

use crate::artifact::{ArtifactGenerator, ArtifactResponse};
use crate::auth::{
    authorize_role, require_any_role, require_authenticated, require_owner,
    AuthorizationContext, Role,
};
use crate::connections::ConnectionDirectory;
use crate::error::AppError;
use crate::middleware::rate_limit::{RateLimitAction, RateLimitConfig, RateLimiter};
use crate::revocation::RevocationManager;
use crate::store::CredentialStore;
use crate::verifier::{AnchoringVerifier, VerificationOutcome};

// ── Caller ──────────────────────────────────────────────────────────────────

/// Who is calling: the resolved session plus the network identity used for
/// throttling anonymous traffic.
#[derive(Debug, Clone)]
pub struct Caller {
    pub ctx: AuthorizationContext,
    /// Peer address, or the client hop behind trusted proxies. `"anonymous"` when unknown.
    pub client_id: String,
}

impl Caller {
    pub fn new(ctx: AuthorizationContext, client_id: impl Into<String>) -> Self {
        Self {
            ctx,
            client_id: client_id.into(),
        }
    }

    /// Authenticated callers are throttled per user, everyone else per client.
    fn rate_key(&self) -> String {
        match self.ctx.subject {
            Some(subject) => format!("user:{subject}"),
            None => format!("client:{}", self.client_id),
        }
    }
}

// ── Views ───────────────────────────────────────────────────────────────────

/// How the viewer relates to the credential's owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ViewerRelationship {
    pub is_owner: bool,
    pub is_connected: bool,
}

/// Credential as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CredentialView {
    #[schema(value_type = String, format = Uuid)]
    pub id: CredentialId,
    #[schema(value_type = String, format = Uuid)]
    pub owner_id: UserId,
    pub title: String,
    pub issuer_name: String,
    #[schema(value_type = String, example = "certification")]
    pub credential_type: CredentialType,
    pub issue_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    /// Whether `expiry_date` has passed.
    pub expired: bool,
    #[schema(value_type = String, example = "public")]
    pub visibility: Visibility,
    #[schema(value_type = Vec<String>)]
    pub skills: Vec<SkillId>,
    pub verified: bool,
    pub anchor_reference: Option<String>,
    #[schema(value_type = String, example = "anchored")]
    pub anchor_status: AnchorStatus,
    pub anchored_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Present only for authenticated viewers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer: Option<ViewerRelationship>,
}

impl CredentialView {
    fn from_credential(c: &Credential, viewer: Option<ViewerRelationship>) -> Self {
        Self {
            id: c.id,
            owner_id: c.owner_id,
            title: c.title.clone(),
            issuer_name: c.issuer_name.clone(),
            credential_type: c.credential_type,
            issue_date: c.issue_date,
            expiry_date: c.expiry_date,
            expired: c.is_expired(Utc::now().date_naive()),
            visibility: c.visibility,
            skills: c.skills.clone(),
            verified: c.verified,
            anchor_reference: c.anchor_reference.clone(),
            anchor_status: c.anchor_status,
            anchored_at: c.anchored_at,
            revoked_at: c.revoked_at,
            created_at: c.created_at,
            updated_at: c.updated_at,
            viewer,
        }
    }
}

/// Public verification page payload: the claim, the live check, and the link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerificationPage {
    pub credential: CredentialView,
    pub outcome: VerificationOutcome,
    pub verification_url: String,
}

/// Claim fields supplied at registration. Ownership and the local
/// `verified` flag are decided by the orchestrator from the caller's role.
#[derive(Debug, Clone)]
pub struct CredentialDraft {
    pub title: String,
    pub issuer_name: String,
    pub credential_type: CredentialType,
    pub issue_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    pub visibility: Visibility,
    pub skills: Vec<SkillId>,
}

// ── Service ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CredentialService {
    store: CredentialStore,
    limiter: RateLimiter,
    rate_limits: RateLimitConfig,
    verifier: AnchoringVerifier,
    revocation: RevocationManager,
    artifacts: ArtifactGenerator,
    connections: ConnectionDirectory,
}

impl CredentialService {
    pub fn new(
        store: CredentialStore,
        limiter: RateLimiter,
        rate_limits: RateLimitConfig,
        verifier: AnchoringVerifier,
        artifacts: ArtifactGenerator,
        connections: ConnectionDirectory,
    ) -> Self {
        Self {
            revocation: RevocationManager::new(store.clone()),
            store,
            limiter,
            rate_limits,
            verifier,
            artifacts,
            connections,
        }
    }

    fn throttle(&self, action: RateLimitAction, caller: &Caller) -> Result<(), AppError> {
        let policy = self.rate_limits.policy(action);
        let key = format!("{}:{}", action.as_str(), caller.rate_key());
        let decision = self.limiter.allow(&key, policy.limit, policy.window);
        if decision.allowed {
            return Ok(());
        }
        let retry_after_secs = decision.retry_after_secs(Instant::now());
        tracing::warn!(action = action.as_str(), %key, retry_after_secs, "rate limit exceeded");
        Err(AppError::RateLimited { retry_after_secs })
    }

    fn view(&self, credential: &Credential, ctx: &AuthorizationContext) -> CredentialView {
        let viewer = ctx
            .subject
            .filter(|_| ctx.is_authenticated_at(Utc::now()))
            .map(|viewer| ViewerRelationship {
                is_owner: credential.is_owned_by(&viewer),
                is_connected: self.connections.are_connected(viewer, credential.owner_id),
            });
        CredentialView::from_credential(credential, viewer)
    }

    /// Public credentials only. Private ones are `NotFound` for everyone.
    fn public_credential(&self, id: CredentialId) -> Result<Credential, AppError> {
        let credential = self.store.get(id)?;
        if credential.visibility == Visibility::Private {
            return Err(AppError::NotFound(format!("credential {id}")));
        }
        Ok(credential)
    }

    pub async fn fetch_public_credential(
        &self,
        id: CredentialId,
        caller: &Caller,
    ) -> Result<CredentialView, AppError> {
        self.throttle(RateLimitAction::Read, caller)?;
        let credential = self.public_credential(id)?;
        Ok(self.view(&credential, &caller.ctx))
    }

    pub async fn list_public_credentials(
        &self,
        owner: UserId,
        caller: &Caller,
    ) -> Result<Vec<CredentialView>, AppError> {
        self.throttle(RateLimitAction::Read, caller)?;
        Ok(self
            .store
            .list_by_owner(owner)
            .iter()
            .filter(|c| c.visibility == Visibility::Public)
            .map(|c| self.view(c, &caller.ctx))
            .collect())
    }

    /// Ledger check for any credential id, regardless of visibility: the
    /// outcome reveals nothing beyond whether the ledger vouches for it.
    pub async fn check_anchor(
        &self,
        id: CredentialId,
        caller: &Caller,
    ) -> Result<VerificationOutcome, AppError> {
        self.throttle(RateLimitAction::LedgerQuery, caller)?;
        Ok(self.verifier.verify(id).await?)
    }

    pub async fn verification_page(
        &self,
        id: CredentialId,
        caller: &Caller,
    ) -> Result<VerificationPage, AppError> {
        self.throttle(RateLimitAction::LedgerQuery, caller)?;
        let credential = self.public_credential(id)?;
        let outcome = self.verifier.evaluate(&credential).await;
        Ok(VerificationPage {
            credential: self.view(&credential, &caller.ctx),
            outcome,
            verification_url: self.artifacts.verification_url(id),
        })
    }

    /// Learners register their own credentials (unverified). Issuers
    /// register on behalf of a named owner, and vouch for the claim.
    pub async fn register_credential(
        &self,
        owner_id: Option<UserId>,
        draft: CredentialDraft,
        caller: &Caller,
    ) -> Result<CredentialView, AppError> {
        self.throttle(RateLimitAction::Write, caller)?;
        let subject = require_authenticated(&caller.ctx)?;
        require_any_role(&caller.ctx, &[Role::Learner, Role::Issuer])?;

        let (owner_id, verified) = match caller.ctx.role {
            Role::Issuer => {
                let owner = owner_id.ok_or_else(|| {
                    AppError::Validation("ownerId is required when an issuer registers".into())
                })?;
                (owner, true)
            }
            _ => match owner_id {
                Some(owner) if owner != subject => {
                    return Err(AppError::Forbidden(
                        "learners may only register their own credentials".into(),
                    ))
                }
                _ => (subject, false),
            },
        };

        let credential = self
            .store
            .create(NewCredential {
                owner_id,
                title: draft.title,
                issuer_name: draft.issuer_name,
                credential_type: draft.credential_type,
                issue_date: draft.issue_date,
                expiry_date: draft.expiry_date,
                visibility: draft.visibility,
                skills: draft.skills,
                verified,
            })
            .await?;

        tracing::info!(
            credential_id = %credential.id,
            owner_id = %credential.owner_id,
            registered_by = %subject,
            role = caller.ctx.role.as_str(),
            "credential registered"
        );
        Ok(self.view(&credential, &caller.ctx))
    }

    /// Record `reference` after the ledger confirms it vouches for this
    /// credential's content.
    pub async fn anchor_credential(
        &self,
        id: CredentialId,
        reference: &str,
        caller: &Caller,
    ) -> Result<CredentialView, AppError> {
        self.throttle(RateLimitAction::Write, caller)?;
        let subject = require_authenticated(&caller.ctx)?;

        let credential = self.store.get(id)?;
        if !credential.is_owned_by(&subject) && caller.ctx.role != Role::Issuer {
            return Err(AppError::Forbidden(
                "only the owner or an issuer may anchor a credential".into(),
            ));
        }

        let reference = reference.trim();
        if reference.is_empty() {
            return Err(AppError::Validation("anchor reference must not be empty".into()));
        }
        match credential.anchor_reference.as_deref() {
            Some(existing) if existing == reference => {
                return Ok(self.view(&credential, &caller.ctx));
            }
            Some(_) => {
                return Err(AppError::Conflict(
                    "credential is already anchored to a different reference".into(),
                ));
            }
            None => {}
        }
        if credential.anchor_status.is_terminal() {
            return Err(TransitionError {
                from: credential.anchor_status,
                to: AnchorStatus::Anchored,
            }
            .into());
        }

        self.verifier
            .confirm_reference(reference, &credential.content_digest())
            .await?;
        let anchored = self
            .store
            .update_anchor(id, reference, AnchorStatus::Anchored)
            .await?;

        tracing::info!(credential_id = %id, reference, anchored_by = %subject, "credential anchored");
        Ok(self.view(&anchored, &caller.ctx))
    }

    pub async fn request_revocation(
        &self,
        id: CredentialId,
        caller: &Caller,
    ) -> Result<CredentialView, AppError> {
        self.throttle(RateLimitAction::Write, caller)?;
        require_authenticated(&caller.ctx)?;
        authorize_role(&caller.ctx, Role::Issuer)?;

        let revoked = self.revocation.revoke(id, &caller.ctx).await?;
        Ok(self.view(&revoked, &caller.ctx))
    }

    pub async fn request_artifact(
        &self,
        id: CredentialId,
        caller: &Caller,
    ) -> Result<ArtifactResponse, AppError> {
        self.throttle(RateLimitAction::Write, caller)?;
        require_authenticated(&caller.ctx)?;

        let credential = self.store.get(id)?;
        require_owner(&caller.ctx, &credential.owner_id)?;

        Ok(self.artifacts.generate(id).await?)
    }

    pub async fn delete_credential(&self, id: CredentialId, caller: &Caller) -> Result<(), AppError> {
        self.throttle(RateLimitAction::Write, caller)?;
        let subject = require_authenticated(&caller.ctx)?;

        self.store.delete(id, subject).await?;
        tracing::info!(credential_id = %id, deleted_by = %subject, "credential deleted");
        Ok(())
    }
}
