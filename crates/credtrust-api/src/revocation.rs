//! # Revocation Manager
//!
//! Moves a credential to the terminal `revoked` status. The caller has
//! already checked the issuer role; this layer only re-checks the current
//! status so that repeated or racing revocations are harmless.
//!
//! Revocation is recorded in the local store only. It does not write a
//! revocation marker to the ledger, and it does not cascade to skills or
//! the owner.

use credtrust_core::{AnchorStatus, Credential, CredentialId};

use crate::auth::AuthorizationContext;
use crate::store::{CredentialStore, StoreError};

#[derive(Debug, Clone)]
pub struct RevocationManager {
    store: CredentialStore,
}

impl RevocationManager {
    pub fn new(store: CredentialStore) -> Self {
        Self { store }
    }

    /// Revoke `id`. Revoking an already revoked credential returns it unchanged.
    pub async fn revoke(
        &self,
        id: CredentialId,
        ctx: &AuthorizationContext,
    ) -> Result<Credential, StoreError> {
        let current = self.store.get(id)?;
        if current.anchor_status.is_terminal() {
            tracing::debug!(credential_id = %id, "credential already revoked");
            return Ok(current);
        }

        match self
            .store
            .update_status(id, AnchorStatus::Revoked, ctx.subject)
            .await
        {
            Ok(revoked) => {
                tracing::info!(
                    credential_id = %id,
                    from = %current.anchor_status,
                    revoked_by = ?ctx.subject,
                    anchor_reference = ?revoked.anchor_reference,
                    "credential revoked"
                );
                Ok(revoked)
            }
            // Lost a race with another revocation between the read and the write.
            Err(StoreError::InvalidTransition(_)) => {
                let latest = self.store.get(id)?;
                if latest.anchor_status == AnchorStatus::Revoked {
                    Ok(latest)
                } else {
                    Err(StoreError::InvalidTransition(credtrust_core::TransitionError {
                        from: latest.anchor_status,
                        to: AnchorStatus::Revoked,
                    }))
                }
            }
            Err(e) => Err(e),
        }
    }
}
