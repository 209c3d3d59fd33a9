//! # Credential Store Adapter
//!
//! In-memory credential records with optional Postgres write-through.
//!
//! Every read-validate-update runs under a single `parking_lot` write lock,
//! so two requests racing on one credential never both pass a precondition.
//! The lock is never held across an `.await`: the mutation is applied and
//! cloned under the lock, then persisted. When the database write fails
//! the previous record is put back, so memory never runs ahead of Postgres.
//!
//! A secondary index maps anchor references to credential ids, which gives
//! the same uniqueness guarantee as the `UNIQUE` column in Postgres.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use sqlx::PgPool;
use thiserror::Error;

use credtrust_core::{
    AnchorError, AnchorStatus, Credential, CredentialId, NewCredential, TransitionError, UserId,
    ValidationError, VerificationArtifact,
};

use crate::error::AppError;

/// Store failures, mapped to [`AppError`] at the API boundary.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("credential {0} not found")]
    NotFound(CredentialId),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("user {requester} does not own credential {id}")]
    Forbidden {
        id: CredentialId,
        requester: UserId,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("invalid anchor reference: {0}")]
    InvalidReference(String),

    #[error("persistence failed: {0}")]
    Persistence(#[from] sqlx::Error),
}

impl From<AnchorError> for StoreError {
    fn from(err: AnchorError) -> Self {
        match err {
            AnchorError::ReferenceConflict { .. } => Self::Conflict(err.to_string()),
            AnchorError::EmptyReference => Self::InvalidReference(err.to_string()),
            AnchorError::Transition(t) => Self::InvalidTransition(t),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(format!("credential {id}")),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::InvalidTransition(t) => Self::InvalidTransition(t.to_string()),
            StoreError::Forbidden { .. } => {
                Self::Forbidden("only the credential owner may do this".into())
            }
            StoreError::Validation(v) => Self::Validation(v.to_string()),
            StoreError::InvalidReference(msg) => Self::Validation(msg),
            StoreError::Persistence(e) => Self::Internal(format!("database error: {e}")),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<CredentialId, Credential>,
    anchors: HashMap<String, CredentialId>,
}

/// Credential store. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    inner: Arc<RwLock<Inner>>,
    pool: Option<PgPool>,
}

impl CredentialStore {
    /// In-memory store without persistence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that writes through to `pool` when present.
    pub fn with_pool(pool: Option<PgPool>) -> Self {
        Self {
            inner: Arc::default(),
            pool,
        }
    }

    pub fn get(&self, id: CredentialId) -> Result<Credential, StoreError> {
        self.inner
            .read()
            .records
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    /// All credentials owned by `owner`, oldest first.
    pub fn list_by_owner(&self, owner: UserId) -> Vec<Credential> {
        let mut out: Vec<Credential> = self
            .inner
            .read()
            .records
            .values()
            .filter(|c| c.owner_id == owner)
            .cloned()
            .collect();
        out.sort_by_key(|c| (c.created_at, c.id));
        out
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a new credential.
    pub async fn create(&self, new: NewCredential) -> Result<Credential, StoreError> {
        let record = Credential::register(new, Utc::now())?;
        self.inner.write().records.insert(record.id, record.clone());

        if let Some(pool) = &self.pool {
            if let Err(e) = crate::db::credentials::insert(pool, &record).await {
                tracing::error!(credential_id = %record.id, error = %e, "failed to persist credential");
                self.inner.write().records.remove(&record.id);
                return Err(e.into());
            }
        }
        Ok(record)
    }

    /// Record the anchor reference with the status it implies.
    ///
    /// Repeating the same reference and status is a no-op. A different
    /// reference, on this credential or already held by another, is a
    /// `Conflict`.
    pub async fn update_anchor(
        &self,
        id: CredentialId,
        reference: &str,
        status: AnchorStatus,
    ) -> Result<Credential, StoreError> {
        let reference = reference.trim();
        let (previous, record, changed) = {
            let mut guard = self.inner.write();
            let Inner { records, anchors } = &mut *guard;

            let record = records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            if let Some(holder) = anchors.get(reference) {
                if *holder != id {
                    return Err(StoreError::Conflict(format!(
                        "anchor reference already recorded on credential {holder}"
                    )));
                }
            }

            let previous = record.clone();
            let changed = record.record_anchor(reference, status, Utc::now())?;
            if let Some(r) = &record.anchor_reference {
                anchors.insert(r.clone(), id);
            }
            (previous, record.clone(), changed)
        };

        if changed {
            self.persist_or_restore(previous, &record).await?;
        }
        Ok(record)
    }

    /// Move the credential to `to`. `actor` is recorded on revocation.
    pub async fn update_status(
        &self,
        id: CredentialId,
        to: AnchorStatus,
        actor: Option<UserId>,
    ) -> Result<Credential, StoreError> {
        let (previous, record) = {
            let mut guard = self.inner.write();
            let record = guard.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            let previous = record.clone();
            record.apply_status(to, actor, Utc::now())?;
            (previous, record.clone())
        };

        self.persist_or_restore(previous, &record).await?;
        Ok(record)
    }

    /// Cache a verification artifact on the record.
    pub async fn set_artifact(
        &self,
        id: CredentialId,
        artifact: VerificationArtifact,
    ) -> Result<Credential, StoreError> {
        let (previous, record) = {
            let mut guard = self.inner.write();
            let record = guard.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            let previous = record.clone();
            record.artifact = Some(artifact);
            record.updated_at = Utc::now();
            (previous, record.clone())
        };

        self.persist_or_restore(previous, &record).await?;
        Ok(record)
    }

    /// Delete a credential. Only its owner may do so. The cached artifact,
    /// skill associations and anchor index entry go with it.
    pub async fn delete(&self, id: CredentialId, requester: UserId) -> Result<(), StoreError> {
        let removed = {
            let mut guard = self.inner.write();
            let record = guard.records.get(&id).ok_or(StoreError::NotFound(id))?;
            if !record.is_owned_by(&requester) {
                return Err(StoreError::Forbidden { id, requester });
            }
            let removed = guard.records.remove(&id);
            if let Some(reference) = removed.as_ref().and_then(|r| r.anchor_reference.as_ref()) {
                guard.anchors.remove(reference);
            }
            removed
        };

        if let Some(pool) = &self.pool {
            if let Err(e) = crate::db::credentials::delete(pool, id).await {
                tracing::error!(credential_id = %id, error = %e, "failed to delete credential from database");
                if let Some(record) = removed {
                    self.reinsert(record);
                }
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Load every persisted credential into memory. Returns how many were loaded.
    pub async fn hydrate(&self) -> Result<usize, StoreError> {
        let Some(pool) = &self.pool else {
            return Ok(0);
        };

        let records = crate::db::credentials::load_all(pool).await?;
        let count = records.len();

        let mut guard = self.inner.write();
        for record in records {
            if let Some(reference) = &record.anchor_reference {
                guard.anchors.insert(reference.clone(), record.id);
            }
            guard.records.insert(record.id, record);
        }
        Ok(count)
    }

    /// Write `record` through to the database. On failure the in-memory
    /// record goes back to `previous`, unless another writer has replaced
    /// `record` in the meantime.
    async fn persist_or_restore(
        &self,
        previous: Credential,
        record: &Credential,
    ) -> Result<(), StoreError> {
        let Some(pool) = &self.pool else {
            return Ok(());
        };
        let Err(e) = crate::db::credentials::update_trust_attributes(pool, record).await else {
            return Ok(());
        };
        tracing::error!(credential_id = %record.id, error = %e, "failed to persist credential update");

        let mut guard = self.inner.write();
        let Inner { records, anchors } = &mut *guard;
        if records.get(&record.id) == Some(record) {
            if let Some(reference) = &record.anchor_reference {
                if previous.anchor_reference.as_ref() != Some(reference) {
                    anchors.remove(reference);
                }
            }
            records.insert(previous.id, previous);
        }
        Err(e.into())
    }

    /// Put back a record whose database delete failed. A reference claimed
    /// by another credential since the removal stays with that credential.
    fn reinsert(&self, record: Credential) {
        let mut guard = self.inner.write();
        let Inner { records, anchors } = &mut *guard;
        if let Some(reference) = &record.anchor_reference {
            anchors.entry(reference.clone()).or_insert(record.id);
        }
        records.entry(record.id).or_insert(record);
    }
}
