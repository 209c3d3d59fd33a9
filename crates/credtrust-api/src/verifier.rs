//! # Anchoring Verifier
//!
//! Answers "does the ledger vouch for this credential right now?" without
//! touching the record. Fails closed: any path that does not end in a
//! positive ledger answer yields `verified = false`.
//!
//! | Condition | `verified` | `reason` | Ledger contacted |
//! |-----------|-----------|----------|------------------|
//! | no anchor reference | false | `not_anchored` | no |
//! | locally revoked | false | `revoked` | no |
//! | ledger carries a revocation marker | false | `revoked` | yes |
//! | tampered / superseded / unknown / digest mismatch / not on ledger / answer for another reference | false | `ledger_rejected` | yes |
//! | ledger error, timeout, or no oracle configured | false | `verification_error` | maybe |
//! | valid, unrevoked, digest matches | true | `confirmed` | yes |

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use credtrust_core::{AnchorStatus, Credential, CredentialId};
use credtrust_ledger::{LedgerAnchorState, LedgerOracle, LedgerRecord};

use crate::error::AppError;
use crate::store::{CredentialStore, StoreError};

/// Why a verification came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VerificationReason {
    Confirmed,
    NotAnchored,
    Revoked,
    LedgerRejected,
    VerificationError,
}

/// Result of a verification check, always timestamped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerificationOutcome {
    pub verified: bool,
    pub reason: VerificationReason,
    pub checked_at: DateTime<Utc>,
}

impl VerificationOutcome {
    fn new(reason: VerificationReason) -> Self {
        Self {
            verified: reason == VerificationReason::Confirmed,
            reason,
            checked_at: Utc::now(),
        }
    }
}

/// Why a ledger lookup produced no usable answer.
#[derive(Debug, thiserror::Error)]
enum LookupFailure {
    #[error("no ledger oracle configured")]
    NotConfigured,
    #[error("ledger lookup timed out after {0:?}")]
    TimedOut(Duration),
    #[error(transparent)]
    Ledger(#[from] credtrust_ledger::LedgerError),
}

/// Verifies credentials against the ledger oracle.
#[derive(Debug, Clone)]
pub struct AnchoringVerifier {
    store: CredentialStore,
    oracle: Option<Arc<dyn LedgerOracle>>,
    timeout: Duration,
}

impl AnchoringVerifier {
    pub fn new(
        store: CredentialStore,
        oracle: Option<Arc<dyn LedgerOracle>>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            oracle,
            timeout,
        }
    }

    /// Verify the stored credential `id`.
    pub async fn verify(&self, id: CredentialId) -> Result<VerificationOutcome, StoreError> {
        let credential = self.store.get(id)?;
        Ok(self.evaluate(&credential).await)
    }

    /// Verify a credential the caller already holds.
    pub async fn evaluate(&self, credential: &Credential) -> VerificationOutcome {
        let Some(reference) = credential.anchor_reference.as_deref() else {
            return VerificationOutcome::new(VerificationReason::NotAnchored);
        };
        if credential.anchor_status == AnchorStatus::Revoked {
            return VerificationOutcome::new(VerificationReason::Revoked);
        }

        let record = match self.lookup(reference).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(
                    credential_id = %credential.id,
                    reference,
                    error = %e,
                    "ledger verification failed, reporting unverified"
                );
                return VerificationOutcome::new(VerificationReason::VerificationError);
            }
        };

        let reason = classify(&record, reference, &credential.content_digest());
        tracing::debug!(credential_id = %credential.id, reference, ?reason, "ledger verification");
        VerificationOutcome::new(reason)
    }

    /// Confirm that `reference` exists on the ledger and vouches for content
    /// with digest `expected_digest`. Used by the explicit anchoring step.
    ///
    /// Returns `Validation` when the ledger answers no, and
    /// `VerificationUnavailable` when it cannot answer.
    pub async fn confirm_reference(
        &self,
        reference: &str,
        expected_digest: &str,
    ) -> Result<LedgerRecord, AppError> {
        let record = self
            .lookup(reference)
            .await
            .map_err(|e| AppError::VerificationUnavailable(e.to_string()))?;

        match classify(&record, reference, expected_digest) {
            VerificationReason::Confirmed => Ok(record),
            VerificationReason::Revoked => Err(AppError::Validation(format!(
                "anchor reference {reference} carries a revocation marker on the ledger"
            ))),
            _ if record.state == LedgerAnchorState::NotFound => Err(AppError::Validation(format!(
                "anchor reference {reference} is not on the ledger"
            ))),
            _ => Err(AppError::Validation(format!(
                "ledger does not vouch for anchor reference {reference}"
            ))),
        }
    }

    async fn lookup(&self, reference: &str) -> Result<LedgerRecord, LookupFailure> {
        let oracle = self.oracle.as_ref().ok_or(LookupFailure::NotConfigured)?;
        match tokio::time::timeout(self.timeout, oracle.lookup(reference)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(LookupFailure::TimedOut(self.timeout)),
        }
    }
}

/// A record describing some other reference says nothing about ours, so it is
/// rejected before its revocation marker or integrity state is looked at.
fn classify(record: &LedgerRecord, reference: &str, digest: &str) -> VerificationReason {
    if record.reference != reference {
        tracing::warn!(
            queried = reference,
            answered = %record.reference,
            "ledger answered for a different reference"
        );
        return VerificationReason::LedgerRejected;
    }
    if record.revoked {
        return VerificationReason::Revoked;
    }
    if !record.confirms_integrity() {
        return VerificationReason::LedgerRejected;
    }
    match record.content_hash.as_deref() {
        Some(hash) if !hash.eq_ignore_ascii_case(digest) => VerificationReason::LedgerRejected,
        _ => VerificationReason::Confirmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use credtrust_core::{CredentialType, NewCredential, UserId, Visibility};
    use credtrust_ledger::mock::MockLedger;

    async fn setup() -> (CredentialStore, MockLedger, AnchoringVerifier, Credential) {
        let store = CredentialStore::new();
        let ledger = MockLedger::new();
        let verifier = AnchoringVerifier::new(
            store.clone(),
            Some(Arc::new(ledger.clone())),
            Duration::from_millis(200),
        );
        let cred = store
            .create(NewCredential {
                owner_id: UserId::new(),
                title: "Cloud Architecture".into(),
                issuer_name: "Cloud Vendor".into(),
                credential_type: CredentialType::Certification,
                issue_date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
                expiry_date: None,
                visibility: Visibility::Public,
                skills: vec![],
                verified: true,
            })
            .await
            .unwrap();
        (store, ledger, verifier, cred)
    }

    async fn anchor(store: &CredentialStore, cred: &Credential, reference: &str) -> Credential {
        store
            .update_anchor(cred.id, reference, AnchorStatus::Anchored)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn unanchored_skips_ledger() {
        let (_, ledger, verifier, cred) = setup().await;
        let outcome = verifier.verify(cred.id).await.unwrap();
        assert!(!outcome.verified);
        assert_eq!(outcome.reason, VerificationReason::NotAnchored);
        assert_eq!(ledger.calls(), 0);
    }

    #[tokio::test]
    async fn locally_revoked_skips_ledger() {
        let (store, ledger, verifier, cred) = setup().await;
        anchor(&store, &cred, "0x1").await;
        ledger.insert(LedgerRecord::valid("0x1"));
        store
            .update_status(cred.id, AnchorStatus::Revoked, None)
            .await
            .unwrap();

        let outcome = verifier.verify(cred.id).await.unwrap();
        assert!(!outcome.verified);
        assert_eq!(outcome.reason, VerificationReason::Revoked);
        assert_eq!(ledger.calls(), 0);
    }

    #[tokio::test]
    async fn confirmed_when_ledger_valid_and_digest_matches() {
        let (store, ledger, verifier, cred) = setup().await;
        let cred = anchor(&store, &cred, "0x1").await;
        ledger.insert(LedgerRecord::valid("0x1").with_content_hash(cred.content_digest()));

        let outcome = verifier.verify(cred.id).await.unwrap();
        assert!(outcome.verified);
        assert_eq!(outcome.reason, VerificationReason::Confirmed);
    }

    /// Answers every lookup with the same valid record, whatever was asked.
    #[derive(Debug)]
    struct FixedAnswerLedger(LedgerRecord);

    #[axum::async_trait]
    impl LedgerOracle for FixedAnswerLedger {
        async fn lookup(
            &self,
            _reference: &str,
        ) -> Result<LedgerRecord, credtrust_ledger::LedgerError> {
            Ok(self.0.clone())
        }

        fn ledger_id(&self) -> &str {
            "fixed-answer"
        }
    }

    #[tokio::test]
    async fn answer_for_another_reference_is_rejected() {
        let (store, _, _, cred) = setup().await;
        let cred = anchor(&store, &cred, "0x1").await;
        let verifier = AnchoringVerifier::new(
            store.clone(),
            Some(Arc::new(FixedAnswerLedger(
                LedgerRecord::valid("0x2").with_content_hash(cred.content_digest()),
            ))),
            Duration::from_millis(200),
        );

        let outcome = verifier.verify(cred.id).await.unwrap();
        assert!(!outcome.verified);
        assert_eq!(outcome.reason, VerificationReason::LedgerRejected);

        assert!(matches!(
            verifier.confirm_reference("0x1", &cred.content_digest()).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn digest_mismatch_is_rejected() {
        let (store, ledger, verifier, cred) = setup().await;
        anchor(&store, &cred, "0x1").await;
        ledger.insert(LedgerRecord::valid("0x1").with_content_hash("deadbeef"));

        let outcome = verifier.verify(cred.id).await.unwrap();
        assert!(!outcome.verified);
        assert_eq!(outcome.reason, VerificationReason::LedgerRejected);
    }

    #[tokio::test]
    async fn ledger_revocation_marker_is_revoked() {
        let (store, ledger, verifier, cred) = setup().await;
        anchor(&store, &cred, "0x1").await;
        ledger.insert(LedgerRecord::valid("0x1").revoked());

        let outcome = verifier.verify(cred.id).await.unwrap();
        assert_eq!(outcome.reason, VerificationReason::Revoked);
    }

    #[tokio::test]
    async fn missing_on_ledger_is_rejected() {
        let (store, _, verifier, cred) = setup().await;
        anchor(&store, &cred, "0x1").await;
        let outcome = verifier.verify(cred.id).await.unwrap();
        assert_eq!(outcome.reason, VerificationReason::LedgerRejected);
    }

    #[tokio::test]
    async fn ledger_down_fails_closed() {
        let (store, ledger, verifier, cred) = setup().await;
        anchor(&store, &cred, "0x1").await;
        ledger.insert(LedgerRecord::valid("0x1"));
        ledger.set_unavailable(true);

        let outcome = verifier.verify(cred.id).await.unwrap();
        assert!(!outcome.verified);
        assert_eq!(outcome.reason, VerificationReason::VerificationError);
    }

    #[tokio::test]
    async fn timeout_fails_closed() {
        let (store, ledger, verifier, cred) = setup().await;
        anchor(&store, &cred, "0x1").await;
        ledger.insert(LedgerRecord::valid("0x1"));
        ledger.set_delay(Some(Duration::from_secs(5)));

        let outcome = verifier.verify(cred.id).await.unwrap();
        assert_eq!(outcome.reason, VerificationReason::VerificationError);
    }

    #[tokio::test]
    async fn no_oracle_fails_closed() {
        let store = CredentialStore::new();
        let verifier = AnchoringVerifier::new(store.clone(), None, Duration::from_secs(1));
        let (_, _, _, cred) = setup().await;
        let outcome = verifier.evaluate(&Credential {
            anchor_reference: Some("0x1".into()),
            anchor_status: AnchorStatus::Anchored,
            ..cred
        })
        .await;
        assert_eq!(outcome.reason, VerificationReason::VerificationError);
    }

    #[tokio::test]
    async fn verify_does_not_mutate_record() {
        let (store, ledger, verifier, cred) = setup().await;
        let cred = anchor(&store, &cred, "0x1").await;
        ledger.insert(LedgerRecord::valid("0x1").revoked());
        verifier.verify(cred.id).await.unwrap();
        assert_eq!(store.get(cred.id).unwrap(), cred);
    }

    #[tokio::test]
    async fn verify_unknown_id_is_not_found() {
        let (_, _, verifier, _) = setup().await;
        assert!(matches!(
            verifier.verify(CredentialId::new()).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn confirm_reference_distinguishes_no_from_unavailable() {
        let (_, ledger, verifier, cred) = setup().await;
        let digest = cred.content_digest();

        assert!(matches!(
            verifier.confirm_reference("0xmissing", &digest).await,
            Err(AppError::Validation(_))
        ));

        ledger.insert(LedgerRecord::valid("0xok").with_content_hash(digest.clone()));
        assert!(verifier.confirm_reference("0xok", &digest).await.is_ok());

        ledger.set_unavailable(true);
        assert!(matches!(
            verifier.confirm_reference("0xok", &digest).await,
            Err(AppError::VerificationUnavailable(_))
        ));
    }
}
