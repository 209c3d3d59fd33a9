//! Ledger query response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the ledger says about an anchor reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerAnchorState {
    /// The reference exists and its recorded content is intact.
    Valid,
    /// The reference exists but its integrity check failed.
    Tampered,
    /// The reference was replaced by a later anchor.
    Superseded,
    /// The ledger has no such reference.
    NotFound,
    /// Forward-compatible catch-all for states introduced later.
    #[serde(other)]
    Unknown,
}

/// Normalized ledger answer for one reference.
///
/// Fields use `#[serde(default)]` so that additions on the ledger side do
/// not break deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRecord {
    /// The reference that was looked up.
    pub reference: String,
    /// Integrity state.
    pub state: LedgerAnchorState,
    /// Hex content digest recorded with the anchor, if any.
    #[serde(default)]
    pub content_hash: Option<String>,
    /// Whether a revocation marker exists for the reference.
    #[serde(default)]
    pub revoked: bool,
    /// Block or sequence number holding the anchor.
    #[serde(default)]
    pub block_number: Option<u64>,
    /// When the ledger recorded the anchor.
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl LedgerRecord {
    /// A valid, unrevoked record with no digest.
    pub fn valid(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            state: LedgerAnchorState::Valid,
            content_hash: None,
            revoked: false,
            block_number: None,
            recorded_at: None,
        }
    }

    /// The ledger's answer for an unknown reference.
    pub fn not_found(reference: impl Into<String>) -> Self {
        Self {
            state: LedgerAnchorState::NotFound,
            ..Self::valid(reference)
        }
    }

    /// Attach a content digest.
    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    /// Mark as revoked on the ledger.
    pub fn revoked(mut self) -> Self {
        self.revoked = true;
        self
    }

    /// Whether the ledger vouches for the reference: present, intact, and
    /// carrying no revocation marker.
    pub fn confirms_integrity(&self) -> bool {
        self.state == LedgerAnchorState::Valid && !self.revoked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_minimal_payload() {
        let record: LedgerRecord =
            serde_json::from_str(r#"{"reference":"0xabc","state":"valid"}"#).unwrap();
        assert_eq!(record, LedgerRecord::valid("0xabc"));
        assert!(record.confirms_integrity());
    }

    #[test]
    fn unknown_state_is_tolerated_and_not_trusted() {
        let record: LedgerRecord =
            serde_json::from_str(r#"{"reference":"0xabc","state":"pending_finality"}"#).unwrap();
        assert_eq!(record.state, LedgerAnchorState::Unknown);
        assert!(!record.confirms_integrity());
    }

    #[test]
    fn revocation_marker_defeats_integrity() {
        let record = LedgerRecord::valid("0xabc").revoked();
        assert!(!record.confirms_integrity());
    }

    #[test]
    fn camel_case_fields() {
        let record: LedgerRecord = serde_json::from_str(
            r#"{"reference":"r","state":"superseded","contentHash":"ff","blockNumber":7}"#,
        )
        .unwrap();
        assert_eq!(record.content_hash.as_deref(), Some("ff"));
        assert_eq!(record.block_number, Some(7));
        assert!(!record.confirms_integrity());
    }
}
