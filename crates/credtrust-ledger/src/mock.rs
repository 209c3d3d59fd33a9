//! In-memory ledger oracle for tests and local development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::error::LedgerError;
use crate::types::LedgerRecord;
use crate::LedgerOracle;

/// Scriptable ledger. Unknown references answer `NotFound`.
///
/// Clones share state, so a test can keep a handle after giving one to the
/// service under test.
#[derive(Debug, Clone, Default)]
pub struct MockLedger {
    records: Arc<RwLock<HashMap<String, LedgerRecord>>>,
    unavailable: Arc<AtomicBool>,
    delay: Arc<RwLock<Option<Duration>>>,
    calls: Arc<AtomicUsize>,
}

impl MockLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or replace) what the ledger says about a reference.
    pub fn insert(&self, record: LedgerRecord) {
        self.records.write().insert(record.reference.clone(), record);
    }

    /// Make every lookup fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Sleep before answering each lookup.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write() = delay;
    }

    /// Number of lookups made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LedgerOracle for MockLedger {
    async fn lookup(&self, reference: &str) -> Result<LedgerRecord, LedgerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable(self.ledger_id().to_string()));
        }

        Ok(self
            .records
            .read()
            .get(reference)
            .cloned()
            .unwrap_or_else(|| LedgerRecord::not_found(reference)))
    }

    fn ledger_id(&self) -> &str {
        "mock-ledger"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LedgerAnchorState;

    #[tokio::test]
    async fn unknown_reference_is_not_found() {
        let ledger = MockLedger::new();
        let record = ledger.lookup("missing").await.unwrap();
        assert_eq!(record.state, LedgerAnchorState::NotFound);
        assert_eq!(ledger.calls(), 1);
    }

    #[tokio::test]
    async fn clones_share_records() {
        let ledger = MockLedger::new();
        let handle = ledger.clone();
        handle.insert(LedgerRecord::valid("0x1"));
        assert!(ledger.lookup("0x1").await.unwrap().confirms_integrity());
        assert_eq!(handle.calls(), 1);
    }

    #[tokio::test]
    async fn unavailable_fails_lookup() {
        let ledger = MockLedger::new();
        ledger.set_unavailable(true);
        assert!(matches!(
            ledger.lookup("0x1").await,
            Err(LedgerError::Unavailable(_))
        ));
    }
}
