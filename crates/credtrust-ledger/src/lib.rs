//! # credtrust-ledger -- Typed client for the external integrity ledger
//!
//! The ledger records a reference for each anchored credential, optionally
//! with the credential's content digest, and a revocation marker. This crate
//! does not know the ledger's transaction format; it asks a query endpoint
//! about a reference and normalizes the answer into a [`LedgerRecord`].
//!
//! ## Architecture
//!
//! [`LedgerOracle`] is the seam the verifier depends on. Two implementations
//! ship here:
//!
//! - [`LedgerClient`]: HTTP client for a ledger query service.
//! - [`mock::MockLedger`]: in-memory oracle for tests and local development.
//!
//! ## Query Convention
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | GET    | `/v1/anchors/{reference}` | Look up an anchor reference |
//!
//! A 404 means the ledger has no such reference, which is a normal answer
//! ([`LedgerAnchorState::NotFound`]), not an error.
//!
//! No call is retried here. Callers bound the latency with their own timeout
//! and decide what a failure means.

pub mod client;
pub mod config;
pub mod error;
pub mod mock;
pub mod types;

pub use client::LedgerClient;
pub use config::LedgerConfig;
pub use error::LedgerError;
pub use types::{LedgerAnchorState, LedgerRecord};

/// Read-only view of the external integrity ledger.
#[async_trait::async_trait]
pub trait LedgerOracle: Send + Sync + std::fmt::Debug {
    /// Look up what the ledger currently says about `reference`.
    ///
    /// Returns `Ok` with [`LedgerAnchorState::NotFound`] when the ledger
    /// answered but does not know the reference. Returns `Err` only when no
    /// trustworthy answer was obtained.
    async fn lookup(&self, reference: &str) -> Result<LedgerRecord, LedgerError>;

    /// Identifier of the ledger, for logs.
    fn ledger_id(&self) -> &str;
}
