//! Ledger client error types.

/// Errors from ledger queries. Any of these means "no trustworthy answer".
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// HTTP transport error (connection refused, transport timeout, TLS).
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The ledger returned a non-2xx status other than 404.
    #[error("ledger {endpoint} returned {status}: {body}")]
    ApiError {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The oracle reported itself unavailable.
    #[error("ledger {0} unavailable")]
    Unavailable(String),
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}
