//! Ledger client configuration.
//!
//! Override via environment variables or explicit construction for
//! staging/testing.

use url::Url;
use zeroize::Zeroizing;

/// Configuration for connecting to the ledger query service.
///
/// Custom `Debug` implementation redacts the `api_token` field
/// to prevent credential leakage in log output.
#[derive(Clone)]
pub struct LedgerConfig {
    /// Base URL of the ledger query service.
    pub base_url: Url,
    /// Optional bearer token for the query service.
    pub api_token: Option<Zeroizing<String>>,
    /// Transport timeout in seconds.
    pub timeout_secs: u64,
    /// Name used in logs.
    pub ledger_id: String,
}

impl std::fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("ledger_id", &self.ledger_id)
            .finish()
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `LEDGER_URL` (required)
    /// - `LEDGER_API_TOKEN` (optional)
    /// - `LEDGER_TIMEOUT_SECS` (default: 5)
    /// - `LEDGER_ID` (default: the URL host)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw = lookup("LEDGER_URL").ok_or(ConfigError::MissingUrl)?;
        let base_url = parse_url("LEDGER_URL", &raw)?;
        let ledger_id = lookup("LEDGER_ID")
            .or_else(|| base_url.host_str().map(str::to_string))
            .unwrap_or_else(|| "ledger".to_string());

        let timeout_secs = match lookup("LEDGER_TIMEOUT_SECS") {
            None => 5,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(0) => {
                    return Err(ConfigError::InvalidTimeout(
                        raw,
                        "must be at least one second".into(),
                    ))
                }
                Ok(secs) => secs,
                Err(e) => return Err(ConfigError::InvalidTimeout(raw, e.to_string())),
            },
        };

        Ok(Self {
            base_url,
            api_token: lookup("LEDGER_API_TOKEN").map(Zeroizing::new),
            timeout_secs,
            ledger_id,
        })
    }

    /// Create a configuration pointing to a local mock server (for testing).
    pub fn local_mock(uri: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_url("local_mock", uri)?,
            api_token: None,
            timeout_secs: 2,
            ledger_id: "mock-ledger".to_string(),
        })
    }
}

fn parse_url(var: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("LEDGER_URL environment variable is required")]
    MissingUrl,
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid API token: {0}")]
    InvalidToken(String),
    #[error("invalid value '{0}' for LEDGER_TIMEOUT_SECS: {1}")]
    InvalidTimeout(String, String),
}
