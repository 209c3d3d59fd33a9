//! HTTP client for a ledger query service.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | GET    | `/v1/anchors/{reference}` | Look up an anchor reference |

use std::time::Duration;

use url::Url;

use crate::config::{ConfigError, LedgerConfig};
use crate::error::LedgerError;
use crate::types::LedgerRecord;
use crate::LedgerOracle;

/// Ledger oracle backed by an HTTP query service.
#[derive(Debug, Clone)]
pub struct LedgerClient {
    http: reqwest::Client,
    base_url: Url,
    ledger_id: String,
}

impl LedgerClient {
    /// Create a new client from configuration.
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(token) = &config.api_token {
            let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
                .map_err(|_| {
                    LedgerError::Config(ConfigError::InvalidToken(
                        "token contains characters not allowed in a header".into(),
                    ))
                })?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| LedgerError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;

        Ok(Self {
            http,
            base_url: config.base_url,
            ledger_id: config.ledger_id,
        })
    }

    /// Build `{base}/v1/anchors/{reference}` with the reference as a single
    /// percent-encoded path segment.
    fn anchor_url(&self, reference: &str) -> Result<Url, LedgerError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                LedgerError::Config(ConfigError::InvalidUrl(
                    "base_url".into(),
                    "cannot be a base".into(),
                ))
            })?
            .pop_if_empty()
            .extend(["v1", "anchors", reference]);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl LedgerOracle for LedgerClient {
    async fn lookup(&self, reference: &str) -> Result<LedgerRecord, LedgerError> {
        let endpoint = format!("GET /v1/anchors/{reference}");
        let url = self.anchor_url(reference)?;

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| LedgerError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(ledger = %self.ledger_id, reference, "reference not on ledger");
            return Ok(LedgerRecord::not_found(reference));
        }

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(LedgerError::ApiError {
                endpoint,
                status,
                body,
            });
        }

        resp.json()
            .await
            .map_err(|e| LedgerError::Deserialization {
                endpoint,
                source: e,
            })
    }

    fn ledger_id(&self) -> &str {
        &self.ledger_id
    }
}
