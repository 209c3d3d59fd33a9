//! # Service Configuration
//!
//! Environment-driven configuration for the API binary. Every variable has
//! a default except the secrets, whose absence disables the feature they
//! guard (sessions, persistence, the ledger oracle).

use std::str::FromStr;
use std::time::Duration;

use zeroize::Zeroizing;

use crate::middleware::rate_limit::{RateLimitConfig, RateLimitPolicy};

/// How verification artifacts are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArtifactEncoding {
    /// QR code rendered as SVG.
    #[default]
    Qr,
    /// No encoder. Artifact requests still return the verification URL.
    Off,
}

impl FromStr for ArtifactEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "qr" => Ok(Self::Qr),
            "off" | "none" => Ok(Self::Off),
            other => Err(format!("unknown artifact encoding '{other}'")),
        }
    }
}

/// Application configuration.
///
/// Custom `Debug` redacts the session secret to prevent credential leakage in logs.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Base URL used to build verification links.
    pub public_base_url: String,
    /// Shared HS256 secret for session tokens. `None` makes every caller anonymous.
    pub session_secret: Option<Zeroizing<String>>,
    /// Per-action throttling policies.
    pub rate_limits: RateLimitConfig,
    /// How often elapsed rate-limit buckets are dropped.
    pub sweep_interval: Duration,
    pub artifact_encoding: ArtifactEncoding,
    /// Upper bound on a single ledger lookup.
    pub ledger_timeout: Duration,
    /// Reverse proxies whose `X-Forwarded-For` entries are trusted. Zero
    /// keys anonymous callers by peer address.
    pub trusted_proxy_hops: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("public_base_url", &self.public_base_url)
            .field(
                "session_secret",
                &self.session_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("rate_limits", &self.rate_limits)
            .field("sweep_interval", &self.sweep_interval)
            .field("artifact_encoding", &self.artifact_encoding)
            .field("ledger_timeout", &self.ledger_timeout)
            .field("trusted_proxy_hops", &self.trusted_proxy_hops)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            public_base_url: "http://localhost:8080".to_string(),
            session_secret: None,
            rate_limits: RateLimitConfig::default(),
            sweep_interval: Duration::from_secs(30),
            artifact_encoding: ArtifactEncoding::Qr,
            ledger_timeout: Duration::from_secs(5),
            trusted_proxy_hops: 0,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `PORT` (default: 8080)
    /// - `PUBLIC_BASE_URL` (default: `http://localhost:8080`)
    /// - `SESSION_SECRET` (optional)
    /// - `RATE_LIMIT_READ`, `RATE_LIMIT_READ_WINDOW_SECS` (100 / 60)
    /// - `RATE_LIMIT_LEDGER`, `RATE_LIMIT_LEDGER_WINDOW_SECS` (5 / 60)
    /// - `RATE_LIMIT_WRITE`, `RATE_LIMIT_WRITE_WINDOW_SECS` (20 / 60)
    /// - `RATE_LIMIT_SWEEP_SECS` (30)
    /// - `ARTIFACT_ENCODING` (`qr` or `off`, default `qr`)
    /// - `LEDGER_TIMEOUT_SECS` (5)
    /// - `TRUSTED_PROXY_HOPS` (0)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let policy = |limit_var: &str, window_var: &str, default: RateLimitPolicy| {
            Ok::<_, ConfigError>(RateLimitPolicy {
                limit: parse_or(limit_var, read(limit_var), default.limit)?,
                window: Duration::from_secs(parse_or(
                    window_var,
                    read(window_var),
                    default.window.as_secs(),
                )?),
            })
        };

        let rate_limits = RateLimitConfig {
            read: policy(
                "RATE_LIMIT_READ",
                "RATE_LIMIT_READ_WINDOW_SECS",
                defaults.rate_limits.read,
            )?,
            ledger_query: policy(
                "RATE_LIMIT_LEDGER",
                "RATE_LIMIT_LEDGER_WINDOW_SECS",
                defaults.rate_limits.ledger_query,
            )?,
            write: policy(
                "RATE_LIMIT_WRITE",
                "RATE_LIMIT_WRITE_WINDOW_SECS",
                defaults.rate_limits.write,
            )?,
        };
        for (name, p) in [
            ("RATE_LIMIT_READ_WINDOW_SECS", rate_limits.read),
            ("RATE_LIMIT_LEDGER_WINDOW_SECS", rate_limits.ledger_query),
            ("RATE_LIMIT_WRITE_WINDOW_SECS", rate_limits.write),
        ] {
            if p.window.is_zero() {
                return Err(ConfigError::Invalid {
                    var: name.to_string(),
                    reason: "window must be at least one second".into(),
                });
            }
        }

        let sweep_secs: u64 = parse_or(
            "RATE_LIMIT_SWEEP_SECS",
            read("RATE_LIMIT_SWEEP_SECS"),
            defaults.sweep_interval.as_secs(),
        )?;
        if sweep_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "RATE_LIMIT_SWEEP_SECS".into(),
                reason: "interval must be at least one second".into(),
            });
        }

        Ok(Self {
            port: parse_or("PORT", read("PORT"), defaults.port)?,
            public_base_url: read("PUBLIC_BASE_URL").unwrap_or(defaults.public_base_url),
            session_secret: read("SESSION_SECRET").map(Zeroizing::new),
            rate_limits,
            sweep_interval: Duration::from_secs(sweep_secs),
            artifact_encoding: parse_or(
                "ARTIFACT_ENCODING",
                read("ARTIFACT_ENCODING"),
                defaults.artifact_encoding,
            )?,
            ledger_timeout: Duration::from_secs(parse_or(
                "LEDGER_TIMEOUT_SECS",
                read("LEDGER_TIMEOUT_SECS"),
                defaults.ledger_timeout.as_secs(),
            )?),
            trusted_proxy_hops: parse_or(
                "TRUSTED_PROXY_HOPS",
                read("TRUSTED_PROXY_HOPS"),
                defaults.trusted_proxy_hops,
            )?,
        })
    }
}

fn parse_or<T>(var: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var: var.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_map(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = from_map(&[]).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.public_base_url, "http://localhost:8080");
        assert_eq!(cfg.rate_limits.read, RateLimitPolicy::new(100, 60));
        assert_eq!(cfg.rate_limits.ledger_query, RateLimitPolicy::new(5, 60));
        assert_eq!(cfg.rate_limits.write, RateLimitPolicy::new(20, 60));
        assert_eq!(cfg.artifact_encoding, ArtifactEncoding::Qr);
        assert!(cfg.session_secret.is_none());
        assert_eq!(cfg.trusted_proxy_hops, 0);
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = from_map(&[
            ("PORT", "9000"),
            ("RATE_LIMIT_LEDGER", "2"),
            ("RATE_LIMIT_LEDGER_WINDOW_SECS", "10"),
            ("ARTIFACT_ENCODING", "off"),
            ("SESSION_SECRET", "s3cret"),
            ("TRUSTED_PROXY_HOPS", "1"),
        ])
        .unwrap();
        assert_eq!(cfg.trusted_proxy_hops, 1);
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.rate_limits.ledger_query, RateLimitPolicy::new(2, 10));
        assert_eq!(cfg.artifact_encoding, ArtifactEncoding::Off);
        assert_eq!(cfg.session_secret.as_deref().map(String::as_str), Some("s3cret"));
    }

    #[test]
    fn rejects_garbage_numbers() {
        let err = from_map(&[("RATE_LIMIT_READ", "lots")]).unwrap_err();
        assert!(err.to_string().contains("RATE_LIMIT_READ"));
    }

    #[test]
    fn rejects_zero_window() {
        assert!(from_map(&[("RATE_LIMIT_WRITE_WINDOW_SECS", "0")]).is_err());
    }

    #[test]
    fn debug_redacts_secret() {
        let cfg = from_map(&[("SESSION_SECRET", "hunter2")]).unwrap();
        let printed = format!("{cfg:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("[REDACTED]"));
    }
}
