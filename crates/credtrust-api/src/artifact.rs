//! # Verification Artifact Generator
//!
//! Produces a scannable encoding of a credential's public verification
//! link. The link is always returned; the image is best-effort and comes
//! back as `None` when no encoder is configured or encoding fails.
//!
//! Generated images are cached on the record together with the URL they
//! encode, and reused only while that URL is unchanged.

use std::sync::Arc;

use base64::Engine;
use chrono::Utc;
use qrcode::render::svg;
use qrcode::QrCode;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use credtrust_core::{CredentialId, VerificationArtifact};

use crate::store::{CredentialStore, StoreError};

/// Turns a URL into an image, returned as a data URI.
pub trait ArtifactEncoder: Send + Sync + std::fmt::Debug {
    fn encode(&self, payload: &str) -> Result<String, ArtifactError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("QR encoding failed: {0}")]
    Qr(#[from] qrcode::types::QrError),
}

/// QR code rendered as SVG, wrapped in a `data:image/svg+xml;base64,` URI.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrSvgEncoder;

impl ArtifactEncoder for QrSvgEncoder {
    fn encode(&self, payload: &str) -> Result<String, ArtifactError> {
        let code = QrCode::new(payload.as_bytes())?;
        let image = code
            .render::<svg::Color<'_>>()
            .min_dimensions(200, 200)
            .quiet_zone(true)
            .build();
        let encoded = base64::engine::general_purpose::STANDARD.encode(image.as_bytes());
        Ok(format!("data:image/svg+xml;base64,{encoded}"))
    }
}

/// Response for artifact requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactResponse {
    /// Data URI of the encoded image, `null` when unavailable.
    pub artifact: Option<String>,
    pub verification_url: String,
}

#[derive(Debug, Clone)]
pub struct ArtifactGenerator {
    store: CredentialStore,
    base_url: String,
    encoder: Option<Arc<dyn ArtifactEncoder>>,
}

impl ArtifactGenerator {
    pub fn new(
        store: CredentialStore,
        base_url: &str,
        encoder: Option<Arc<dyn ArtifactEncoder>>,
    ) -> Self {
        Self {
            store,
            base_url: base_url.trim_end_matches('/').to_string(),
            encoder,
        }
    }

    /// `{base}/verify/{id}`.
    pub fn verification_url(&self, id: CredentialId) -> String {
        format!("{}/verify/{id}", self.base_url)
    }

    /// Produce (or reuse) the artifact for `id`.
    pub async fn generate(&self, id: CredentialId) -> Result<ArtifactResponse, StoreError> {
        let credential = self.store.get(id)?;
        let verification_url = self.verification_url(id);

        if let Some(cached) = credential.cached_artifact_for(&verification_url) {
            return Ok(ArtifactResponse {
                artifact: Some(cached.image.clone()),
                verification_url,
            });
        }

        let Some(encoder) = &self.encoder else {
            return Ok(ArtifactResponse {
                artifact: None,
                verification_url,
            });
        };

        let image = match encoder.encode(&verification_url) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(credential_id = %id, error = %e, "artifact encoding failed");
                return Ok(ArtifactResponse {
                    artifact: None,
                    verification_url,
                });
            }
        };

        let artifact = VerificationArtifact {
            verification_url: verification_url.clone(),
            image: image.clone(),
            generated_at: Utc::now(),
        };
        match self.store.set_artifact(id, artifact).await {
            Ok(_) => {}
            Err(StoreError::NotFound(id)) => return Err(StoreError::NotFound(id)),
            Err(e) => {
                tracing::warn!(credential_id = %id, error = %e, "failed to cache artifact");
            }
        }

        Ok(ArtifactResponse {
            artifact: Some(image),
            verification_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use credtrust_core::{CredentialType, NewCredential, UserId, Visibility};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingEncoder {
        calls: AtomicUsize,
    }

    impl ArtifactEncoder for CountingEncoder {
        fn encode(&self, payload: &str) -> Result<String, ArtifactError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("data:text/plain,{payload}"))
        }
    }

    #[derive(Debug)]
    struct FailingEncoder;

    impl ArtifactEncoder for FailingEncoder {
        fn encode(&self, _payload: &str) -> Result<String, ArtifactError> {
            Err(ArtifactError::Qr(qrcode::types::QrError::DataTooLong))
        }
    }

    async fn seeded() -> (CredentialStore, CredentialId) {
        let store = CredentialStore::new();
        let cred = store
            .create(NewCredential {
                owner_id: UserId::new(),
                title: "Data Engineering".into(),
                issuer_name: "Bootcamp".into(),
                credential_type: CredentialType::Badge,
                issue_date: NaiveDate::from_ymd_opt(2025, 2, 2).unwrap(),
                expiry_date: None,
                visibility: Visibility::Public,
                skills: vec![],
                verified: false,
            })
            .await
            .unwrap();
        (store, cred.id)
    }

    #[test]
    fn url_trims_trailing_slashes() {
        let gen = ArtifactGenerator::new(CredentialStore::new(), "https://example.org//", None);
        let id = CredentialId::new();
        assert_eq!(
            gen.verification_url(id),
            format!("https://example.org/verify/{id}")
        );
    }

    #[test]
    fn qr_encoder_produces_svg_data_uri() {
        let uri = QrSvgEncoder.encode("https://example.org/verify/abc").unwrap();
        let payload = uri.strip_prefix("data:image/svg+xml;base64,").unwrap();
        let svg = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .unwrap();
        let svg = String::from_utf8(svg).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[tokio::test]
    async fn caches_and_reuses_artifact() {
        let (store, id) = seeded().await;
        let encoder = Arc::new(CountingEncoder::default());
        let gen = ArtifactGenerator::new(store.clone(), "https://a.test", Some(encoder.clone()));

        let first = gen.generate(id).await.unwrap();
        let second = gen.generate(id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 1);
        assert!(store.get(id).unwrap().artifact.is_some());
    }

    #[tokio::test]
    async fn regenerates_when_base_url_changes() {
        let (store, id) = seeded().await;
        let encoder = Arc::new(CountingEncoder::default());
        ArtifactGenerator::new(store.clone(), "https://old.test", Some(encoder.clone()))
            .generate(id)
            .await
            .unwrap();
        let fresh = ArtifactGenerator::new(store.clone(), "https://new.test", Some(encoder.clone()))
            .generate(id)
            .await
            .unwrap();
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 2);
        assert!(fresh.artifact.unwrap().contains("new.test"));
    }

    #[tokio::test]
    async fn missing_encoder_returns_url_only() {
        let (store, id) = seeded().await;
        let resp = ArtifactGenerator::new(store, "https://a.test", None)
            .generate(id)
            .await
            .unwrap();
        assert!(resp.artifact.is_none());
        assert_eq!(resp.verification_url, format!("https://a.test/verify/{id}"));
    }

    #[tokio::test]
    async fn failing_encoder_is_not_an_error() {
        let (store, id) = seeded().await;
        let resp = ArtifactGenerator::new(store.clone(), "https://a.test", Some(Arc::new(FailingEncoder)))
            .generate(id)
            .await
            .unwrap();
        assert!(resp.artifact.is_none());
        assert!(store.get(id).unwrap().artifact.is_none());
    }

    #[tokio::test]
    async fn unknown_credential_is_not_found() {
        let gen = ArtifactGenerator::new(CredentialStore::new(), "https://a.test", None);
        assert!(matches!(
            gen.generate(CredentialId::new()).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
