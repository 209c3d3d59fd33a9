//! # Credential Record
//!
//! A credential is a learner's claim of achievement or qualification. Beyond
//! the claim itself it carries the trust attributes that the rest of the
//! workspace manipulates: the write-once ledger anchor reference, the
//! [`AnchorStatus`], and a cached verification artifact.
//!
//! All mutation goes through methods on [`Credential`] so the invariants
//! hold no matter which storage backend holds the record:
//!
//! - `anchor_reference` is written at most once and never cleared.
//! - `anchor_status` only follows [`AnchorStatus::transition`].
//! - Skills form an ordered set (first occurrence wins).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::anchor::AnchorStatus;
use crate::error::{AnchorError, TransitionError, ValidationError};
use crate::identity::{CredentialId, SkillId, UserId};

/// Maximum length of the title and issuer name.
pub const MAX_TEXT_LEN: usize = 255;

/// Maximum number of skills on a single credential.
pub const MAX_SKILLS: usize = 50;

/// Kind of achievement a credential represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialType {
    /// Professional or vendor certification.
    Certification,
    /// Academic degree.
    Degree,
    /// Digital badge.
    Badge,
    /// Endorsement from a third party.
    Endorsement,
    /// Anything else.
    Other,
}

impl CredentialType {
    /// The canonical string name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Certification => "certification",
            Self::Degree => "degree",
            Self::Badge => "badge",
            Self::Endorsement => "endorsement",
            Self::Other => "other",
        }
    }

    /// Parse a canonical type name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "certification" => Some(Self::Certification),
            "degree" => Some(Self::Degree),
            "badge" => Some(Self::Badge),
            "endorsement" => Some(Self::Endorsement),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Who may see a credential through public read paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Served to anyone holding the id.
    #[default]
    Public,
    /// Never served through public read paths.
    Private,
}

impl Visibility {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }

    /// Parse a canonical visibility name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "public" => Some(Self::Public),
            "private" => Some(Self::Private),
            _ => None,
        }
    }
}

/// A cached scannable encoding of a credential's verification link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationArtifact {
    /// The URL the image encodes.
    pub verification_url: String,
    /// The encoded image as a data URI.
    pub image: String,
    /// When the image was produced.
    pub generated_at: DateTime<Utc>,
}

/// Input for registering a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCredential {
    /// Learner who owns the credential.
    pub owner_id: UserId,
    /// Title of the achievement.
    pub title: String,
    /// Name of the issuing organization.
    pub issuer_name: String,
    /// Kind of achievement.
    pub credential_type: CredentialType,
    /// Date the credential was issued.
    pub issue_date: NaiveDate,
    /// Optional expiry date.
    pub expiry_date: Option<NaiveDate>,
    /// Visibility on public read paths.
    pub visibility: Visibility,
    /// Associated skills, in display order.
    pub skills: Vec<SkillId>,
    /// Whether the registering party vouches for the claim (issuer-registered).
    pub verified: bool,
}

impl NewCredential {
    /// Validate field constraints.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_text("title", &self.title)?;
        check_text("issuer_name", &self.issuer_name)?;
        if let Some(expiry) = self.expiry_date {
            if expiry < self.issue_date {
                return Err(ValidationError::ExpiryBeforeIssue {
                    issued: self.issue_date.to_string(),
                    expiry: expiry.to_string(),
                });
            }
        }
        if self.skills.len() > MAX_SKILLS {
            return Err(ValidationError::TooManySkills { max: MAX_SKILLS });
        }
        Ok(())
    }
}

fn check_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    if trimmed.chars().count() > MAX_TEXT_LEN {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_TEXT_LEN,
        });
    }
    Ok(())
}

/// Deduplicate while keeping first-occurrence order.
fn ordered_skill_set(skills: Vec<SkillId>) -> Vec<SkillId> {
    let mut out: Vec<SkillId> = Vec::with_capacity(skills.len());
    for skill in skills {
        if !out.contains(&skill) {
            out.push(skill);
        }
    }
    out
}

/// A learner's credential with its trust attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Unique identifier.
    pub id: CredentialId,
    /// Owning learner.
    pub owner_id: UserId,
    /// Title of the achievement.
    pub title: String,
    /// Name of the issuing organization.
    pub issuer_name: String,
    /// Kind of achievement.
    pub credential_type: CredentialType,
    /// Date of issue.
    pub issue_date: NaiveDate,
    /// Optional expiry date.
    pub expiry_date: Option<NaiveDate>,
    /// Visibility on public read paths.
    pub visibility: Visibility,
    /// Ordered skill set.
    pub skills: Vec<SkillId>,
    /// Locally asserted verification flag.
    pub verified: bool,
    /// Ledger reference, write-once.
    pub anchor_reference: Option<String>,
    /// Position in the anchor state machine.
    pub anchor_status: AnchorStatus,
    /// When the reference was recorded.
    pub anchored_at: Option<DateTime<Utc>>,
    /// Cached verification artifact.
    pub artifact: Option<VerificationArtifact>,
    /// When the credential was revoked.
    pub revoked_at: Option<DateTime<Utc>>,
    /// Who revoked it.
    pub revoked_by: Option<UserId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

/// Field projection hashed by [`Credential::content_digest`]. Field order
/// is fixed by declaration order, which makes the JSON encoding stable.
#[derive(Serialize)]
struct DigestProjection<'a> {
    id: &'a CredentialId,
    owner_id: &'a UserId,
    title: &'a str,
    issuer_name: &'a str,
    credential_type: &'a str,
    issue_date: String,
    expiry_date: Option<String>,
}

impl Credential {
    /// Register a new credential. Starts `Unanchored` with no artifact.
    pub fn register(new: NewCredential, now: DateTime<Utc>) -> Result<Self, ValidationError> {
        new.validate()?;
        Ok(Self {
            id: CredentialId::new(),
            owner_id: new.owner_id,
            title: new.title.trim().to_string(),
            issuer_name: new.issuer_name.trim().to_string(),
            credential_type: new.credential_type,
            issue_date: new.issue_date,
            expiry_date: new.expiry_date,
            visibility: new.visibility,
            skills: ordered_skill_set(new.skills),
            verified: new.verified,
            anchor_reference: None,
            anchor_status: AnchorStatus::Unanchored,
            anchored_at: None,
            artifact: None,
            revoked_at: None,
            revoked_by: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether `user` owns this credential.
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.owner_id == user
    }

    /// Whether the credential has passed its expiry date as of `today`.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry < today)
    }

    /// Record the ledger reference together with the status it implies.
    ///
    /// Returns `Ok(false)` without touching the record when the same
    /// reference is already recorded with the same status.
    pub fn record_anchor(
        &mut self,
        reference: &str,
        status: AnchorStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, AnchorError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(AnchorError::EmptyReference);
        }

        if let Some(existing) = &self.anchor_reference {
            if existing != reference {
                return Err(AnchorError::ReferenceConflict {
                    existing: existing.clone(),
                    attempted: reference.to_string(),
                });
            }
            if self.anchor_status == status {
                return Ok(false);
            }
        }

        self.anchor_status = self.anchor_status.transition(status)?;
        if self.anchor_reference.is_none() {
            self.anchor_reference = Some(reference.to_string());
            self.anchored_at = Some(now);
        }
        self.updated_at = now;
        Ok(true)
    }

    /// Move to `to`, recording revocation metadata when `to` is `Revoked`.
    /// The anchor reference is left untouched.
    pub fn apply_status(
        &mut self,
        to: AnchorStatus,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.anchor_status = self.anchor_status.transition(to)?;
        if to == AnchorStatus::Revoked {
            self.revoked_at = Some(now);
            self.revoked_by = actor;
        }
        self.updated_at = now;
        Ok(())
    }

    /// The cached artifact, if it encodes exactly `verification_url`.
    pub fn cached_artifact_for(&self, verification_url: &str) -> Option<&VerificationArtifact> {
        self.artifact
            .as_ref()
            .filter(|a| a.verification_url == verification_url)
    }

    /// Hex SHA-256 over the claim fields. Trust attributes are excluded so
    /// the digest is stable across anchoring and revocation.
    pub fn content_digest(&self) -> String {
        let projection = DigestProjection {
            id: &self.id,
            owner_id: &self.owner_id,
            title: &self.title,
            issuer_name: &self.issuer_name,
            credential_type: self.credential_type.as_str(),
            issue_date: self.issue_date.to_string(),
            expiry_date: self.expiry_date.map(|d| d.to_string()),
        };
        // Serializing a struct of strings and UUIDs cannot fail.
        let bytes = serde_json::to_vec(&projection).unwrap_or_default();
        Sha256::digest(&bytes)
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}
