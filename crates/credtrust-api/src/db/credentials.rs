//! Credential persistence operations.
//!
//! All functions take a `&PgPool` and operate on the `credentials` and
//! `credential_skills` tables. Write-once and state machine rules are
//! enforced in memory before anything reaches SQL; the `UNIQUE` constraint
//! on `anchor_reference` is a backstop.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use credtrust_core::{
    AnchorStatus, Credential, CredentialId, CredentialType, SkillId, UserId,
    VerificationArtifact, Visibility,
};

/// Insert a credential with its skill set in one transaction.
pub async fn insert(pool: &PgPool, record: &Credential) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO credentials (id, owner_id, title, issuer_name, credential_type, issue_date,
             expiry_date, visibility, verified, anchor_reference, anchor_status, anchored_at,
             artifact_url, artifact_image, artifact_generated_at, revoked_at, revoked_by,
             created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)",
    )
    .bind(record.id.as_uuid())
    .bind(record.owner_id.as_uuid())
    .bind(&record.title)
    .bind(&record.issuer_name)
    .bind(record.credential_type.as_str())
    .bind(record.issue_date)
    .bind(record.expiry_date)
    .bind(record.visibility.as_str())
    .bind(record.verified)
    .bind(record.anchor_reference.as_deref())
    .bind(record.anchor_status.as_str())
    .bind(record.anchored_at)
    .bind(record.artifact.as_ref().map(|a| a.verification_url.as_str()))
    .bind(record.artifact.as_ref().map(|a| a.image.as_str()))
    .bind(record.artifact.as_ref().map(|a| a.generated_at))
    .bind(record.revoked_at)
    .bind(record.revoked_by.map(|u| *u.as_uuid()))
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(&mut *tx)
    .await?;

    for (position, skill) in record.skills.iter().enumerate() {
        sqlx::query(
            "INSERT INTO credential_skills (credential_id, skill_id, position) VALUES ($1, $2, $3)",
        )
        .bind(record.id.as_uuid())
        .bind(skill.as_uuid())
        .bind(i32::try_from(position).unwrap_or(i32::MAX))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}

/// Persist the trust attributes (anchor, status, artifact, revocation).
///
/// Claim fields are immutable after registration and are not rewritten.
pub async fn update_trust_attributes(
    pool: &PgPool,
    record: &Credential,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE credentials SET anchor_reference = $1, anchor_status = $2, anchored_at = $3,
             artifact_url = $4, artifact_image = $5, artifact_generated_at = $6,
             revoked_at = $7, revoked_by = $8, updated_at = $9
         WHERE id = $10",
    )
    .bind(record.anchor_reference.as_deref())
    .bind(record.anchor_status.as_str())
    .bind(record.anchored_at)
    .bind(record.artifact.as_ref().map(|a| a.verification_url.as_str()))
    .bind(record.artifact.as_ref().map(|a| a.image.as_str()))
    .bind(record.artifact.as_ref().map(|a| a.generated_at))
    .bind(record.revoked_at)
    .bind(record.revoked_by.map(|u| *u.as_uuid()))
    .bind(record.updated_at)
    .bind(record.id.as_uuid())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a credential. Skill rows cascade.
pub async fn delete(pool: &PgPool, id: CredentialId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM credentials WHERE id = $1")
        .bind(id.as_uuid())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Load all credentials with their skill sets, for hydration on boot.
///
/// A row with an unrecognized enum value fails the whole load: guessing a
/// status could resurrect a revoked credential.
pub async fn load_all(pool: &PgPool) -> Result<Vec<Credential>, sqlx::Error> {
    let rows = sqlx::query_as::<_, CredentialRow>(
        "SELECT id, owner_id, title, issuer_name, credential_type, issue_date, expiry_date,
                visibility, verified, anchor_reference, anchor_status, anchored_at,
                artifact_url, artifact_image, artifact_generated_at, revoked_at, revoked_by,
                created_at, updated_at
         FROM credentials ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    let skill_rows: Vec<(Uuid, Uuid)> = sqlx::query_as(
        "SELECT credential_id, skill_id FROM credential_skills ORDER BY credential_id, position",
    )
    .fetch_all(pool)
    .await?;

    let mut skills: HashMap<Uuid, Vec<SkillId>> = HashMap::new();
    for (credential_id, skill_id) in skill_rows {
        skills
            .entry(credential_id)
            .or_default()
            .push(SkillId::from_uuid(skill_id));
    }

    rows.into_iter()
        .map(|row| {
            let skill_set = skills.remove(&row.id).unwrap_or_default();
            row.into_record(skill_set)
        })
        .collect()
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: Uuid,
    owner_id: Uuid,
    title: String,
    issuer_name: String,
    credential_type: String,
    issue_date: NaiveDate,
    expiry_date: Option<NaiveDate>,
    visibility: String,
    verified: bool,
    anchor_reference: Option<String>,
    anchor_status: String,
    anchored_at: Option<DateTime<Utc>>,
    artifact_url: Option<String>,
    artifact_image: Option<String>,
    artifact_generated_at: Option<DateTime<Utc>>,
    revoked_at: Option<DateTime<Utc>>,
    revoked_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn decode_error(id: Uuid, column: &str, value: &str) -> sqlx::Error {
    tracing::error!(%id, column, value, "unrecognized value in credentials row");
    sqlx::Error::Decode(
        format!("credential {id}: unrecognized {column} value '{value}'").into(),
    )
}

impl CredentialRow {
    fn into_record(self, skills: Vec<SkillId>) -> Result<Credential, sqlx::Error> {
        let credential_type = CredentialType::from_name(&self.credential_type)
            .ok_or_else(|| decode_error(self.id, "credential_type", &self.credential_type))?;
        let visibility = Visibility::from_name(&self.visibility)
            .ok_or_else(|| decode_error(self.id, "visibility", &self.visibility))?;
        let anchor_status = AnchorStatus::from_name(&self.anchor_status)
            .ok_or_else(|| decode_error(self.id, "anchor_status", &self.anchor_status))?;

        let artifact = match (self.artifact_url, self.artifact_image, self.artifact_generated_at) {
            (Some(verification_url), Some(image), Some(generated_at)) => {
                Some(VerificationArtifact {
                    verification_url,
                    image,
                    generated_at,
                })
            }
            _ => None,
        };

        Ok(Credential {
            id: CredentialId::from_uuid(self.id),
            owner_id: UserId::from_uuid(self.owner_id),
            title: self.title,
            issuer_name: self.issuer_name,
            credential_type,
            issue_date: self.issue_date,
            expiry_date: self.expiry_date,
            visibility,
            skills,
            verified: self.verified,
            anchor_reference: self.anchor_reference,
            anchor_status,
            anchored_at: self.anchored_at,
            artifact,
            revoked_at: self.revoked_at,
            revoked_by: self.revoked_by.map(UserId::from_uuid),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
