//! Read access to the `user_connections` table.

use sqlx::PgPool;
use uuid::Uuid;

use credtrust_core::UserId;

/// Load every accepted connection as an unordered pair.
pub async fn load_all(pool: &PgPool) -> Result<Vec<(UserId, UserId)>, sqlx::Error> {
    let rows: Vec<(Uuid, Uuid)> = sqlx::query_as("SELECT user_a, user_b FROM user_connections")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(a, b)| (UserId::from_uuid(a), UserId::from_uuid(b)))
        .collect())
}
