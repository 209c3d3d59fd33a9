//! In-memory view of accepted user connections.
//!
//! Connections are owned by the external profile service. This directory
//! is read when annotating credential views with the viewer's relationship
//! to the owner, and hydrated from `user_connections` when a database is
//! configured.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use sqlx::PgPool;

use credtrust_core::UserId;

#[derive(Debug, Clone, Default)]
pub struct ConnectionDirectory {
    pairs: Arc<RwLock<HashSet<(UserId, UserId)>>>,
}

fn ordered(a: UserId, b: UserId) -> (UserId, UserId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl ConnectionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a symmetric connection.
    pub fn connect(&self, a: UserId, b: UserId) {
        self.pairs.write().insert(ordered(a, b));
    }

    pub fn are_connected(&self, a: UserId, b: UserId) -> bool {
        a != b && self.pairs.read().contains(&ordered(a, b))
    }

    /// Replace the directory contents from the database.
    pub async fn hydrate(&self, pool: &PgPool) -> Result<usize, sqlx::Error> {
        let rows = crate::db::connections::load_all(pool).await?;
        let fresh: HashSet<_> = rows.into_iter().map(|(a, b)| ordered(a, b)).collect();
        let count = fresh.len();
        *self.pairs.write() = fresh;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connections_are_symmetric() {
        let dir = ConnectionDirectory::new();
        let (a, b) = (UserId::new(), UserId::new());
        dir.connect(a, b);
        assert!(dir.are_connected(a, b));
        assert!(dir.are_connected(b, a));
        assert!(!dir.are_connected(a, UserId::new()));
    }

    #[test]
    fn self_is_not_a_connection() {
        let dir = ConnectionDirectory::new();
        let a = UserId::new();
        dir.connect(a, a);
        assert!(!dir.are_connected(a, a));
    }
}
