use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::watchlist::repo::WatchlistItem;

/// A user who should receive the daily digest.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Subscriber {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

/// Read side the digest job needs from persistence.
#[async_trait]
pub trait DigestStore: Send + Sync {
    async fn subscribed_users(&self) -> anyhow::Result<Vec<Subscriber>>;
    async fn watchlist_symbols(&self, user_id: Uuid) -> anyhow::Result<Vec<String>>;
}

#[derive(Clone)]
pub struct PgDigestStore {
    db: PgPool,
}

impl PgDigestStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DigestStore for PgDigestStore {
    async fn subscribed_users(&self) -> anyhow::Result<Vec<Subscriber>> {
        let rows = sqlx::query_as::<_, Subscriber>(
            r#"
            SELECT id, email, name
            FROM users
            WHERE email <> '' AND name <> '' AND email_subscribed IS NOT FALSE
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn watchlist_symbols(&self, user_id: Uuid) -> anyhow::Result<Vec<String>> {
        WatchlistItem::symbols_for_user(&self.db, user_id).await
    }
}
