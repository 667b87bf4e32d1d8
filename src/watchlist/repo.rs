use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WatchlistItem {
    pub user_id: Uuid,
    pub symbol: String,
    pub company: String,
    #[serde(with = "time::serde::rfc3339")]
    pub added_at: OffsetDateTime,
}

/// Trimmed, upper-cased ticker; `None` if it cannot be a ticker.
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let symbol = raw.trim().to_uppercase();
    let valid = !symbol.is_empty()
        && symbol.len() <= 20
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '^'));
    valid.then_some(symbol)
}

impl WatchlistItem {
    /// Insert or refresh `(user_id, symbol)`; adding twice keeps one row.
    pub async fn add(
        db: &PgPool,
        user_id: Uuid,
        symbol: &str,
        company: &str,
    ) -> anyhow::Result<WatchlistItem> {
        let item = sqlx::query_as::<_, WatchlistItem>(
            r#"
            INSERT INTO watchlist (user_id, symbol, company)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, symbol)
            DO UPDATE SET company = EXCLUDED.company, added_at = now()
            RETURNING user_id, symbol, company, added_at
            "#,
        )
        .bind(user_id)
        .bind(symbol)
        .bind(company)
        .fetch_one(db)
        .await?;
        Ok(item)
    }

    pub async fn remove(db: &PgPool, user_id: Uuid, symbol: &str) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM watchlist WHERE user_id = $1 AND symbol = $2")
            .bind(user_id)
            .bind(symbol)
            .execute(db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Oldest first, the order the digest presents sections in.
    pub async fn list_for_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<WatchlistItem>> {
        let rows = sqlx::query_as::<_, WatchlistItem>(
            r#"
            SELECT user_id, symbol, company, added_at
            FROM watchlist
            WHERE user_id = $1
            ORDER BY added_at, symbol
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn symbols_for_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<String>> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT symbol FROM watchlist WHERE user_id = $1 ORDER BY added_at, symbol",
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn contains(db: &PgPool, user_id: Uuid, symbol: &str) -> anyhow::Result<bool> {
        let found = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM watchlist WHERE user_id = $1 AND symbol = $2)",
        )
        .bind(user_id)
        .bind(symbol)
        .fetch_one(db)
        .await?;
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::repo_types::{NewUser, User},
        db::test_pool,
    };

    #[test]
    fn symbols_are_trimmed_and_upper_cased() {
        assert_eq!(normalize_symbol("  aapl ").as_deref(), Some("AAPL"));
        assert_eq!(normalize_symbol("brk.b").as_deref(), Some("BRK.B"));
        assert_eq!(normalize_symbol(""), None);
        assert_eq!(normalize_symbol("AA PL"), None);
        assert_eq!(normalize_symbol(&"X".repeat(21)), None);
    }

    #[tokio::test]
    async fn add_then_remove_restores_prior_state() {
        let Some(db) = test_pool().await else { return };
        let user = User::create(
            &db,
            &NewUser {
                email: format!("{}@example.com", Uuid::new_v4()),
                password_hash: "hash".into(),
                name: "Jane".into(),
                country: "US".into(),
                investment_goals: None,
                risk_tolerance: None,
                preferred_industry: None,
            },
        )
        .await
        .unwrap();

        WatchlistItem::add(&db, user.id, "MSFT", "Microsoft").await.unwrap();
        let before = WatchlistItem::symbols_for_user(&db, user.id).await.unwrap();

        WatchlistItem::add(&db, user.id, "AAPL", "Apple").await.unwrap();
        // Upsert: a second add does not duplicate the row.
        WatchlistItem::add(&db, user.id, "AAPL", "Apple Inc").await.unwrap();
        assert!(WatchlistItem::contains(&db, user.id, "AAPL").await.unwrap());
        assert_eq!(
            WatchlistItem::symbols_for_user(&db, user.id).await.unwrap().len(),
            before.len() + 1
        );

        assert!(WatchlistItem::remove(&db, user.id, "AAPL").await.unwrap());
        assert_eq!(WatchlistItem::symbols_for_user(&db, user.id).await.unwrap(), before);
        assert!(!WatchlistItem::remove(&db, user.id, "AAPL").await.unwrap());

        User::delete(&db, user.id).await.unwrap();
        assert!(WatchlistItem::list_for_user(&db, user.id).await.unwrap().is_empty());
    }
}
