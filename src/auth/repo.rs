use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User, USER_COLUMNS};

impl User {
    /// Find a user by (lower-cased) email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    /// Create a new user. New accounts are subscribed to the digest.
    pub async fn create(db: &PgPool, new: &NewUser) -> anyhow::Result<User> {
        let sql = format!(
            r#"
            INSERT INTO users (email, password_hash, name, country,
                               investment_goals, risk_tolerance, preferred_industry)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(&new.email)
            .bind(&new.password_hash)
            .bind(&new.name)
            .bind(&new.country)
            .bind(&new.investment_goals)
            .bind(&new.risk_tolerance)
            .bind(&new.preferred_industry)
            .fetch_one(db)
            .await?;
        Ok(user)
    }

    /// Returns false when no such user exists.
    pub async fn set_password(db: &PgPool, id: Uuid, password_hash: &str) -> anyhow::Result<bool> {
        let res = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(db)
        .await?;
        Ok(res.rows_affected() > 0)
    }
}

/// True when the error came from a unique constraint, e.g. a duplicate email
/// inserted between the existence check and the insert.
pub fn is_unique_violation(e: &anyhow::Error) -> bool {
    e.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .map_or(false, |db_err| db_err.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.into(),
            password_hash: "hash".into(),
            name: "Jane".into(),
            country: "US".into(),
            investment_goals: Some("Growth".into()),
            risk_tolerance: None,
            preferred_industry: None,
        }
    }

    #[tokio::test]
    async fn create_then_find_by_email_and_id() {
        let Some(db) = test_pool().await else { return };
        let email = format!("{}@example.com", Uuid::new_v4());
        let created = User::create(&db, &new_user(&email)).await.unwrap();
        assert!(created.email_subscribed);

        let by_email = User::find_by_email(&db, &email).await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);
        let by_id = User::find_by_id(&db, created.id).await.unwrap().unwrap();
        assert_eq!(by_id.investment_goals.as_deref(), Some("Growth"));

        assert!(User::set_password(&db, created.id, "other").await.unwrap());
        assert!(!User::set_password(&db, Uuid::new_v4(), "other").await.unwrap());
    }

    #[test]
    fn only_database_unique_errors_count_as_violations() {
        assert!(!is_unique_violation(&anyhow::anyhow!("boom")));
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound.into()));
    }

    #[tokio::test]
    async fn duplicate_email_insert_is_a_unique_violation() {
        let Some(db) = test_pool().await else { return };
        let email = format!("{}@example.com", Uuid::new_v4());
        User::create(&db, &new_user(&email)).await.unwrap();

        let err = User::create(&db, &new_user(&email)).await.unwrap_err();
        assert!(is_unique_violation(&err));
    }
}
