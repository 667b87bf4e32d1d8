use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::{User, USER_COLUMNS};

impl User {
    /// Applies whichever of `name`/`country` is given. `None` when the user
    /// no longer exists.
    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        name: Option<&str>,
        country: Option<&str>,
    ) -> anyhow::Result<Option<User>> {
        let sql = format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                country = COALESCE($3, country),
                updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(name)
            .bind(country)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    /// `None` resets the image to the default avatar.
    pub async fn set_image(
        db: &PgPool,
        id: Uuid,
        image: Option<&str>,
    ) -> anyhow::Result<Option<User>> {
        let sql = format!(
            "UPDATE users SET image = $2, updated_at = now() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(image)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    /// Watchlist rows go with the user (ON DELETE CASCADE).
    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn set_subscription(db: &PgPool, id: Uuid, subscribed: bool) -> anyhow::Result<bool> {
        let res = sqlx::query(
            "UPDATE users SET email_subscribed = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(subscribed)
        .execute(db)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Used by the tokenized unsubscribe links. Returns the number of rows
    /// touched; zero is not an error.
    pub async fn set_subscription_by_email(
        db: &PgPool,
        email: &str,
        subscribed: bool,
    ) -> anyhow::Result<u64> {
        let res = sqlx::query(
            "UPDATE users SET email_subscribed = $2, updated_at = now() WHERE email = $1",
        )
        .bind(email)
        .bind(subscribed)
        .execute(db)
        .await?;
        Ok(res.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::repo_types::NewUser, db::test_pool};

    async fn create(db: &PgPool) -> User {
        User::create(
            db,
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
        .unwrap()
    }

    #[tokio::test]
    async fn profile_image_and_subscription_updates() {
        let Some(db) = test_pool().await else { return };
        let user = create(&db).await;

        let updated = User::update_profile(&db, user.id, None, Some("DE"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Jane");
        assert_eq!(updated.country, "DE");

        let with_image = User::set_image(&db, user.id, Some("https://img.test/a.png"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(with_image.image.as_deref(), Some("https://img.test/a.png"));
        let reset = User::set_image(&db, user.id, None).await.unwrap().unwrap();
        assert!(reset.image.is_none());

        assert_eq!(
            User::set_subscription_by_email(&db, &user.email, false).await.unwrap(),
            1
        );
        let reloaded = User::find_by_id(&db, user.id).await.unwrap().unwrap();
        assert!(!reloaded.email_subscribed);

        assert!(User::delete(&db, user.id).await.unwrap());
        assert!(User::find_by_id(&db, user.id).await.unwrap().is_none());
    }
}
