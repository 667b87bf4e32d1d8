use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("connect to database")?;
    Ok(db)
}

/// Round-trips a trivial query; used by `marketpulse check-db`.
pub async fn check_connection(db: &PgPool) -> anyhow::Result<()> {
    let one: i32 = sqlx::query_scalar("SELECT 1")
        .fetch_one(db)
        .await
        .context("database ping")?;
    anyhow::ensure!(one == 1, "unexpected ping result {one}");
    info!("database connection ok");
    Ok(())
}

/// Pool for repository tests, when `TEST_DATABASE_URL` points at a scratch
/// database. Migrations are applied on connect.
#[cfg(test)]
pub async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let db = connect(&url).await.ok()?;
    sqlx::migrate!("./migrations").run(&db).await.ok()?;
    Some(db)
}
