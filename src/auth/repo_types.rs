use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // argon2, never exposed
    pub name: String,
    pub country: String,
    pub image: Option<String>,
    pub email_subscribed: bool,
    pub investment_goals: Option<String>,
    pub risk_tolerance: Option<String>,
    pub preferred_industry: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Values for a new row; `password_hash` is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub country: String,
    pub investment_goals: Option<String>,
    pub risk_tolerance: Option<String>,
    pub preferred_industry: Option<String>,
}

pub(crate) const USER_COLUMNS: &str = "id, email, password_hash, name, country, image, \
     email_subscribed, investment_goals, risk_tolerance, preferred_industry, created_at, updated_at";
