use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::{error, info, instrument, warn};

use super::token;
use crate::{
    auth::{dto::MessageResponse, repo_types::User},
    error::ApiError,
    mailer::mask_email,
    state::AppState,
};

pub fn subscription_routes() -> Router<AppState> {
    Router::new()
        .route("/unsubscribe", get(unsubscribe_link).post(unsubscribe))
        .route("/subscribe", post(subscribe))
}

#[derive(Debug, Deserialize)]
pub struct TokenParams {
    pub token: Option<String>,
}

enum TokenError {
    Missing,
    Invalid,
}

fn verified_email(state: &AppState, token: Option<&str>) -> Result<String, TokenError> {
    let token = token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(TokenError::Missing)?;
    let check = token::verify(&state.config.unsubscribe_secret, token);
    if !check.valid || check.email.is_empty() {
        return Err(TokenError::Invalid);
    }
    Ok(check.email)
}

/// Flips the flag for `email`. An address with no account still counts as
/// done, so a stale link never reveals whether the account exists.
async fn set_subscription(state: &AppState, email: &str, subscribed: bool) -> anyhow::Result<()> {
    let rows = User::set_subscription_by_email(&state.db, email, subscribed).await?;
    info!(to = %mask_email(email), subscribed, rows, "subscription updated via token");
    Ok(())
}

/// One-click link from the digest footer; answers with a redirect to the
/// unsubscribe page.
#[instrument(skip(state, params))]
pub async fn unsubscribe_link(
    State(state): State<AppState>,
    Query(params): Query<TokenParams>,
) -> Redirect {
    let page = format!("{}/unsubscribe", state.config.base_url);
    let email = match verified_email(&state, params.token.as_deref()) {
        Ok(email) => email,
        Err(TokenError::Missing) => return Redirect::to(&format!("{page}?error=missing_token")),
        Err(TokenError::Invalid) => {
            warn!("unsubscribe link with invalid token");
            return Redirect::to(&format!("{page}?error=invalid_token"));
        }
    };

    match set_subscription(&state, &email, false).await {
        Ok(()) => Redirect::to(&format!("{page}?success=true")),
        Err(e) => {
            error!(error = %format!("{e:#}"), "unsubscribe update failed");
            Redirect::to(&format!("{page}?error=update_failed"))
        }
    }
}

async fn apply_token(
    state: &AppState,
    token: Option<&str>,
    subscribed: bool,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = verified_email(state, token).map_err(|e| match e {
        TokenError::Missing => ApiError::Validation("Token is required".into()),
        TokenError::Invalid => ApiError::Validation("Invalid or expired token".into()),
    })?;
    set_subscription(state, &email, subscribed).await?;
    Ok(Json(MessageResponse::ok(if subscribed {
        "Successfully resubscribed"
    } else {
        "Successfully unsubscribed"
    })))
}

#[instrument(skip(state, payload))]
pub async fn unsubscribe(
    State(state): State<AppState>,
    Json(payload): Json<TokenParams>,
) -> Result<Json<MessageResponse>, ApiError> {
    apply_token(&state, payload.token.as_deref(), false).await
}

#[instrument(skip(state, payload))]
pub async fn subscribe(
    State(state): State<AppState>,
    Json(payload): Json<TokenParams>,
) -> Result<Json<MessageResponse>, ApiError> {
    apply_token(&state, payload.token.as_deref(), true).await
}
