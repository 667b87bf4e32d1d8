use axum::{
    extract::State,
    http::header::SET_COOKIE,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{SubscriptionStatus, UpdateImageRequest, UpdateProfileRequest};
use crate::{
    auth::{
        dto::{MessageResponse, PublicUser},
        jwt::AuthUser,
        repo_types::User,
        services::clear_session_cookie,
    },
    error::ApiError,
    state::AppState,
};

const MAX_NAME_LEN: usize = 100;
const MAX_IMAGE_URL_LEN: usize = 2048;

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me).patch(update_me).delete(delete_me))
        .route("/me/image", put(update_image))
        .route(
            "/me/subscription",
            get(get_subscription).put(update_subscription),
        )
}

fn clean_field(value: Option<String>, field: &str) -> Result<Option<String>, ApiError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if v.is_empty() => Err(ApiError::Validation(format!("{field} cannot be empty"))),
        Some(v) if v.chars().count() > MAX_NAME_LEN => {
            Err(ApiError::Validation(format!("{field} is too long")))
        }
        other => Ok(other),
    }
}

fn validate_image(image: Option<String>) -> Result<Option<String>, ApiError> {
    let Some(url) = image.map(|u| u.trim().to_string()) else {
        return Ok(None);
    };
    if url.len() > MAX_IMAGE_URL_LEN
        || !(url.starts_with("https://") || url.starts_with("http://"))
    {
        return Err(ApiError::Validation("Image must be an http(s) URL".into()));
    }
    Ok(Some(url))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::UserNotFound)?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<PublicUser>, ApiError> {
    let name = clean_field(payload.name, "Name")?;
    let country = clean_field(payload.country, "Country")?;

    let user = User::update_profile(&state.db, user_id, name.as_deref(), country.as_deref())
        .await?
        .ok_or(ApiError::UserNotFound)?;
    info!(%user_id, "profile updated");
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateImageRequest>,
) -> Result<Json<PublicUser>, ApiError> {
    let image = validate_image(payload.image)?;
    let user = User::set_image(&state.db, user_id, image.as_deref())
        .await?
        .ok_or(ApiError::UserNotFound)?;
    info!(%user_id, reset = user.image.is_none(), "profile image updated");
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn delete_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    if !User::delete(&state.db, user_id).await? {
        return Err(ApiError::UserNotFound);
    }
    info!(%user_id, "account deleted");
    Ok((
        [(SET_COOKIE, clear_session_cookie())],
        Json(MessageResponse::ok("Account deleted")),
    ))
}

#[instrument(skip(state))]
pub async fn get_subscription(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<SubscriptionStatus>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::UserNotFound)?;
    Ok(Json(SubscriptionStatus {
        subscribed: user.email_subscribed,
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_subscription(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<SubscriptionStatus>,
) -> Result<Json<SubscriptionStatus>, ApiError> {
    if !User::set_subscription(&state.db, user_id, payload.subscribed).await? {
        return Err(ApiError::UserNotFound);
    }
    info!(%user_id, subscribed = payload.subscribed, "digest subscription changed");
    Ok(Json(payload))
}
