use axum::{
    extract::{FromRef, State},
    http::{header::SET_COOKIE, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, ForgotPasswordRequest, MessageResponse, RefreshRequest,
            ResetPasswordRequest, SignInRequest, SignUpRequest, TokenKind,
        },
        jwt::JwtKeys,
        password::{hash_password_blocking, validate_password, verify_password_blocking},
        repo::is_unique_violation,
        repo_types::{NewUser, User},
        services::{
            clear_session_cookie, is_valid_email, normalize_email, send_password_reset,
            send_welcome_email, session_cookie,
        },
    },
    error::ApiError,
    mailer::mask_email,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/sign-up", post(sign_up))
        .route("/auth/sign-in", post(sign_in))
        .route("/auth/refresh", post(refresh))
        .route("/auth/sign-out", post(sign_out))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
}

const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account exists for that email, a password reset link has been sent.";

/// Signs a token pair and wraps it with the session cookie.
fn issue_session(
    keys: &JwtKeys,
    user: User,
    status: StatusCode,
) -> Result<impl IntoResponse, ApiError> {
    let access_token = keys.sign_access(user.id)?;
    let refresh_token = keys.sign_refresh(user.id)?;
    let cookie = session_cookie(&access_token, keys.access_ttl.as_secs());
    Ok((
        status,
        [(SET_COOKIE, cookie)],
        Json(AuthResponse {
            access_token,
            refresh_token,
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn sign_up(
    State(state): State<AppState>,
    Json(payload): Json<SignUpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&payload.email);
    if !is_valid_email(&email) {
        warn!(email = %mask_email(&email), "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    validate_password(&payload.password)?;
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::Validation("Name is required".into()));
    }

    if User::find_by_email(&state.db, &email).await?.is_some() {
        warn!(email = %mask_email(&email), "email already registered");
        return Err(ApiError::EmailTaken);
    }

    let password_hash = hash_password_blocking(payload.password).await?;
    let user = User::create(
        &state.db,
        &NewUser {
            email,
            password_hash,
            name,
            country: payload
                .country
                .map(|c| c.trim().to_string())
                .unwrap_or_default(),
            investment_goals: payload.investment_goals,
            risk_tolerance: payload.risk_tolerance,
            preferred_industry: payload.preferred_industry,
        },
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            warn!("email registered concurrently");
            return ApiError::EmailTaken;
        }
        error!(error = %e, "create user failed");
        ApiError::Internal(e)
    })?;

    info!(user_id = %user.id, "user signed up");
    tokio::spawn(send_welcome_email(state.clone(), user.clone()));

    issue_session(&JwtKeys::from_ref(&state), user, StatusCode::CREATED)
}

#[instrument(skip(state, payload))]
pub async fn sign_in(
    State(state): State<AppState>,
    Json(payload): Json<SignInRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&payload.email);
    if !is_valid_email(&email) {
        return Err(ApiError::Validation("Invalid email".into()));
    }

    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        warn!(email = %mask_email(&email), "sign-in unknown email");
        return Err(ApiError::InvalidCredentials);
    };

    let ok = verify_password_blocking(payload.password, user.password_hash.clone()).await?;
    if !ok {
        warn!(user_id = %user.id, "sign-in invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    info!(user_id = %user.id, "user signed in");
    issue_session(&JwtKeys::from_ref(&state), user, StatusCode::OK)
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired refresh token".into()))?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;
    issue_session(&keys, user, StatusCode::OK)
}

pub async fn sign_out() -> impl IntoResponse {
    (
        [(SET_COOKIE, clear_session_cookie())],
        Json(MessageResponse::ok("Signed out")),
    )
}

/// Always answers the same way so callers cannot enumerate accounts.
#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = normalize_email(&payload.email);
    if !is_valid_email(&email) {
        return Err(ApiError::Validation("Invalid email".into()));
    }

    match User::find_by_email(&state.db, &email).await {
        Ok(Some(user)) => {
            let token = JwtKeys::from_ref(&state).sign_reset(user.id)?;
            if let Err(e) = send_password_reset(&state, &user, &token).await {
                warn!(user_id = %user.id, error = %format!("{e:#}"), "reset email failed");
            }
        }
        Ok(None) => info!("password reset requested for unknown email"),
        Err(e) => error!(error = %e, "lookup for password reset failed"),
    }

    Ok(Json(MessageResponse::ok(FORGOT_PASSWORD_MESSAGE)))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let claims = JwtKeys::from_ref(&state)
        .verify_kind(&payload.token, TokenKind::PasswordReset)
        .map_err(|_| ApiError::Validation("Invalid or expired reset token".into()))?;
    validate_password(&payload.password)?;

    let hash = hash_password_blocking(payload.password).await?;
    if !User::set_password(&state.db, claims.sub, &hash).await? {
        return Err(ApiError::UserNotFound);
    }

    info!(user_id = %claims.sub, "password reset");
    Ok(Json(MessageResponse::ok("Password updated")))
}
