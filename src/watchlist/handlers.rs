use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use tracing::{info, instrument};

use super::{
    dto::{AddWatchlistRequest, WatchlistRow, WatchlistSymbols},
    repo::{normalize_symbol, WatchlistItem},
    services::enrich,
};
use crate::{auth::jwt::AuthUser, error::ApiError, market, state::AppState};

pub fn watchlist_routes() -> Router<AppState> {
    Router::new()
        .route("/watchlist", get(list_watchlist).post(add_to_watchlist))
        .route("/watchlist/symbols", get(list_symbols))
        .route("/watchlist/:symbol", delete(remove_from_watchlist))
}

fn parse_symbol(raw: &str) -> Result<String, ApiError> {
    normalize_symbol(raw).ok_or_else(|| ApiError::Validation("Invalid symbol".into()))
}

#[instrument(skip(state))]
pub async fn list_watchlist(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<WatchlistRow>>, ApiError> {
    let items = WatchlistItem::list_for_user(&state.db, user_id).await?;
    Ok(Json(enrich(state.market.as_ref(), items).await))
}

#[instrument(skip(state))]
pub async fn list_symbols(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<WatchlistSymbols>, ApiError> {
    let symbols = WatchlistItem::symbols_for_user(&state.db, user_id).await?;
    Ok(Json(WatchlistSymbols { symbols }))
}

#[instrument(skip(state, payload))]
pub async fn add_to_watchlist(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<AddWatchlistRequest>,
) -> Result<(StatusCode, Json<WatchlistItem>), ApiError> {
    let symbol = parse_symbol(&payload.symbol)?;
    let company = match payload.company.trim() {
        "" => market::symbol_info(state.market.as_ref(), &symbol).await.company_name,
        name => name.to_string(),
    };

    let item = WatchlistItem::add(&state.db, user_id, &symbol, &company).await?;
    info!(%user_id, %symbol, "watchlist add");
    Ok((StatusCode::CREATED, Json(item)))
}

#[instrument(skip(state))]
pub async fn remove_from_watchlist(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(symbol): Path<String>,
) -> Result<StatusCode, ApiError> {
    let symbol = parse_symbol(&symbol)?;
    if !WatchlistItem::remove(&state.db, user_id, &symbol).await? {
        return Err(ApiError::NotFound(format!("{symbol} is not in your watchlist")));
    }
    info!(%user_id, %symbol, "watchlist remove");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::JwtKeys;
    use axum::{body::Body, extract::FromRef, http::Request};
    use tower::ServiceExt;
    use uuid::Uuid;

    fn bearer(state: &AppState) -> String {
        let token = JwtKeys::from_ref(state).sign_access(Uuid::new_v4()).unwrap();
        format!("Bearer {token}")
    }

    #[tokio::test]
    async fn watchlist_requires_authentication() {
        let res = watchlist_routes()
            .with_state(AppState::fake())
            .oneshot(Request::get("/watchlist").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn refresh_token_is_not_a_session() {
        let state = AppState::fake();
        let refresh = JwtKeys::from_ref(&state).sign_refresh(Uuid::new_v4()).unwrap();
        let res = watchlist_routes()
            .with_state(state)
            .oneshot(
                Request::get("/watchlist/symbols")
                    .header("authorization", format!("Bearer {refresh}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_symbol_is_rejected() {
        let state = AppState::fake();
        let auth = bearer(&state);
        let res = watchlist_routes()
            .with_state(state)
            .oneshot(
                Request::post("/watchlist")
                    .header("authorization", auth)
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"symbol":"not a ticker"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
