use std::collections::HashSet;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::{
    auth::jwt::AuthUser,
    error::ApiError,
    market::{self, NewsArticle, Quote, SymbolInfo},
    state::AppState,
    watchlist::{
        repo::{normalize_symbol, WatchlistItem},
        services::{format_money, signal},
    },
};

const STOCK_PAGE_NEWS: usize = 8;

pub fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/stocks/search", get(search))
        .route("/stocks/:symbol", get(details))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct SearchItem {
    pub symbol: String,
    pub name: String,
    pub display_symbol: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub is_in_watchlist: bool,
}

#[derive(Debug, Serialize)]
pub struct StockDetails {
    #[serde(flatten)]
    pub info: SymbolInfo,
    pub market_cap_formatted: String,
    pub quote: Quote,
    pub signal: &'static str,
    pub metrics: serde_json::Value,
    pub news: Vec<NewsArticle>,
    pub is_in_watchlist: bool,
}

#[instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SearchItem>>, ApiError> {
    let query = params.q.trim();
    if query.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let results = state
        .market
        .search(query)
        .await
        .map_err(ApiError::Upstream)?;
    let watched: HashSet<String> = WatchlistItem::symbols_for_user(&state.db, user_id)
        .await?
        .into_iter()
        .collect();

    let items = results
        .into_iter()
        .map(|r| SearchItem {
            is_in_watchlist: watched.contains(&r.symbol.to_uppercase()),
            name: r.description,
            display_symbol: r.display_symbol,
            kind: r.kind,
            symbol: r.symbol,
        })
        .collect();
    Ok(Json(items))
}

#[instrument(skip(state))]
pub async fn details(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(symbol): Path<String>,
) -> Result<Json<StockDetails>, ApiError> {
    let symbol = normalize_symbol(&symbol)
        .ok_or_else(|| ApiError::Validation("Invalid symbol".into()))?;
    let source = state.market.as_ref();

    let (info, quote, metrics, news) = tokio::join!(
        market::symbol_info(source, &symbol),
        source.quote(&symbol),
        source.metrics(&symbol),
        market::recent_news(source, Some(symbol.as_str()), STOCK_PAGE_NEWS),
    );
    let quote = quote.unwrap_or_else(|e| {
        warn!(%symbol, error = %e, "quote unavailable");
        Quote::default()
    });
    let metrics = metrics.unwrap_or_else(|e| {
        warn!(%symbol, error = %e, "metrics unavailable");
        serde_json::Value::Null
    });
    let news = news.unwrap_or_else(|e| {
        warn!(%symbol, error = %e, "news unavailable");
        Vec::new()
    });

    let is_in_watchlist = WatchlistItem::contains(&state.db, user_id, &symbol).await?;

    Ok(Json(StockDetails {
        market_cap_formatted: format_money(info.market_capitalization.map(|m| m * 1_000_000.0)),
        signal: signal(quote.change_percent.unwrap_or(0.0)),
        info,
        quote,
        metrics,
        news,
        is_in_watchlist,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::JwtKeys;
    use axum::{
        body::Body,
        extract::FromRef,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    async fn get_authed(uri: &str) -> StatusCode {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state).sign_access(Uuid::new_v4()).unwrap();
        stock_routes()
            .with_state(state)
            .oneshot(
                Request::get(uri)
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn blank_search_returns_empty_without_lookups() {
        assert_eq!(get_authed("/stocks/search?q=%20").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_symbol_is_rejected() {
        assert_eq!(get_authed("/stocks/BAD%20SYM").await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn stock_routes_require_authentication() {
        let res = stock_routes()
            .with_state(AppState::fake())
            .oneshot(Request::get("/stocks/AAPL").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
