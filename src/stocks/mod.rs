//! Symbol search and the per-stock detail view.

pub mod handlers;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::stock_routes()
}
