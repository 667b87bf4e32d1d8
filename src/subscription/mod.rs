pub mod handlers;
pub mod token;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::subscription_routes()
}
