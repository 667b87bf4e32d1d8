use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Deserialize)]
pub struct AddWatchlistRequest {
    pub symbol: String,
    #[serde(default)]
    pub company: String,
}

/// Watchlist entry with live market data for the table view.
#[derive(Debug, Serialize)]
pub struct WatchlistRow {
    pub symbol: String,
    pub company: String,
    pub exchange: String,
    #[serde(with = "time::serde::rfc3339")]
    pub added_at: OffsetDateTime,
    pub price: Option<f64>,
    pub price_formatted: String,
    pub change_percent: f64,
    pub change_formatted: String,
    pub signal: &'static str,
    pub market_cap: String,
    pub pe_ratio: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WatchlistSymbols {
    pub symbols: Vec<String>,
}
