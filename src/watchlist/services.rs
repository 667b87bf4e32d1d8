use tracing::warn;

use super::{dto::WatchlistRow, repo::WatchlistItem};
use crate::market::{self, MarketData};

/// Trading signal from the day's percent change.
pub fn signal(change_percent: f64) -> &'static str {
    if change_percent >= 5.0 {
        "🔥 STRONG BUY"
    } else if change_percent >= 2.0 {
        "📈 BUY"
    } else if change_percent <= -5.0 {
        "🔥 STRONG SELL"
    } else if change_percent <= -2.0 {
        "📉 SELL"
    } else {
        "➖ HOLD"
    }
}

fn with_thousands(value: f64) -> String {
    let rounded = format!("{:.2}", value.abs());
    let (int_part, frac) = rounded.split_once('.').unwrap_or((rounded.as_str(), "00"));
    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    if frac == "00" {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac}")
    }
}

/// `$1.23T`, `$4.56B`, `$7.89M`, else the grouped dollar amount.
pub fn format_money(value: Option<f64>) -> String {
    match value {
        None => "N/A".to_string(),
        Some(v) if v.is_nan() => "N/A".to_string(),
        Some(v) if v >= 1e12 => format!("${:.2}T", v / 1e12),
        Some(v) if v >= 1e9 => format!("${:.2}B", v / 1e9),
        Some(v) if v >= 1e6 => format!("${:.2}M", v / 1e6),
        Some(v) => format!("${}", with_thousands(v)),
    }
}

fn format_change(change_percent: Option<f64>) -> String {
    match change_percent {
        Some(dp) => format!("{}{dp:.2}%", if dp >= 0.0 { "+" } else { "" }),
        None => "-".to_string(),
    }
}

/// Quote, profile and fundamentals for each item, fetched concurrently.
/// Lookups that fail leave their fields empty.
pub async fn enrich(market: &dyn MarketData, items: Vec<WatchlistItem>) -> Vec<WatchlistRow> {
    let rows = items.into_iter().map(|item| async move {
        let symbol = item.symbol.as_str();
        let (quote, info, metrics) = tokio::join!(
            market.quote(symbol),
            market::symbol_info(market, symbol),
            market.metrics(symbol),
        );
        let quote = quote.unwrap_or_else(|e| {
            warn!(%symbol, error = %e, "quote unavailable");
            Default::default()
        });
        let forward_pe = metrics
            .ok()
            .and_then(|m| m.get("forwardPE").and_then(|v| v.as_f64()))
            .filter(|pe| *pe != 0.0);
        let change_percent = quote.change_percent.unwrap_or(0.0);

        WatchlistRow {
            company: if item.company.is_empty() {
                info.company_name.clone()
            } else {
                item.company.clone()
            },
            exchange: info.exchange,
            price: quote.current,
            price_formatted: quote
                .current
                .map(|c| format!("${c:.2}"))
                .unwrap_or_else(|| "-".to_string()),
            change_percent,
            change_formatted: format_change(quote.change_percent),
            signal: signal(change_percent),
            market_cap: format_money(info.market_capitalization.map(|m| m * 1_000_000.0)),
            pe_ratio: forward_pe.map(|pe| format!("{pe:.2}")),
            added_at: item.added_at,
            symbol: item.symbol,
        }
    });
    futures::future::join_all(rows).await
}
