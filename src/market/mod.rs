//! Market data: quotes, company profiles, symbol search and news.

pub mod finnhub;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::warn;

pub use finnhub::FinnhubClient;

pub const DEFAULT_EXCHANGE: &str = "NASDAQ";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsArticle {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub image: Option<String>,
    /// Unix seconds.
    #[serde(default)]
    pub datetime: i64,
    #[serde(default)]
    pub related: String,
    #[serde(default)]
    pub category: String,
}

impl NewsArticle {
    pub fn is_usable(&self) -> bool {
        !self.headline.trim().is_empty() && !self.url.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    /// Current price.
    #[serde(rename = "c")]
    pub current: Option<f64>,
    #[serde(rename = "d")]
    pub change: Option<f64>,
    /// Percent change.
    #[serde(rename = "dp")]
    pub change_percent: Option<f64>,
    #[serde(rename = "h")]
    pub high: Option<f64>,
    #[serde(rename = "l")]
    pub low: Option<f64>,
    #[serde(rename = "o")]
    pub open: Option<f64>,
    #[serde(rename = "pc")]
    pub previous_close: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    pub ticker: Option<String>,
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub finnhub_industry: Option<String>,
    pub ipo: Option<String>,
    /// In millions of the listing currency.
    pub market_capitalization: Option<f64>,
    pub logo: Option<String>,
    pub weburl: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub symbol: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub display_symbol: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

/// Profile data with fallbacks applied, as shown next to the chart widgets.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SymbolInfo {
    pub symbol: String,
    pub exchange: String,
    pub company_name: String,
    pub industry: Option<String>,
    pub ipo: Option<String>,
    pub market_capitalization: Option<f64>,
    pub logo: Option<String>,
    pub weburl: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
}

impl SymbolInfo {
    pub fn fallback(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            exchange: DEFAULT_EXCHANGE.to_string(),
            company_name: symbol.to_string(),
            industry: None,
            ipo: None,
            market_capitalization: None,
            logo: None,
            weburl: None,
            country: None,
            city: None,
        }
    }

    fn from_profile(symbol: &str, p: CompanyProfile) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            symbol: symbol.to_string(),
            exchange: non_empty(p.exchange).unwrap_or_else(|| DEFAULT_EXCHANGE.to_string()),
            company_name: non_empty(p.name).unwrap_or_else(|| symbol.to_string()),
            industry: non_empty(p.finnhub_industry),
            ipo: non_empty(p.ipo),
            market_capitalization: p.market_capitalization,
            logo: non_empty(p.logo),
            weburl: non_empty(p.weburl),
            country: non_empty(p.country),
            city: non_empty(p.city),
        }
    }
}

#[async_trait]
pub trait MarketData: Send + Sync {
    async fn search(&self, query: &str) -> anyhow::Result<Vec<SearchResult>>;
    async fn quote(&self, symbol: &str) -> anyhow::Result<Quote>;
    async fn profile(&self, symbol: &str) -> anyhow::Result<CompanyProfile>;
    /// Raw `metric` object (e.g. `forwardPE`, `52WeekHigh`).
    async fn metrics(&self, symbol: &str) -> anyhow::Result<serde_json::Value>;
    async fn company_news(
        &self,
        symbol: &str,
        from: time::Date,
        to: time::Date,
    ) -> anyhow::Result<Vec<NewsArticle>>;
    async fn general_news(&self) -> anyhow::Result<Vec<NewsArticle>>;
}

/// Profile lookup that never fails: unknown or unreachable symbols get the
/// default exchange and their own ticker as company name.
pub async fn symbol_info(market: &dyn MarketData, symbol: &str) -> SymbolInfo {
    match market.profile(symbol).await {
        Ok(profile) => SymbolInfo::from_profile(symbol, profile),
        Err(e) => {
            warn!(error = %e, %symbol, "profile lookup failed; using defaults");
            SymbolInfo::fallback(symbol)
        }
    }
}

/// Recent usable news, newest first, at most `limit` items. Company news
/// covers the last seven days; `None` fetches general market news.
pub async fn recent_news(
    market: &dyn MarketData,
    symbol: Option<&str>,
    limit: usize,
) -> anyhow::Result<Vec<NewsArticle>> {
    let mut articles = match symbol {
        Some(symbol) => {
            let to = OffsetDateTime::now_utc().date();
            let from = to - Duration::days(7);
            market.company_news(symbol, from, to).await?
        }
        None => market.general_news().await?,
    };
    articles.retain(NewsArticle::is_usable);
    articles.sort_by(|a, b| b.datetime.cmp(&a.datetime));
    articles.truncate(limit);
    Ok(articles)
}
