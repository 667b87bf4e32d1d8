use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use time::{macros::format_description, Date};
use tracing::{debug, warn};

use super::{CompanyProfile, MarketData, NewsArticle, Quote, SearchResult};
use crate::config::FinnhubConfig;

const MAX_ATTEMPTS: u32 = 3;
const SEARCH_LIMIT: usize = 15;

#[derive(Clone)]
pub struct FinnhubClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct MetricResponse {
    #[serde(default)]
    metric: serde_json::Value,
}

impl FinnhubClient {
    pub fn new(config: &FinnhubConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        }
    }

    /// GET `path` with `query` plus the API token, retrying on HTTP 429.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> anyhow::Result<T> {
        let token = self
            .api_key
            .as_deref()
            .context("FINNHUB_API_KEY not configured")?;
        let url = format!("{}{}", self.base_url, path);

        for attempt in 1..=MAX_ATTEMPTS {
            let response = self
                .client
                .get(&url)
                .query(query)
                .query(&[("token", token)])
                .send()
                .await
                .with_context(|| format!("finnhub GET {path}"))?;

            let status = response.status();
            if status.as_u16() == 429 && attempt < MAX_ATTEMPTS {
                warn!(%path, attempt, "finnhub rate limited; backing off");
                tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
                continue;
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("finnhub GET {path}: HTTP {status}: {body}");
            }

            debug!(%path, "finnhub ok");
            return response
                .json::<T>()
                .await
                .with_context(|| format!("decode finnhub {path}"));
        }

        anyhow::bail!("finnhub GET {path}: rate limited after {MAX_ATTEMPTS} attempts")
    }
}

fn ymd(date: Date) -> anyhow::Result<String> {
    date.format(format_description!("[year]-[month]-[day]"))
        .context("format date")
}

#[async_trait]
impl MarketData for FinnhubClient {
    async fn search(&self, query: &str) -> anyhow::Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let resp: SearchResponse = self.get_json("/search", &[("q", query.to_string())]).await?;
        Ok(resp.result.into_iter().take(SEARCH_LIMIT).collect())
    }

    async fn quote(&self, symbol: &str) -> anyhow::Result<Quote> {
        self.get_json("/quote", &[("symbol", symbol.to_string())]).await
    }

    async fn profile(&self, symbol: &str) -> anyhow::Result<CompanyProfile> {
        self.get_json("/stock/profile2", &[("symbol", symbol.to_string())])
            .await
    }

    async fn metrics(&self, symbol: &str) -> anyhow::Result<serde_json::Value> {
        let resp: MetricResponse = self
            .get_json(
                "/stock/metric",
                &[("symbol", symbol.to_string()), ("metric", "all".to_string())],
            )
            .await?;
        Ok(resp.metric)
    }

    async fn company_news(
        &self,
        symbol: &str,
        from: Date,
        to: Date,
    ) -> anyhow::Result<Vec<NewsArticle>> {
        self.get_json(
            "/company-news",
            &[
                ("symbol", symbol.to_string()),
                ("from", ymd(from)?),
                ("to", ymd(to)?),
            ],
        )
        .await
    }

    async fn general_news(&self) -> anyhow::Result<Vec<NewsArticle>> {
        self.get_json("/news", &[("category", "general".to_string())])
            .await
    }
}
