//! In-memory doubles for the external collaborators.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    digest::gemini::Summarizer,
    mailer::{Mailer, OutgoingEmail},
    market::{CompanyProfile, MarketData, NewsArticle, Quote, SearchResult},
};

pub struct StubSummarizer {
    fail: bool,
    delay: Duration,
    calls: AtomicUsize,
}

impl StubSummarizer {
    pub fn ok() -> Self {
        Self {
            fail: false,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::ok()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for StubSummarizer {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            anyhow::bail!("summarizer offline");
        }
        let section = prompt
            .split_once("SECTION TYPE:\n")
            .and_then(|(_, rest)| rest.lines().next())
            .unwrap_or("intro");
        Ok(format!("<div data-section=\"{section}\">summary</div>"))
    }
}

/// Serves canned news per symbol and counts company-news lookups.
#[derive(Default)]
pub struct StubMarket {
    pub news: HashMap<String, Vec<NewsArticle>>,
    pub general: Vec<NewsArticle>,
    lookups: Mutex<HashMap<String, usize>>,
}

impl StubMarket {
    pub fn with_news(mut self, symbol: &str, headlines: &[&str]) -> Self {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        let articles = headlines
            .iter()
            .enumerate()
            .map(|(i, h)| article(symbol, h, now - i as i64))
            .collect();
        self.news.insert(symbol.to_string(), articles);
        self
    }

    pub fn with_general(mut self, headlines: &[&str]) -> Self {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        self.general = headlines
            .iter()
            .enumerate()
            .map(|(i, h)| article("", h, now - i as i64))
            .collect();
        self
    }

    pub fn lookups(&self, symbol: &str) -> usize {
        self.lookups
            .lock()
            .unwrap()
            .get(symbol)
            .copied()
            .unwrap_or(0)
    }
}

pub fn article(symbol: &str, headline: &str, datetime: i64) -> NewsArticle {
    NewsArticle {
        id: datetime,
        headline: headline.to_string(),
        summary: format!("{headline} summary"),
        source: "Reuters".into(),
        url: format!("https://news.test/{}", headline.replace(' ', "-")),
        image: None,
        datetime,
        related: symbol.to_string(),
        category: "company".into(),
    }
}

#[async_trait]
impl MarketData for StubMarket {
    async fn search(&self, query: &str) -> anyhow::Result<Vec<SearchResult>> {
        let q = query.to_uppercase();
        Ok(self
            .news
            .keys()
            .filter(|s| s.contains(&q))
            .map(|s| SearchResult {
                symbol: s.clone(),
                description: format!("{s} Inc"),
                display_symbol: s.clone(),
                kind: "Common Stock".into(),
            })
            .collect())
    }

    async fn quote(&self, _symbol: &str) -> anyhow::Result<Quote> {
        Ok(Quote {
            current: Some(100.0),
            change_percent: Some(1.5),
            ..Default::default()
        })
    }

    async fn profile(&self, _symbol: &str) -> anyhow::Result<CompanyProfile> {
        Ok(CompanyProfile::default())
    }

    async fn metrics(&self, _symbol: &str) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::json!({}))
    }

    async fn company_news(
        &self,
        symbol: &str,
        _from: time::Date,
        _to: time::Date,
    ) -> anyhow::Result<Vec<NewsArticle>> {
        *self
            .lookups
            .lock()
            .unwrap()
            .entry(symbol.to_string())
            .or_default() += 1;
        Ok(self.news.get(symbol).cloned().unwrap_or_default())
    }

    async fn general_news(&self) -> anyhow::Result<Vec<NewsArticle>> {
        Ok(self.general.clone())
    }
}

/// Keeps every email it is asked to send; configured recipients fail.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutgoingEmail>>,
    failing: HashSet<String>,
}

impl RecordingMailer {
    pub fn failing_for(recipients: &[&str]) -> Self {
        Self {
            sent: Mutex::default(),
            failing: recipients.iter().map(|r| r.to_string()).collect(),
        }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()> {
        if self.failing.contains(&email.to) {
            anyhow::bail!("mailbox unavailable");
        }
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}
