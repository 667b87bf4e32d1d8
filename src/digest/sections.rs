use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use tracing::{debug, info, warn};

use super::{gemini::Summarizer, prompts, retry::RetryPolicy};
use crate::{cache::SummaryCache, market::NewsArticle};

pub const SECTION_TTL: Duration = Duration::from_secs(60 * 60 * 24);
pub const SUMMARY_UNAVAILABLE: &str = "Market summary unavailable today.";
pub const GENERAL_SECTION: &str = "general";

pub fn cache_key(date: &str, section_key: &str) -> String {
    format!("news:{date}:{section_key}")
}

/// Cache-aside lookup of summarized news sections. Misses on the same key
/// are serialized so only one caller pays for the LLM call.
pub struct SectionBuilder {
    cache: Arc<dyn SummaryCache>,
    summarizer: Arc<dyn Summarizer>,
    retry: RetryPolicy,
    inflight: Mutex<HashMap<String, Gate>>,
}

impl SectionBuilder {
    pub fn new(
        cache: Arc<dyn SummaryCache>,
        summarizer: Arc<dyn Summarizer>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            cache,
            summarizer,
            retry,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    async fn cached(&self, key: &str) -> Option<String> {
        match self.cache.get(key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(error = %e, %key, "cache read failed; treating as miss");
                None
            }
        }
    }

    fn enter<'a>(&'a self, key: &'a str) -> InflightSlot<'a> {
        let mut inflight = self.inflight.lock().unwrap_or_else(|p| p.into_inner());
        let gate = inflight.entry(key.to_string()).or_default().clone();
        InflightSlot {
            inflight: &self.inflight,
            key,
            gate,
        }
    }

    /// Returns the section HTML for `(date, section_key)`, summarizing
    /// `articles` on a miss. Never fails: an unavailable summarizer yields
    /// [`SUMMARY_UNAVAILABLE`], which is not cached.
    pub async fn get_or_create(
        &self,
        date: &str,
        section_key: &str,
        articles: &[NewsArticle],
    ) -> String {
        let key = cache_key(date, section_key);
        if let Some(hit) = self.cached(&key).await {
            debug!(%key, "section cache hit");
            return hit;
        }

        // Declared before the lock guard so it is dropped after it.
        let slot = self.enter(&key);
        let _lock = slot.gate().lock().await;
        let html = match self.cached(&key).await {
            Some(hit) => {
                debug!(%key, "section filled by concurrent caller");
                hit
            }
            None => {
                info!(%key, articles = articles.len(), "section cache miss");
                self.summarize(&key, section_key, articles).await
            }
        };
        html
    }

    async fn summarize(&self, key: &str, section_key: &str, articles: &[NewsArticle]) -> String {
        let prompt = match prompts::news_section_prompt(section_key, articles) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, %key, "failed to build section prompt");
                return SUMMARY_UNAVAILABLE.to_string();
            }
        };

        let step = format!("summarize-{section_key}");
        let summarizer = &self.summarizer;
        let prompt = prompt.as_str();
        match self
            .retry
            .run(&step, move || summarizer.generate(prompt))
            .await
        {
            Ok(html) => {
                if let Err(e) = self.cache.set(key, &html, SECTION_TTL).await {
                    warn!(error = %e, %key, "cache write failed");
                }
                html
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), %key, "summarizer unavailable; using fallback");
                SUMMARY_UNAVAILABLE.to_string()
            }
        }
    }
}

type Gate = Arc<tokio::sync::Mutex<()>>;

/// A caller's claim on the per-key gate. Dropping it, whether the caller
/// finished or was cancelled, removes the map entry once no one else holds
/// the gate.
struct InflightSlot<'a> {
    inflight: &'a Mutex<HashMap<String, Gate>>,
    key: &'a str,
    gate: Gate,
}

impl InflightSlot<'_> {
    fn gate(&self) -> &tokio::sync::Mutex<()> {
        &self.gate
    }
}

impl Drop for InflightSlot<'_> {
    fn drop(&mut self) {
        // Clones of a gate are only created and dropped under the map lock,
        // so a count of two (map + this slot) means nobody else holds it.
        let mut inflight = self.inflight.lock().unwrap_or_else(|p| p.into_inner());
        if Arc::strong_count(&self.gate) <= 2 {
            inflight.remove(self.key);
        }
        drop(std::mem::take(&mut self.gate));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cache::MemoryCache, testing::StubSummarizer};

    fn builder(summarizer: Arc<StubSummarizer>, cache: Arc<MemoryCache>) -> SectionBuilder {
        SectionBuilder::new(cache, summarizer, RetryPolicy::immediate(1))
    }

    #[tokio::test]
    async fn hit_skips_summarizer() {
        let cache = Arc::new(MemoryCache::new());
        cache
            .set(&cache_key("2026-10-18", "AAPL"), "<p>cached</p>", SECTION_TTL)
            .await
            .unwrap();
        let summarizer = Arc::new(StubSummarizer::ok());
        let sections = builder(summarizer.clone(), cache);

        let html = sections.get_or_create("2026-10-18", "AAPL", &[]).await;
        assert_eq!(html, "<p>cached</p>");
        assert_eq!(summarizer.calls(), 0);
    }

    #[tokio::test]
    async fn miss_summarizes_and_stores() {
        let cache = Arc::new(MemoryCache::new());
        let summarizer = Arc::new(StubSummarizer::ok());
        let sections = builder(summarizer.clone(), cache.clone());

        let html = sections.get_or_create("2026-10-18", "TSLA", &[]).await;
        assert!(html.contains("TSLA"));
        assert_eq!(summarizer.calls(), 1);
        assert_eq!(
            cache.get(&cache_key("2026-10-18", "TSLA")).await.unwrap(),
            Some(html.clone())
        );

        // Second lookup on the same day is served from cache.
        assert_eq!(sections.get_or_create("2026-10-18", "TSLA", &[]).await, html);
        assert_eq!(summarizer.calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_summary() {
        let cache = Arc::new(MemoryCache::new());
        let summarizer = Arc::new(StubSummarizer::ok().with_delay(Duration::from_millis(50)));
        let sections = Arc::new(builder(summarizer.clone(), cache));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let sections = sections.clone();
                tokio::spawn(async move { sections.get_or_create("2026-10-18", "NVDA", &[]).await })
            })
            .collect();
        let results = futures::future::join_all(tasks).await;

        assert_eq!(summarizer.calls(), 1);
        let first = results[0].as_ref().unwrap();
        assert!(results.iter().all(|r| r.as_ref().unwrap() == first));
        assert!(sections.inflight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_miss_releases_its_gate() {
        let cache = Arc::new(MemoryCache::new());
        let summarizer = Arc::new(StubSummarizer::ok().with_delay(Duration::from_secs(30)));
        let sections = Arc::new(builder(summarizer.clone(), cache.clone()));

        let task = {
            let sections = sections.clone();
            tokio::spawn(async move { sections.get_or_create("2026-10-18", "AMD", &[]).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(summarizer.calls(), 1);
        assert_eq!(sections.inflight.lock().unwrap().len(), 1);

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        assert!(sections.inflight.lock().unwrap().is_empty());
        assert_eq!(cache.get(&cache_key("2026-10-18", "AMD")).await.unwrap(), None);
    }

    #[test]
    fn waiter_keeps_gate_until_it_leaves() {
        let sections = builder(Arc::new(StubSummarizer::ok()), Arc::new(MemoryCache::new()));
        let key = cache_key("2026-10-18", "META");

        let first = sections.enter(&key);
        let second = sections.enter(&key);
        drop(first);
        assert_eq!(sections.inflight.lock().unwrap().len(), 1);
        drop(second);
        assert!(sections.inflight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failure_falls_back_without_caching() {
        let cache = Arc::new(MemoryCache::new());
        let summarizer = Arc::new(StubSummarizer::failing());
        let sections = builder(summarizer.clone(), cache.clone());

        let html = sections.get_or_create("2026-10-18", "general", &[]).await;
        assert_eq!(html, SUMMARY_UNAVAILABLE);
        // One attempt plus one retry.
        assert_eq!(summarizer.calls(), 2);
        assert_eq!(cache.get(&cache_key("2026-10-18", "general")).await.unwrap(), None);
    }

    #[test]
    fn keys_are_namespaced_by_date() {
        assert_eq!(cache_key("2026-10-18", "AAPL"), "news:2026-10-18:AAPL");
    }
}
