use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use serde::Serialize;
use time::{macros::format_description, OffsetDateTime};
use tracing::{error, info, instrument, warn};

use super::{
    assemble::assemble_news_content,
    retry::RetryPolicy,
    sections::{SectionBuilder, GENERAL_SECTION, SUMMARY_UNAVAILABLE},
    store::{DigestStore, PgDigestStore, Subscriber},
};
use crate::{
    config::AppConfig,
    mailer::{mask_email, templates, Mailer},
    market::{self, MarketData},
    state::AppState,
    subscription::token,
};

/// Outcome of one digest run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DigestReport {
    pub users: usize,
    pub unique_symbols: usize,
    pub sections_built: usize,
    pub emails_sent: usize,
    pub failed_recipients: Vec<String>,
}

pub struct DigestJob {
    store: Arc<dyn DigestStore>,
    market: Arc<dyn MarketData>,
    mailer: Arc<dyn Mailer>,
    sections: SectionBuilder,
    retry: RetryPolicy,
    articles_per_section: usize,
    base_url: String,
    unsubscribe_secret: String,
}

impl DigestJob {
    pub fn new(
        store: Arc<dyn DigestStore>,
        market: Arc<dyn MarketData>,
        mailer: Arc<dyn Mailer>,
        sections: SectionBuilder,
        config: &AppConfig,
    ) -> Self {
        Self {
            store,
            market,
            mailer,
            sections,
            retry: RetryPolicy::new(config.digest.retries),
            articles_per_section: config.digest.articles_per_section,
            base_url: config.base_url.clone(),
            unsubscribe_secret: config.unsubscribe_secret.clone(),
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        let sections = SectionBuilder::new(
            state.cache.clone(),
            state.summarizer.clone(),
            RetryPolicy::new(state.config.digest.retries),
        );
        Self::new(
            Arc::new(PgDigestStore::new(state.db.clone())),
            state.market.clone(),
            state.mailer.clone(),
            sections,
            &state.config,
        )
    }

    pub async fn run(&self) -> DigestReport {
        self.run_at(OffsetDateTime::now_utc()).await
    }

    #[instrument(skip(self), fields(date = %now.date()))]
    pub async fn run_at(&self, now: OffsetDateTime) -> DigestReport {
        let mut report = DigestReport::default();
        let date_key = now.date().to_string();

        let store = &self.store;
        let users = match self
            .retry
            .run("get-subscribed-users", move || store.subscribed_users())
            .await
        {
            Ok(users) => users,
            Err(e) => {
                error!(error = %format!("{e:#}"), "could not load subscribers; skipping run");
                return report;
            }
        };
        report.users = users.len();
        if users.is_empty() {
            info!("no subscribed users; nothing to send");
            return report;
        }

        let plans = self.load_watchlists(users).await;
        let symbols = unique_symbols(&plans);
        report.unique_symbols = symbols.len();

        let mut section_map = HashMap::new();
        for symbol in &symbols {
            let articles = self.fetch_news(Some(symbol.as_str())).await;
            if articles.is_empty() {
                continue;
            }
            let html = self
                .sections
                .get_or_create(&date_key, symbol, &articles)
                .await;
            if html != SUMMARY_UNAVAILABLE {
                section_map.insert(symbol.clone(), html);
            }
        }
        report.sections_built = section_map.len();

        let general_articles = self.fetch_news(None).await;
        let general = if general_articles.is_empty() {
            SUMMARY_UNAVAILABLE.to_string()
        } else {
            self.sections
                .get_or_create(&date_key, GENERAL_SECTION, &general_articles)
                .await
        };

        let human_date = now
            .format(format_description!(
                "[weekday repr:long], [month repr:long] [day padding:none], [year]"
            ))
            .unwrap_or_else(|_| date_key.clone());

        let section_map = &section_map;
        let general = general.as_str();
        let human_date = human_date.as_str();
        let sends = plans.iter().map(|(user, symbols)| async move {
            let content = assemble_news_content(symbols, section_map, general);
            let email = match templates::daily_digest(
                &user.email,
                human_date,
                &content,
                &self.unsubscribe_url(&user.email),
                &self.base_url,
            ) {
                Ok(email) => email,
                Err(e) => return (user, Err(e.context("render digest email"))),
            };
            let mailer = &self.mailer;
            let step = format!("send-email-{}", user.id);
            let result = self
                .retry
                .run(&step, move || mailer.send(email.clone()))
                .await;
            (user, result)
        });

        for (user, result) in futures::future::join_all(sends).await {
            match result {
                Ok(()) => report.emails_sent += 1,
                Err(e) => {
                    warn!(user_id = %user.id, to = %mask_email(&user.email), error = %format!("{e:#}"), "digest email failed");
                    report.failed_recipients.push(user.email.clone());
                }
            }
        }

        info!(
            users = report.users,
            symbols = report.unique_symbols,
            sections = report.sections_built,
            sent = report.emails_sent,
            failed = report.failed_recipients.len(),
            "digest run finished"
        );
        report
    }

    async fn load_watchlists(&self, users: Vec<Subscriber>) -> Vec<(Subscriber, Vec<String>)> {
        let mut plans = Vec::with_capacity(users.len());
        for user in users {
            let store = &self.store;
            let user_id = user.id;
            let step = format!("get-watchlist-{user_id}");
            let symbols = self
                .retry
                .run(&step, move || store.watchlist_symbols(user_id))
                .await
                .unwrap_or_else(|e| {
                    warn!(%user_id, error = %format!("{e:#}"), "watchlist unavailable; using general news");
                    Vec::new()
                });
            plans.push((user, symbols));
        }
        plans
    }

    async fn fetch_news(&self, symbol: Option<&str>) -> Vec<market::NewsArticle> {
        let source = self.market.as_ref();
        let limit = self.articles_per_section;
        let step = format!("fetch-news-{}", symbol.unwrap_or(GENERAL_SECTION));
        self.retry
            .run(&step, move || market::recent_news(source, symbol, limit))
            .await
            .unwrap_or_else(|e| {
                warn!(symbol = symbol.unwrap_or(GENERAL_SECTION), error = %format!("{e:#}"), "news unavailable");
                Vec::new()
            })
    }

    fn unsubscribe_url(&self, email: &str) -> String {
        format!(
            "{}/api/unsubscribe?token={}",
            self.base_url,
            token::generate(&self.unsubscribe_secret, email)
        )
    }
}

/// Union of all watchlists in first-seen order.
fn unique_symbols(plans: &[(Subscriber, Vec<String>)]) -> Vec<String> {
    let mut seen = HashSet::new();
    plans
        .iter()
        .flat_map(|(_, symbols)| symbols.iter())
        .filter(|s| seen.insert(s.as_str()))
        .cloned()
        .collect()
}
