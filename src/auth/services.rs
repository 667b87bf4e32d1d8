use axum_extra::extract::cookie::{Cookie, SameSite};
use cookie::CookieBuilder;
use lazy_static::lazy_static;
use regex::Regex;
use time::Duration;
use tracing::{info, warn};

use super::{jwt::SESSION_COOKIE, repo_types::User};
use crate::{
    digest::prompts::{self, WelcomeProfile, FALLBACK_WELCOME_INTRO},
    mailer::{mask_email, templates},
    state::AppState,
    subscription::token,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn session_cookie_builder(value: String) -> CookieBuilder<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
}

/// `Set-Cookie` value carrying the access token.
pub(crate) fn session_cookie(token: &str, max_age_secs: u64) -> String {
    session_cookie_builder(token.to_string())
        .max_age(Duration::seconds(max_age_secs as i64))
        .build()
        .to_string()
}

/// `Set-Cookie` value that expires the session cookie.
pub(crate) fn clear_session_cookie() -> String {
    let mut cookie = session_cookie_builder(String::new()).build();
    cookie.make_removal();
    cookie.to_string()
}

/// Personalised intro from the onboarding answers, or the stock one when the
/// summarizer is unavailable.
async fn welcome_intro(state: &AppState, user: &User) -> String {
    let profile = WelcomeProfile {
        country: user.country.clone(),
        investment_goals: user.investment_goals.clone(),
        risk_tolerance: user.risk_tolerance.clone(),
        preferred_industry: user.preferred_industry.clone(),
    };
    match state.summarizer.generate(&prompts::welcome_prompt(&profile)).await {
        Ok(intro) => intro,
        Err(e) => {
            warn!(user_id = %user.id, error = %format!("{e:#}"), "welcome intro generation failed");
            FALLBACK_WELCOME_INTRO.to_string()
        }
    }
}

/// Sends the welcome email. Runs detached from the sign-up request.
pub async fn send_welcome_email(state: AppState, user: User) {
    let intro = welcome_intro(&state, &user).await;
    let base = &state.config.base_url;
    let unsubscribe_url = format!(
        "{base}/api/unsubscribe?token={}",
        token::generate(&state.config.unsubscribe_secret, &user.email)
    );
    let sent = match templates::welcome(&user.email, &user.name, &intro, &unsubscribe_url, base) {
        Ok(email) => state.mailer.send(email).await,
        Err(e) => Err(e.context("render welcome email")),
    };
    match sent {
        Ok(()) => info!(user_id = %user.id, "welcome email sent"),
        Err(e) => {
            warn!(user_id = %user.id, to = %mask_email(&user.email), error = %format!("{e:#}"), "welcome email failed")
        }
    }
}

pub async fn send_password_reset(state: &AppState, user: &User, reset_token: &str) -> anyhow::Result<()> {
    let base = &state.config.base_url;
    let link = format!("{base}/reset-password?token={reset_token}");
    state
        .mailer
        .send(templates::password_reset(&user.email, &link, base)?)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingMailer;
    use std::sync::Arc;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "jane@example.com".into(),
            password_hash: String::new(),
            name: "Jane".into(),
            country: "US".into(),
            image: None,
            email_subscribed: true,
            investment_goals: Some("Growth".into()),
            risk_tolerance: Some("High".into()),
            preferred_industry: Some("Technology".into()),
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("jane@example.com"));
        assert!(!is_valid_email("jane@example"));
        assert!(!is_valid_email("jane example@x.io"));
        assert_eq!(normalize_email("  Jane@Example.COM "), "jane@example.com");
    }

    #[test]
    fn session_cookie_is_http_only() {
        let c = Cookie::parse(session_cookie("abc", 60)).unwrap();
        assert_eq!(c.name(), SESSION_COOKIE);
        assert_eq!(c.value(), "abc");
        assert_eq!(c.http_only(), Some(true));
        assert_eq!(c.same_site(), Some(SameSite::Lax));
        assert_eq!(c.path(), Some("/"));
        assert_eq!(c.max_age(), Some(Duration::seconds(60)));
    }

    #[test]
    fn cleared_cookie_expires_immediately() {
        let c = Cookie::parse(clear_session_cookie()).unwrap();
        assert_eq!(c.name(), SESSION_COOKIE);
        assert_eq!(c.value(), "");
        assert_eq!(c.max_age(), Some(Duration::ZERO));
    }

    #[tokio::test]
    async fn welcome_email_uses_generated_intro_and_unsubscribe_link() {
        let mailer = Arc::new(RecordingMailer::default());
        let mut state = AppState::fake();
        state.mailer = mailer.clone();

        send_welcome_email(state, user()).await;

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Welcome to MarketPulse🚀");
        assert!(sent[0].html.contains(r#"data-section="intro""#));
        assert!(sent[0].html.contains("http://app.test/api/unsubscribe?token="));
    }

    #[tokio::test]
    async fn welcome_email_falls_back_when_summarizer_fails() {
        let mailer = Arc::new(RecordingMailer::default());
        let mut state = AppState::fake();
        state.mailer = mailer.clone();
        state.summarizer = Arc::new(crate::testing::StubSummarizer::failing());

        send_welcome_email(state, user()).await;

        assert!(mailer.sent()[0].html.contains("Thanks for joining MarketPulse!"));
    }

    #[tokio::test]
    async fn reset_email_links_to_reset_page() {
        let mailer = Arc::new(RecordingMailer::default());
        let mut state = AppState::fake();
        state.mailer = mailer.clone();

        send_password_reset(&state, &user(), "tok123").await.unwrap();

        assert!(mailer.sent()[0]
            .text
            .contains("http://app.test/reset-password?token=tok123"));
    }
}
