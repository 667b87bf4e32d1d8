//! Email bodies, rendered from `templates/email/*`. Every email has an HTML
//! part and a plain-text twin.

use askama::Template;

use super::OutgoingEmail;

#[derive(Template)]
#[template(path = "email/daily_digest.html")]
struct DailyDigestHtml<'a> {
    date: &'a str,
    /// Trusted HTML produced by the summarizer.
    news_content: &'a str,
    unsubscribe_url: &'a str,
    app_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/daily_digest.txt")]
struct DailyDigestText<'a> {
    date: &'a str,
    unsubscribe_url: &'a str,
    app_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/welcome.html")]
struct WelcomeHtml<'a> {
    name: &'a str,
    /// Trusted HTML: the generated intro or the fixed fallback.
    intro: &'a str,
    unsubscribe_url: &'a str,
    app_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/welcome.txt")]
struct WelcomeText<'a> {
    name: &'a str,
    unsubscribe_url: &'a str,
    app_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset.html")]
struct PasswordResetHtml<'a> {
    reset_link: &'a str,
    unsubscribe_url: &'a str,
    app_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct PasswordResetText<'a> {
    reset_link: &'a str,
}

pub fn daily_digest(
    to: &str,
    date: &str,
    news_content: &str,
    unsubscribe_url: &str,
    app_url: &str,
) -> anyhow::Result<OutgoingEmail> {
    let html = DailyDigestHtml {
        date,
        news_content,
        unsubscribe_url,
        app_url,
    }
    .render()?;
    let text = DailyDigestText {
        date,
        unsubscribe_url,
        app_url,
    }
    .render()?;
    Ok(OutgoingEmail {
        to: to.to_string(),
        subject: format!("📈 Market News Summary Today - {date}"),
        text,
        html,
    })
}

pub fn welcome(
    to: &str,
    name: &str,
    intro: &str,
    unsubscribe_url: &str,
    app_url: &str,
) -> anyhow::Result<OutgoingEmail> {
    let html = WelcomeHtml {
        name,
        intro,
        unsubscribe_url,
        app_url,
    }
    .render()?;
    let text = WelcomeText {
        name,
        unsubscribe_url,
        app_url,
    }
    .render()?;
    Ok(OutgoingEmail {
        to: to.to_string(),
        subject: "Welcome to MarketPulse🚀".to_string(),
        text,
        html,
    })
}

pub fn password_reset(to: &str, reset_link: &str, app_url: &str) -> anyhow::Result<OutgoingEmail> {
    let html = PasswordResetHtml {
        reset_link,
        unsubscribe_url: "",
        app_url,
    }
    .render()?;
    let text = PasswordResetText { reset_link }.render()?;
    Ok(OutgoingEmail {
        to: to.to_string(),
        subject: "Reset Your MarketPulse Password 🔒".to_string(),
        text,
        html,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_embeds_content_date_and_unsubscribe_link() {
        let email = daily_digest(
            "u@example.com",
            "Sunday, October 18, 2026",
            "<table>AAPL</table>",
            "http://app.test/api/unsubscribe?token=abc",
            "http://app.test",
        )
        .unwrap();
        assert_eq!(email.to, "u@example.com");
        assert!(email.subject.ends_with("Sunday, October 18, 2026"));
        assert!(email.html.contains("<table>AAPL</table>"));
        assert!(email.html.contains("href=\"http://app.test/api/unsubscribe?token=abc\""));
        assert!(email.text.contains("Unsubscribe: http://app.test/api/unsubscribe?token=abc"));
        assert!(!email.text.contains("<table>"));
    }

    #[test]
    fn welcome_escapes_the_user_name_but_not_the_intro() {
        let email = welcome("u@example.com", "<b>Eve</b>", "<p>hi</p>", "http://x/u", "http://x").unwrap();
        assert!(email.html.contains("&lt;b&gt;Eve&lt;/b&gt;"));
        assert!(!email.html.contains("<b>Eve</b>"));
        assert!(email.html.contains("<p>hi</p>"));
        assert!(email.text.contains("Welcome aboard <b>Eve</b>"));
    }

    #[test]
    fn reset_email_carries_link_in_text_and_html() {
        let email =
            password_reset("u@example.com", "http://x/reset-password?token=t", "http://x").unwrap();
        assert!(email.text.contains("http://x/reset-password?token=t"));
        assert!(email.html.contains("href=\"http://x/reset-password?token=t\""));
        assert!(!email.html.contains("Unsubscribe"));
    }
}
