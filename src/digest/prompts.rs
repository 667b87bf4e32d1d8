use crate::market::NewsArticle;

pub const NEWS_SECTION_PROMPT: &str = r#"You are generating HTML content to be injected INSIDE an existing email template.

CRITICAL RULES:
- Output ONLY valid HTML
- NO markdown, NO code fences
- NO <html>, <head>, <body>
- Use inline styles only (no CSS classes or <style> tags)
- Colors MUST use !important to prevent email client dark mode overrides

SECTION TYPE:
{{sectionType}}

NEWS DATA (JSON):
{{newsData}}

REQUIRED STRUCTURE PER ARTICLE:

<table role="presentation" cellspacing="0" cellpadding="0" border="0" width="100%" style="background-color: #1a1f2e !important; border: 1px solid #2d3548 !important; border-radius: 10px; margin-bottom: 20px;">
  <tr><td style="padding: 24px !important;">
    <span style="display: inline-block; border: 1px solid rgba(16, 185, 129, 0.4) !important; border-radius: 4px; padding: 4px 10px; font-size: 11px !important; font-weight: 700 !important; color: #10b981 !important;">TICKER</span>
    <span style="font-size: 12px !important; color: #64748b !important; margin-left: 12px;">Source</span>
    <p style="margin: 12px 0 !important;"><a href="ARTICLE_URL" target="_blank" rel="noopener noreferrer" style="font-size: 16px !important; font-weight: 600 !important; color: #e2e8f0 !important; text-decoration: none !important;">Article Headline Here</a></p>
    <p style="font-size: 14px !important; color: #94a3b8 !important; margin: 0 0 15px 0 !important; line-height: 1.6;">1-2 sentence neutral market summary written for investors.</p>
    <a href="ARTICLE_URL" target="_blank" rel="noopener noreferrer" style="font-size: 13px !important; font-weight: 600 !important; color: #10b981 !important; text-decoration: none !important;">Read full story →</a>
  </td></tr>
</table>

OUTPUT:
- Generate EXACTLY 3 articles (fewer only if fewer are provided)
- If sectionType is "general", omit the ticker badge span (keep only the source)
- Use the actual ticker, source name, headline and URL from the news data
- Headlines must be concise
- Summaries must be factual, not hype
"#;

pub const WELCOME_INTRO_PROMPT: &str = r#"Generate highly personalized HTML content that will be inserted into a welcome email at the {{intro}} placeholder.

User profile data:
{{userProfile}}

REQUIREMENTS:
- Do NOT start with "Welcome"; the email header already says "Welcome aboard". Open with "Thanks for joining", "Great to have you", "You're all set" or similar.
- Refer directly to the user's investment goals, risk tolerance and preferred industry.
- Return ONLY clean HTML: a SINGLE paragraph
  <p style="margin: 0 0 30px 0; font-size: 16px; line-height: 1.6; color: #CCDADC;">content</p>
- Exactly TWO sentences, 35-50 words in total.
- Use <strong> for the personalized elements.
- NO markdown, NO code blocks, NO backticks.
"#;

pub const FALLBACK_WELCOME_INTRO: &str = r#"<p style="margin: 0 0 30px 0; font-size: 16px; line-height: 1.6; color: #CCDADC;">Thanks for joining MarketPulse! You now have the tools to track stocks and get a <strong>daily summary of the news that moves your watchlist</strong>.</p>"#;

/// Onboarding answers that shape the welcome intro.
#[derive(Debug, Clone, Default)]
pub struct WelcomeProfile {
    pub country: String,
    pub investment_goals: Option<String>,
    pub risk_tolerance: Option<String>,
    pub preferred_industry: Option<String>,
}

pub fn news_section_prompt(section_key: &str, articles: &[NewsArticle]) -> anyhow::Result<String> {
    let news = serde_json::to_string_pretty(articles)?;
    Ok(NEWS_SECTION_PROMPT
        .replace("{{sectionType}}", section_key)
        .replace("{{newsData}}", &news))
}

pub fn welcome_prompt(profile: &WelcomeProfile) -> String {
    let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "not specified".to_string());
    let user_profile = format!(
        "- Country: {}\n- Investment goals: {}\n- Risk tolerance: {}\n- Preferred industry: {}",
        profile.country,
        field(&profile.investment_goals),
        field(&profile.risk_tolerance),
        field(&profile.preferred_industry),
    );
    WELCOME_INTRO_PROMPT.replace("{{userProfile}}", &user_profile)
}
