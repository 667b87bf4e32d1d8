use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::GeminiConfig;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Turns a prompt into generated text.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

#[derive(Clone)]
pub struct GeminiClient {
    api_key: Option<String>,
    model: String,
    base_url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: BASE_URL.to_string(),
            client,
        }
    }
}

/// First candidate's first text part, with any markdown code fence removed.
fn extract_text(resp: GenerateResponse) -> Option<String> {
    let text = resp
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .find_map(|p| p.text)?;
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```html")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();
    (!unfenced.is_empty()).then(|| unfenced.to_string())
}

#[async_trait]
impl Summarizer for GeminiClient {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let key = self
            .api_key
            .as_deref()
            .context("GEMINI_API_KEY not configured")?;
        let url = format!("{}/{}:generateContent", self.base_url, self.model);

        let response = self
            .client
            .post(&url)
            .query(&[("key", key)])
            .json(&json!({ "contents": [{ "parts": [{ "text": prompt }] }] }))
            .send()
            .await
            .context("gemini request")?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorEnvelope>()
                .await
                .ok()
                .and_then(|e| e.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| "Gemini API error".to_string());
            anyhow::bail!("gemini HTTP {status}: {message}");
        }

        let body: GenerateResponse = response.json().await.context("decode gemini response")?;
        let text = extract_text(body).context("gemini returned no text")?;
        debug!(model = %self.model, chars = text.len(), "gemini generated");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Option<String> {
        extract_text(serde_json::from_str(raw).unwrap())
    }

    #[test]
    fn extracts_first_text_part() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"<p>hello</p>"}]}}]}"#;
        assert_eq!(parse(raw).as_deref(), Some("<p>hello</p>"));
    }

    #[test]
    fn strips_code_fences() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"```html\n<p>x</p>\n```"}]}}]}"#;
        assert_eq!(parse(raw).as_deref(), Some("<p>x</p>"));
    }

    #[test]
    fn empty_or_missing_candidates_yield_none() {
        assert_eq!(parse(r#"{"candidates":[]}"#), None);
        assert_eq!(parse(r#"{}"#), None);
        assert_eq!(parse(r#"{"candidates":[{"content":{"parts":[{"text":"   "}]}}]}"#), None);
    }

    #[tokio::test]
    async fn missing_key_fails_fast() {
        let client = GeminiClient::new(&GeminiConfig {
            api_key: None,
            model: "m".into(),
        });
        assert!(client.generate("hi").await.is_err());
    }
}
