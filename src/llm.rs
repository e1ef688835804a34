//! Chat-completion client used by the extraction and pagination requestors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{Result, ScrapeError};

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send one system + one user message and return the assistant's reply text.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint (Groq by default).
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl OpenAiCompatClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ScrapeError::model(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| ScrapeError::model("No API key configured (set LLM_API_KEY or GROQ_API_KEY)"))?;

        let request = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
        };

        let resp = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ScrapeError::model(format!("API error {}: {}", status, body)));
        }

        let body: ChatResponse = resp.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ScrapeError::model("Missing choices[0].message.content"))?;

        debug!("Model reply ({} chars): {}", content.len(), content);
        Ok(content.trim().to_string())
    }
}

/// Unwrap a reply wrapped in a Markdown code fence, e.g. "```json\n{...}\n```"
/// or "```json {...}```".
pub fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.trim_end();
    let rest = rest.strip_suffix("```").unwrap_or(rest);

    match rest.find('\n') {
        Some(newline) if rest[..newline].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
            rest[newline + 1..].trim()
        }
        _ => strip_language_tag(rest).trim(),
    }
}

/// Drop a leading info string such as `json` when the body follows on the same line.
fn strip_language_tag(body: &str) -> &str {
    let tag_len = body
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(body.len());
    let after = &body[tag_len..];
    if tag_len > 0 && after.starts_with(|c: char| c.is_whitespace() || c == '{' || c == '[') {
        after
    } else {
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use std::time::Duration;

    async fn spawn_endpoint(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/v1/chat/completions", addr)
    }

    fn client_for(url: String, key: Option<&str>) -> OpenAiCompatClient {
        OpenAiCompatClient::new(LlmConfig {
            api_url: url,
            api_key: key.map(str::to_string),
            model: "test-model".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn sends_system_and_user_messages() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|headers: axum::http::HeaderMap, Json(body): Json<serde_json::Value>| async move {
                assert_eq!(headers["authorization"], "Bearer secret");
                assert_eq!(body["model"], "test-model");
                assert_eq!(body["messages"][0]["role"], "system");
                assert_eq!(body["messages"][1]["content"], "page text");
                Json(serde_json::json!({
                    "choices": [{ "message": { "role": "assistant", "content": " {\"page_urls\": []} " } }]
                }))
            }),
        );
        let client = client_for(spawn_endpoint(router).await, Some("secret"));

        let reply = client.complete("be helpful", "page text").await.unwrap();

        assert_eq!(reply, "{\"page_urls\": []}");
    }

    #[tokio::test]
    async fn http_error_maps_to_external_model_error() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "rate limited") }),
        );
        let client = client_for(spawn_endpoint(router).await, Some("secret"));

        let err = client.complete("s", "u").await.unwrap_err();

        assert!(matches!(err, ScrapeError::ExternalModel(ref msg) if msg.contains("429")));
    }

    #[tokio::test]
    async fn missing_content_is_an_error() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(serde_json::json!({ "choices": [] })) }),
        );
        let client = client_for(spawn_endpoint(router).await, Some("secret"));

        assert!(matches!(
            client.complete("s", "u").await,
            Err(ScrapeError::ExternalModel(_))
        ));
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let client = client_for("http://127.0.0.1:9/unused".to_string(), None);

        let err = client.complete("s", "u").await.unwrap_err();

        assert!(err.to_string().contains("API key"));
    }

    #[test]
    fn strips_json_fences() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```\n[1]\n```\n"), "[1]");
        assert_eq!(strip_code_fence("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn strips_single_line_fences() {
        assert_eq!(
            strip_code_fence("```json {\"listings\":[]}```"),
            "{\"listings\":[]}"
        );
        assert_eq!(strip_code_fence("```json{\"a\": 1}```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("``` [1, 2] ```"), "[1, 2]");
        assert_eq!(strip_code_fence("```true```"), "true");
    }
}
