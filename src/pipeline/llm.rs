//! Remote completion transport: the Anthropic Messages API behind a trait.
//!
//! This module is intentionally thin — all prompt text lives in
//! [`crate::prompts`] and all fallback policy lives in
//! [`crate::pipeline::engine`], so the transport only knows how to turn a
//! prompt string into a completion string or a [`RemoteCallError`].
//!
//! The [`RemoteCompletion`] trait exists so tests can substitute stub
//! transports (always-failing, canned-response) and so callers can wrap the
//! real client with middleware. The engine never knows which it holds.

use crate::error::RemoteCallError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::debug;

/// Endpoint for the Anthropic Messages API.
const API_URL: &str = "https://api.anthropic.com/v1/messages";

/// API version header value required by the Messages endpoint.
const API_VERSION: &str = "2023-06-01";

/// A single-turn completion transport.
///
/// One method, boxed future so the trait stays object-safe — the config
/// carries it as `Arc<dyn RemoteCompletion>`.
pub trait RemoteCompletion: Send + Sync {
    /// Send `prompt` as one user turn and return the model's text response.
    fn complete(
        &self,
        prompt: String,
        max_tokens: u32,
    ) -> Pin<Box<dyn Future<Output = Result<String, RemoteCallError>> + Send + '_>>;
}

// ── Wire format ──────────────────────────────────────────────────────────

/// One message in the request body.
#[derive(Debug, Serialize)]
struct ApiMessage {
    /// Always "user" — extraction calls are single-turn.
    role: &'static str,
    content: String,
}

/// Request body for the Messages endpoint.
#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ApiMessage>,
}

/// One content block in the response.
#[derive(Debug, Deserialize)]
struct ApiContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Token usage statistics returned by the API.
#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

/// Response body from the Messages endpoint.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ApiContentBlock>,
    usage: ApiUsage,
}

// ── Client ───────────────────────────────────────────────────────────────

/// Anthropic Messages API client.
///
/// Holds its credential explicitly — the environment is never consulted
/// here (see [`crate::config::ProcessConfig::from_env`] for the single
/// place that happens).
#[derive(Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    async fn send(&self, prompt: String, max_tokens: u32) -> Result<String, RemoteCallError> {
        let body = ApiRequest {
            model: self.model.clone(),
            max_tokens,
            messages: vec![ApiMessage {
                role: "user",
                content: prompt,
            }],
        };

        let request = self
            .http
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send();

        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| RemoteCallError::Timeout {
                secs: self.timeout.as_secs(),
            })?
            .map_err(|e| RemoteCallError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteCallError::Status {
                status: status.as_u16(),
                body: truncate(&body, 200),
            });
        }

        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| RemoteCallError::Malformed(e.to_string()))?;

        debug!(
            "LLM call: {} tokens in / {} tokens out",
            parsed.usage.input_tokens, parsed.usage.output_tokens
        );

        let text: String = parsed
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(RemoteCallError::Empty);
        }
        Ok(text)
    }
}

impl RemoteCompletion for AnthropicClient {
    fn complete(
        &self,
        prompt: String,
        max_tokens: u32,
    ) -> Pin<Box<dyn Future<Output = Result<String, RemoteCallError>> + Send + '_>> {
        Box::pin(self.send(prompt, max_tokens))
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let body = ApiRequest {
            model: "claude-sonnet-4-20250514".into(),
            max_tokens: 256,
            messages: vec![ApiMessage {
                role: "user",
                content: "Hello".into(),
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["max_tokens"], 256);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "Hello");
    }

    #[test]
    fn response_parses_and_joins_text_blocks() {
        let raw = r#"{
            "id": "msg_1",
            "content": [
                {"type": "text", "text": "Paper "},
                {"type": "text", "text": "Title"}
            ],
            "usage": {"input_tokens": 9, "output_tokens": 4}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(raw).unwrap();
        let text: String = parsed
            .content
            .iter()
            .filter(|b| b.kind == "text")
            .map(|b| b.text.as_str())
            .collect();
        assert_eq!(text, "Paper Title");
        assert_eq!(parsed.usage.output_tokens, 4);
    }

    #[test]
    fn response_with_unknown_block_kind_still_parses() {
        let raw = r#"{
            "content": [{"type": "tool_use", "id": "t1", "name": "x", "input": {}}],
            "usage": {"input_tokens": 1, "output_tokens": 1}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.content.len(), 1);
        assert_eq!(parsed.content[0].kind, "tool_use");
        assert!(parsed.content[0].text.is_empty());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "héllo wörld, this is a long string";
        let t = truncate(s, 10);
        assert!(t.len() <= 14); // 10 bytes + ellipsis
        assert!(t.ends_with('…'));
    }
}
