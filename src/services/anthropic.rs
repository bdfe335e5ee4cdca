//! Anthropic Messages API client implementing [`Summarizer`].
//!
//! One request per run: the (truncated) document text goes up, a JSON scene
//! plan comes back. The client does exactly one attempt per call — the
//! bounded retry lives in [`crate::pipeline::plan`] so that a transport
//! failure and a malformed reply share the same policy.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{ServiceError, Summarizer};
use crate::prompts::{planner_user_prompt, PLANNER_SYSTEM_PROMPT};

const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 8192;

/// Summarizer backed by the Anthropic Messages API.
pub struct AnthropicSummarizer {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    system_prompt: Option<String>,
    timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl AnthropicSummarizer {
    /// Create a client with an explicit API key.
    pub fn new(api_key: impl Into<String>, model: Option<&str>, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            system_prompt: None,
            timeout_secs,
        }
    }

    /// Create a client from the `ANTHROPIC_API_KEY` environment variable.
    pub fn from_env(model: Option<&str>, timeout_secs: u64) -> Option<Self> {
        let key = std::env::var("ANTHROPIC_API_KEY").ok()?;
        if key.is_empty() {
            return None;
        }
        Some(Self::new(key, model, timeout_secs))
    }

    /// Point the client at a different endpoint (proxies, test servers).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Override the planner system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

#[async_trait]
impl Summarizer for AnthropicSummarizer {
    async fn summarize(
        &self,
        document_text: &str,
        scene_count: usize,
        target_duration_secs: f64,
    ) -> Result<String, ServiceError> {
        let url = format!("{}/v1/messages", self.endpoint.trim_end_matches('/'));
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system: self
                .system_prompt
                .as_deref()
                .unwrap_or(PLANNER_SYSTEM_PROMPT),
            messages: vec![Message {
                role: "user",
                content: planner_user_prompt(document_text, scene_count, target_duration_secs),
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::Timeout {
                        secs: self.timeout_secs,
                    }
                } else {
                    ServiceError::Backend {
                        detail: format!("request failed: {e}"),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ServiceError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let reply: MessagesResponse = response.json().await.map_err(|e| ServiceError::Backend {
            detail: format!("unparseable response body: {e}"),
        })?;

        let text: String = reply
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect();

        debug!("planner reply: {} chars from {}", text.len(), self.model);
        Ok(text)
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_text_blocks_are_concatenated() {
        let json = r#"{
            "content": [
                {"type": "text", "text": "{\"clips\":"},
                {"type": "tool_use"},
                {"type": "text", "text": "[]}"}
            ]
        }"#;
        let reply: MessagesResponse = serde_json::from_str(json).unwrap();
        let text: String = reply
            .content
            .iter()
            .filter(|b| b.kind == "text")
            .map(|b| b.text.as_str())
            .collect();
        assert_eq!(text, r#"{"clips":[]}"#);
    }

    #[test]
    fn request_serialises_expected_shape() {
        let request = MessagesRequest {
            model: "claude-3-5-sonnet-20241022",
            max_tokens: 8192,
            system: "be brief",
            messages: vec![Message {
                role: "user",
                content: "hello".into(),
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "claude-3-5-sonnet-20241022");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["system"], "be brief");
    }
}
