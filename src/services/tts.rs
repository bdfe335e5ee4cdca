//! OpenAI speech API client implementing [`SpeechSynthesizer`].
//!
//! ## Pre-call input guard
//!
//! The speech endpoint rejects inputs over its character limit with an
//! opaque 400. Hitting that limit is a programming-side condition we can
//! check for free, so narration is trimmed to the limit at a word boundary
//! *before* the request. Narration that long only occurs when the planner
//! wildly overshoots a scene's target duration, and the tail of an overshot
//! narration would be cut against the clip anyway.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use super::{AudioSegment, ServiceError, SpeechSynthesizer};
use crate::pipeline::ffmpeg;

const DEFAULT_ENDPOINT: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "tts-1";

/// Documented input limit of the speech endpoint, in characters.
pub const MAX_INPUT_CHARS: usize = 4096;

/// Speech synthesizer backed by the OpenAI audio API.
pub struct OpenAiSpeech {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    voice: String,
    timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

impl OpenAiSpeech {
    /// Create a client with an explicit API key.
    pub fn new(api_key: impl Into<String>, voice: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            voice: voice.into(),
            timeout_secs,
        }
    }

    /// Create a client from the `OPENAI_API_KEY` environment variable.
    pub fn from_env(voice: impl Into<String>, timeout_secs: u64) -> Option<Self> {
        let key = std::env::var("OPENAI_API_KEY").ok()?;
        if key.is_empty() {
            return None;
        }
        Some(Self::new(key, voice, timeout_secs))
    }

    /// Point the client at a different endpoint (proxies, test servers).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Trim text to `limit` characters, backing up to the last word boundary.
///
/// Falls back to a hard char cut when the text is a single giant word.
pub fn clamp_input(text: &str, limit: usize) -> &str {
    let hard_cut = match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => byte_idx,
        None => return text,
    };
    match text[..hard_cut].rfind(char::is_whitespace) {
        Some(space_idx) if space_idx > 0 => text[..space_idx].trim_end(),
        _ => &text[..hard_cut],
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeech {
    async fn synthesize(
        &self,
        scene_index: usize,
        text: &str,
        out_path: &Path,
    ) -> Result<AudioSegment, ServiceError> {
        if text.trim().is_empty() {
            return Err(ServiceError::InvalidRequest {
                detail: format!("scene {scene_index}: narration text is empty"),
            });
        }

        let input = clamp_input(text, MAX_INPUT_CHARS);
        if input.len() < text.len() {
            warn!(
                "scene {}: narration trimmed from {} to {} chars for the speech API",
                scene_index,
                text.chars().count(),
                input.chars().count()
            );
        }

        let url = format!("{}/v1/audio/speech", self.endpoint.trim_end_matches('/'));
        let request = SpeechRequest {
            model: &self.model,
            input,
            voice: &self.voice,
            response_format: "wav",
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
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

        let bytes = response.bytes().await.map_err(|e| ServiceError::Backend {
            detail: format!("failed to read audio body: {e}"),
        })?;

        tokio::fs::write(out_path, &bytes).await?;
        let duration_secs = ffmpeg::probe_duration(out_path).await?;
        debug!(
            "scene {}: synthesized {:.2}s of narration ({} bytes)",
            scene_index,
            duration_secs,
            bytes.len()
        );

        Ok(AudioSegment {
            scene_index,
            path: out_path.to_path_buf(),
            duration_secs,
        })
    }

    fn name(&self) -> &str {
        "openai-speech"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_keeps_short_text_intact() {
        assert_eq!(clamp_input("a short narration", 4096), "a short narration");
    }

    #[test]
    fn clamp_cuts_at_word_boundary() {
        let text = "one two three four";
        // Limit lands in the middle of "three" → cut back to "one two".
        assert_eq!(clamp_input(text, 10), "one two");
    }

    #[test]
    fn clamp_handles_single_giant_word() {
        let text = "a".repeat(5000);
        let cut = clamp_input(&text, 4096);
        assert_eq!(cut.chars().count(), 4096);
    }

    #[test]
    fn clamp_is_char_safe() {
        let text = "ααα βββ γγγ";
        let cut = clamp_input(text, 9);
        assert!(text.starts_with(cut));
        assert!(cut.chars().count() <= 9);
    }

    #[test]
    fn speech_request_serialises_expected_shape() {
        let request = SpeechRequest {
            model: "tts-1",
            input: "hello",
            voice: "alloy",
            response_format: "wav",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "tts-1");
        assert_eq!(json["voice"], "alloy");
        assert_eq!(json["response_format"], "wav");
    }
}
