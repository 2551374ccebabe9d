//! Single point of entry for all generative-AI calls.
//!
//! ARCHITECTURAL RULE: No other module may call the generation service directly.
//! Everything goes through `TextGenerator`, so the pipeline can be driven by a
//! scripted generator in tests and by `GeminiClient` in production.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;

#[derive(Debug, Error)]
pub enum LlmError {
    /// No caller credential and no process default: the service was not contacted.
    #[error("no API key configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// One call to the generation service.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    /// Caller-supplied credential overriding the process default.
    pub api_key: Option<&'a str>,
}

/// Text-in, text-out generation backend.
///
/// Implementations return the raw model text. Mapping failures to fallback
/// values is the pipeline's job, not the backend's.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
pub struct CandidatePart {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    #[serde(rename = "promptTokenCount", default)]
    pub prompt_tokens: u32,
    #[serde(rename = "candidatesTokenCount", default)]
    pub output_tokens: u32,
}

impl GeminiResponse {
    /// Concatenates the text parts of the first candidate.
    pub fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

/// Google Generative Language REST client.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_url: String,
    default_api_key: Option<String>,
    max_attempts: u32,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.genai_timeout_secs))
                .build()?,
            api_url: config.genai_api_url.trim_end_matches('/').to_string(),
            default_api_key: config.genai_api_key.clone(),
            max_attempts: config.genai_max_attempts.max(1),
        })
    }

    /// Non-empty caller key first, then the process default.
    fn resolve_key<'a>(&'a self, caller: Option<&'a str>) -> Option<&'a str> {
        caller
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .or_else(|| self.default_api_key.as_deref().filter(|k| !k.is_empty()))
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    /// Retries 429 and 5xx with exponential backoff when more than one attempt is configured.
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, LlmError> {
        let api_key = self
            .resolve_key(request.api_key)
            .ok_or(LlmError::NotConfigured)?;

        let url = format!("{}/models/{}:generateContent", self.api_url, request.model);
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: request.prompt,
                }],
            }],
        };

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1).min(5)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&url)
                .header("x-goog-api-key", api_key)
                .json(&body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<GeminiError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let parsed: GeminiResponse = serde_json::from_str(&response.text().await?)?;

            if let Some(usage) = &parsed.usage {
                debug!(
                    "LLM call succeeded: model={}, prompt_tokens={}, output_tokens={}",
                    request.model, usage.prompt_tokens, usage.output_tokens
                );
            }

            return parsed
                .text()
                .map(|t| t.trim().to_string())
                .ok_or(LlmError::EmptyContent);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: self.max_attempts,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_with_default(key: Option<&str>) -> GeminiClient {
        let config = Config {
            genai_api_key: key.map(String::from),
            // Unroutable: any accidental network call fails fast instead of succeeding.
            genai_api_url: "http://127.0.0.1:9".to_string(),
            ..Config::default()
        };
        GeminiClient::new(&config).unwrap()
    }

    #[test]
    fn test_caller_key_overrides_default() {
        let client = client_with_default(Some("default-key"));
        assert_eq!(client.resolve_key(Some("caller")), Some("caller"));
        assert_eq!(client.resolve_key(Some("   ")), Some("default-key"));
        assert_eq!(client.resolve_key(None), Some("default-key"));
    }

    #[tokio::test]
    async fn test_missing_credentials_never_touch_network() {
        let client = client_with_default(None);
        let result = client
            .generate(GenerationRequest {
                model: "gemini-2.5-flash",
                prompt: "hello",
                api_key: None,
            })
            .await;
        assert!(matches!(result, Err(LlmError::NotConfigured)));
    }

    #[test]
    fn test_response_text_joins_parts_of_first_candidate() {
        let json = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "SCORE: 9\n"}, {"text": "FEEDBACK: ok"}]}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 5}
        }"#;
        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text().as_deref(), Some("SCORE: 9\nFEEDBACK: ok"));
        assert_eq!(response.usage.unwrap().output_tokens, 5);
    }

    #[test]
    fn test_response_without_candidates_has_no_text() {
        let response: GeminiResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(response.text().is_none());

        let blocked: GeminiResponse =
            serde_json::from_str(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#).unwrap();
        assert!(blocked.text().is_none());
    }

    #[test]
    fn test_request_body_shape() {
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: "prompt" }],
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "prompt");
    }
}
