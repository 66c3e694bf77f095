//! LLM client (C4): a thin, retrying wrapper around a generative text API
//! with a full audit trail of every prompt and response.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::rate_limiter::RateLimiter;
use crate::error::{is_retryable_message, LlmError};
use crate::models::GeminiInteraction;

/// A single call's text result plus the audit entry recorded for it.
pub struct LlmResponse {
    pub text: String,
    pub interaction: GeminiInteraction,
}

/// Default sampling temperature for free-text generation calls.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
/// Default response token ceiling, matching the Gemini Flash context budget
/// this client is tuned for.
pub const DEFAULT_MAX_TOKENS: u32 = 8192;
/// Lower temperature used for structured (JSON) output, where creativity
/// hurts parseability.
const STRUCTURED_OUTPUT_TEMPERATURE: f64 = 0.3;

/// Abstraction over the generative backend so the enrichment phase and
/// AJE generator can be exercised against a mock in tests.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, prompt: &str, purpose: &str, temperature: f64, max_tokens: u32) -> Result<LlmResponse, LlmError>;

    /// Generates a response and parses it as JSON, stripping a fenced
    /// ```json ... ``` or ``` ... ``` code block if the model wrapped one
    /// around the payload. Uses a lower temperature than free-text
    /// generation since structured output needs to parse, not vary.
    async fn generate_json(&self, prompt: &str, purpose: &str) -> Result<(serde_json::Value, GeminiInteraction), LlmError> {
        let instructed = format!("{prompt}\n\nIMPORTANT: Return ONLY valid JSON. No markdown, no explanation, just the JSON object.");
        let response = self.generate(&instructed, purpose, STRUCTURED_OUTPUT_TEMPERATURE, DEFAULT_MAX_TOKENS).await?;
        let stripped = strip_code_fence(&response.text);
        let parsed: serde_json::Value =
            serde_json::from_str(stripped).map_err(|e| LlmError::InvalidJson(e.to_string()))?;
        if !parsed.is_object() && !parsed.is_array() {
            return Err(LlmError::ScalarResponse);
        }
        Ok((parsed, response.interaction))
    }
}

/// Strips a single leading ```json or ``` fence (and trailing ```) from a
/// model response, matching the source's "grab the first fenced block"
/// behavior rather than a full markdown parse.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    for marker in ["```json", "```"] {
        if let Some(rest) = trimmed.strip_prefix(marker) {
            if let Some(end) = rest.find("```") {
                return rest[..end].trim();
            }
            return rest.trim();
        }
    }
    trimmed
}

pub struct GeminiClient {
    api_key: Option<String>,
    model: String,
    timeout: Duration,
    max_retries: u32,
    http: reqwest::Client,
    rate_limiter: RateLimiter,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, model: String, rate_limit_per_minute: u32, timeout_secs: u64, max_retries: u32) -> Self {
        Self {
            api_key,
            model,
            timeout: Duration::from_secs(timeout_secs),
            max_retries,
            http: reqwest::Client::new(),
            rate_limiter: RateLimiter::new(rate_limit_per_minute),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        )
    }

    async fn call_once(&self, prompt: &str, temperature: f64, max_tokens: u32) -> Result<String, LlmError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| LlmError::Transport("LLM API not configured".to_string()))?;

        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": temperature, "maxOutputTokens": max_tokens },
        });

        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Transport(format!("{status}: {text}")));
        }

        let payload: serde_json::Value = response.json().await.map_err(|e| LlmError::Transport(e.to_string()))?;
        payload
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| LlmError::Blocked("response contained no text candidate".to_string()))
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, prompt: &str, purpose: &str, temperature: f64, max_tokens: u32) -> Result<LlmResponse, LlmError> {
        let timestamp = Utc::now();
        let prompt_hash = format!("{:x}", Sha256::digest(prompt.as_bytes()));

        let mut last_error: Option<LlmError> = None;
        for attempt in 0..=self.max_retries {
            self.rate_limiter.wait_if_needed().await;
            info!(attempt = attempt + 1, max = self.max_retries + 1, purpose, "calling LLM");

            match self.call_once(prompt, temperature, max_tokens).await {
                Ok(text) => {
                    self.rate_limiter.record_success().await;
                    let response_hash = format!("{:x}", Sha256::digest(text.as_bytes()));
                    debug!(chars = text.len(), "received LLM response");
                    return Ok(LlmResponse {
                        interaction: GeminiInteraction {
                            timestamp,
                            purpose: purpose.to_string(),
                            prompt_full: prompt.to_string(),
                            prompt_hash,
                            response_full: text.clone(),
                            response_hash,
                            model: self.model.clone(),
                            error: None,
                        },
                        text,
                    });
                }
                Err(err) => {
                    let retryable = err.is_retryable();
                    if retryable {
                        let backoff = self.rate_limiter.record_failure().await;
                        warn!(attempt = attempt + 1, error = %err, backoff_secs = backoff.as_secs(), "retryable LLM error");
                        if attempt < self.max_retries {
                            tokio::time::sleep(backoff).await;
                            last_error = Some(err);
                            continue;
                        }
                    } else {
                        warn!(error = %err, "non-retryable LLM error");
                        last_error = Some(err);
                        break;
                    }
                    last_error = Some(err);
                }
            }
        }

        let err = last_error.unwrap_or(LlmError::Transport("unknown error".to_string()));
        if err.is_retryable() {
            Err(LlmError::QuotaExceeded {
                attempts: self.max_retries + 1,
                message: err.to_string(),
            })
        } else {
            Err(err)
        }
    }
}

/// Verifies a message against the shared retryable-phrase classifier
/// (re-exported here so callers reaching for the LLM client don't need to
/// import from `crate::error` directly).
pub fn is_retryable(message: &str) -> bool {
    is_retryable_message(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence() {
        let text = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fence(text), "{\"a\": 1}");
    }

    #[test]
    fn strips_bare_fence() {
        let text = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fence(text), "{\"a\": 1}");
    }

    #[test]
    fn passes_through_unfenced_text() {
        let text = "{\"a\": 1}";
        assert_eq!(strip_code_fence(text), "{\"a\": 1}");
    }

    #[test]
    fn retryable_phrase_detection_matches_shared_classifier() {
        assert!(is_retryable("503 Service Unavailable"));
        assert!(!is_retryable("invalid request body"));
    }
}
