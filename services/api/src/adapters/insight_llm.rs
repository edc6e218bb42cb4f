//! services/api/src/adapters/insight_llm.rs
//!
//! This module contains the adapter for the insight-generating LLM (Gemini).
//! It implements the `InsightGenerationService` port from the `core` crate.

use async_trait::async_trait;
use insight_core::ports::{InsightGenerationService, PortError, PortResult};
use insight_core::prompt::NO_INSIGHT_SENTINEL;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

//=========================================================================================
// Wire Types for the `generateContent` Endpoint
//=========================================================================================

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

/// A single part of a candidate's content.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResponsePart {
    Text { text: String },
    /// Inline data, function calls, and any kind added later.
    Other(serde_json::Value),
}

impl GenerateResponse {
    /// Joins the text parts of the first candidate in order.
    fn into_reply(self) -> String {
        let parts = match self.candidates.into_iter().next().and_then(|c| c.content) {
            Some(content) if !content.parts.is_empty() => content.parts,
            _ => return NO_INSIGHT_SENTINEL.to_string(),
        };

        parts
            .into_iter()
            .filter_map(|part| match part {
                ResponsePart::Text { text } => Some(text),
                ResponsePart::Other(_) => None,
            })
            .collect()
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `InsightGenerationService` against the Gemini REST API.
#[derive(Clone)]
pub struct GeminiInsightAdapter {
    client: Client,
    api_key: String,
    endpoint: String,
    max_retries: u32,
    retry_base_delay: Duration,
}

/// Upper bound on the wait between two attempts.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

fn next_delay(delay: Duration) -> Duration {
    delay.saturating_mul(2).min(MAX_RETRY_DELAY)
}

/// A failed attempt, and whether trying again might help.
struct AttemptError {
    message: String,
    retryable: bool,
}

impl GeminiInsightAdapter {
    /// Creates a new `GeminiInsightAdapter`.
    pub fn new(
        api_key: String,
        base_url: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            endpoint: format!(
                "{}/v1beta/models/{}:generateContent",
                base_url.trim_end_matches('/'),
                model
            ),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(500),
        })
    }

    /// Retries after transport errors, 429 and 5xx, doubling the delay each time
    /// up to `MAX_RETRY_DELAY`.
    pub fn with_retry(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_base_delay = base_delay;
        self
    }

    async fn attempt(&self, request: &GenerateRequest<'_>) -> Result<String, AttemptError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| AttemptError {
                message: format!("Gemini request failed: {}", e),
                retryable: true,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptError {
                message: format!("Gemini returned {}: {}", status, body.trim()),
                retryable: status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error(),
            });
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| AttemptError {
            message: format!("Failed to parse Gemini response: {}", e),
            retryable: false,
        })?;
        Ok(parsed.into_reply())
    }
}

//=========================================================================================
// `InsightGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl InsightGenerationService for GeminiInsightAdapter {
    async fn generate(&self, prompt: &str) -> PortResult<String> {
        let request = GenerateRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let mut delay = self.retry_base_delay;
        let mut attempt = 0;
        loop {
            match self.attempt(&request).await {
                Ok(reply) => {
                    info!("Gemini replied with {} characters.", reply.chars().count());
                    return Ok(reply);
                }
                Err(e) if e.retryable && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        "{} (retry {}/{} in {:?})",
                        e.message, attempt, self.max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = next_delay(delay);
                }
                Err(e) => return Err(PortError::Unexpected(e.message)),
            }
        }
    }
}
