// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! LLM-backed entity extraction, with a pluggable transport so the retry
//! and parsing logic can be tested without a live API call.

use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

use crate::error::ExtractorError;
use crate::store::EntityType;

use super::types::{ExtractOptions, ExtractionResult, ExtractorSource, RawEntity};

/// Abstracts the HTTP call so [`LlmClient`] is testable with a fake.
/// The real implementation wraps `reqwest::blocking::Client`.
#[cfg_attr(test, mockall::automock)]
pub trait LlmTransport: Send + Sync {
    fn complete(&self, prompt: &str, timeout: Duration) -> Result<String, ExtractorError>;
}

/// `reqwest::blocking`-backed transport against an Anthropic-shaped
/// messages endpoint.
pub struct HttpLlmTransport {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl HttpLlmTransport {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[derive(serde::Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<MessageBody<'a>>,
}

#[derive(serde::Serialize)]
struct MessageBody<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

impl LlmTransport for HttpLlmTransport {
    fn complete(&self, prompt: &str, timeout: Duration) -> Result<String, ExtractorError> {
        let body = MessageRequest {
            model: &self.model,
            max_tokens: 4096,
            messages: vec![MessageBody { role: "user", content: prompt }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(timeout)
            .header("x-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()?;

        if response.status().as_u16() == 429 {
            return Err(ExtractorError::LLMRateLimited(format!(
                "rate limited by {}",
                self.endpoint
            )));
        }
        if !response.status().is_success() {
            return Err(ExtractorError::LLMTransportError(format!(
                "unexpected status {} from {}",
                response.status(),
                self.endpoint
            )));
        }

        let parsed: MessageResponse = response.json()?;
        parsed
            .content
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| ExtractorError::LLMParseError("empty content blocks".to_string()))
    }
}

/// A raw entity as returned in the model's JSON response, before it's
/// converted to [`RawEntity`].
#[derive(Deserialize)]
struct LlmEntity {
    name: String,
    #[serde(rename = "type")]
    entity_type: String,
    confidence: f32,
    context: Option<String>,
}

#[derive(Deserialize)]
struct LlmEntityList {
    entities: Vec<LlmEntity>,
}

/// Retries transient failures with jittered exponential backoff, then
/// parses the model's JSON entity list. Non-transient failures (parse
/// errors, unsupported kind) are not retried; see
/// [`ExtractorError::is_retryable`].
pub struct LlmClient<T: LlmTransport> {
    transport: T,
}

impl<T: LlmTransport> LlmClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn extract(&self, prompt: &str, options: &ExtractOptions) -> Result<ExtractionResult, ExtractorError> {
        let timeout = Duration::from_secs(options.timeout_secs);
        let mut attempt = 0u32;

        loop {
            match self.transport.complete(prompt, timeout) {
                Ok(raw) => return parse_response(&raw).map(|entities| ExtractionResult {
                    source: ExtractorSource::Llm,
                    entities,
                }),
                Err(err) if err.is_retryable() && attempt < options.max_retries => {
                    std::thread::sleep(backoff_delay(attempt));
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Exponential backoff with full jitter: `rand(0, min(cap, base * 2^attempt))`.
fn backoff_delay(attempt: u32) -> Duration {
    const BASE_MS: u64 = 200;
    const CAP_MS: u64 = 10_000;
    let exp = BASE_MS.saturating_mul(1u64 << attempt.min(16));
    let capped = exp.min(CAP_MS);
    let jittered = rand::rng().random_range(0..=capped);
    Duration::from_millis(jittered)
}

fn parse_response(raw: &str) -> Result<Vec<RawEntity>, ExtractorError> {
    let json_slice = extract_json_object(raw).unwrap_or(raw);
    let parsed: LlmEntityList = serde_json::from_str(json_slice)?;

    Ok(parsed
        .entities
        .into_iter()
        .filter_map(|e| {
            EntityType::from_str(&e.entity_type).map(|entity_type| RawEntity {
                name: e.name,
                entity_type,
                confidence: e.confidence.clamp(0.0, 1.0),
                context: e.context,
            })
        })
        .collect())
}

/// The model sometimes wraps JSON in prose or a markdown fence; find the
/// outermost `{...}` block.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_object_strips_fence() {
        let raw = "Here you go:\n```json\n{\"entities\": []}\n```\nHope that helps.";
        assert_eq!(extract_json_object(raw), Some("{\"entities\": []}"));
    }

    #[test]
    fn test_parse_response_valid_entities() {
        let raw = r#"{"entities": [{"name": "Ada Lovelace", "type": "person", "confidence": 0.92, "context": "early computing pioneer"}]}"#;
        let entities = parse_response(raw).unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].name, "Ada Lovelace");
        assert_eq!(entities[0].entity_type, EntityType::Person);
    }

    #[test]
    fn test_parse_response_drops_unknown_type() {
        let raw = r#"{"entities": [{"name": "Mystery", "type": "bogus", "confidence": 0.5, "context": null}]}"#;
        let entities = parse_response(raw).unwrap();
        assert!(entities.is_empty());
    }

    #[test]
    fn test_parse_response_clamps_confidence() {
        let raw = r#"{"entities": [{"name": "X", "type": "other", "confidence": 1.5, "context": null}]}"#;
        let entities = parse_response(raw).unwrap();
        assert_eq!(entities[0].confidence, 1.0);
    }

    #[test]
    fn test_llm_client_retries_on_rate_limit_then_succeeds() {
        let mut mock = MockLlmTransport::new();
        let mut call_count = 0;
        mock.expect_complete().times(2).returning(move |_, _| {
            call_count += 1;
            if call_count == 1 {
                Err(ExtractorError::LLMRateLimited("slow down".to_string()))
            } else {
                Ok(r#"{"entities": [{"name": "Y", "type": "other", "confidence": 0.7, "context": null}]}"#.to_string())
            }
        });

        let client = LlmClient::new(mock);
        let result = client.extract("prompt", &ExtractOptions { max_retries: 3, timeout_secs: 1 }).unwrap();
        assert_eq!(result.entities.len(), 1);
    }

    #[test]
    fn test_llm_client_gives_up_after_max_retries() {
        let mut mock = MockLlmTransport::new();
        mock.expect_complete()
            .times(4)
            .returning(|_, _| Err(ExtractorError::LLMTransportError("connection reset".to_string())));

        let client = LlmClient::new(mock);
        let result = client.extract("prompt", &ExtractOptions { max_retries: 3, timeout_secs: 1 });
        assert!(result.is_err());
    }

    #[test]
    fn test_llm_client_does_not_retry_parse_error() {
        let mut mock = MockLlmTransport::new();
        mock.expect_complete().times(1).returning(|_, _| Ok("not json".to_string()));

        let client = LlmClient::new(mock);
        let result = client.extract("prompt", &ExtractOptions { max_retries: 3, timeout_secs: 1 });
        assert!(result.is_err());
    }
}
