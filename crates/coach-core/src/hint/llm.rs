//! LLM-backed [`HintService`]: a bearer-authenticated HTTP call with a hard
//! client timeout, synchronous rather than streamed.
//!
//! The HTTP call itself is abstracted behind [`LlmTransport`], the same seam
//! [`crate::asr::AsrTransport`] gives the ASR providers, so `micro`'s failure
//! paths are testable against a canned transport instead of a live network
//! call.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::{build_prompt, Answer, HintService, DEFAULT_LLM_CONFIDENCE};
use crate::config::{LlmConfig, LLM_REQUEST_TIMEOUT};
use crate::ocr::OcrSnapshot;

/// Transport errors from the external hint-generation service.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmTransportError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("upstream returned status {0}")]
    Status(u16),
    #[error("invalid response body: {0}")]
    InvalidBody(String),
}

/// Outbound capability needed by [`LlmHintService`]. Abstracted behind a
/// trait so tests can substitute a canned transport instead of making a live
/// network call.
#[async_trait]
pub trait LlmTransport: Send + Sync {
    /// One request/response round trip: send `prompt`, return the raw
    /// response body text.
    async fn generate(&self, prompt: &str) -> Result<String, LlmTransportError>;
}

/// Production transport: a bearer-authenticated `reqwest::Client` call.
pub struct ReqwestLlmTransport {
    client: reqwest::Client,
    config: LlmConfig,
}

impl ReqwestLlmTransport {
    #[must_use]
    pub fn new(config: LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(LLM_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    fn endpoint(&self) -> String {
        self.config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://llm.invalid/v1/generate".to_string())
    }
}

#[async_trait]
impl LlmTransport for ReqwestLlmTransport {
    async fn generate(&self, prompt: &str) -> Result<String, LlmTransportError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "temperature": 0.7,
            "topP": 0.95,
            "topK": 32,
            "maxOutputTokens": 128,
        });

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| LlmTransportError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(LlmTransportError::Status(response.status().as_u16()));
        }
        response
            .text()
            .await
            .map_err(|e| LlmTransportError::InvalidBody(e.to_string()))
    }
}

pub struct LlmHintService {
    transport: Arc<dyn LlmTransport>,
}

impl LlmHintService {
    #[must_use]
    pub fn new(config: LlmConfig) -> Self {
        Self::with_transport(Arc::new(ReqwestLlmTransport::new(config)))
    }

    #[must_use]
    pub fn with_transport(transport: Arc<dyn LlmTransport>) -> Self {
        Self { transport }
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    answer: Option<String>,
    #[serde(rename = "followUp")]
    follow_up: Option<String>,
    confidence: Option<f32>,
}

/// Strips a leading ```` ```json ```` / ```` ``` ```` fence and its matching
/// closing fence, if present.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches(['\n', '\r']);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[async_trait]
impl HintService for LlmHintService {
    async fn micro(&self, transcript: &str, ocr: &OcrSnapshot) -> Option<Answer> {
        if transcript.trim().is_empty() {
            return None;
        }

        let prompt = build_prompt(transcript, ocr);
        let raw_text = match self.transport.generate(&prompt).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(error = %err, "hint LLM request failed");
                return None;
            }
        };
        if raw_text.trim().is_empty() {
            return None;
        }

        let stripped = strip_code_fence(&raw_text);
        let candidate: Candidate = match serde_json::from_str(stripped) {
            Ok(c) => c,
            Err(err) => {
                tracing::warn!(error = %err, "hint LLM candidate did not parse");
                return None;
            }
        };

        let answer = candidate.answer.unwrap_or_default();
        let follow_up = candidate.follow_up.unwrap_or_default();
        if answer.is_empty() && follow_up.is_empty() {
            return None;
        }

        Some(Answer {
            answer,
            follow_up,
            confidence: candidate.confidence.unwrap_or(DEFAULT_LLM_CONFIDENCE),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence() {
        let raw = "```json\n{\"answer\":\"a\"}\n```";
        assert_eq!(strip_code_fence(raw), "{\"answer\":\"a\"}");
    }

    #[test]
    fn strips_bare_fence() {
        let raw = "```\n{\"answer\":\"a\"}\n```";
        assert_eq!(strip_code_fence(raw), "{\"answer\":\"a\"}");
    }

    #[test]
    fn leaves_unfenced_body_untouched() {
        let raw = "{\"answer\":\"a\"}";
        assert_eq!(strip_code_fence(raw), "{\"answer\":\"a\"}");
    }

    struct FakeTransport(Result<String, LlmTransportError>);

    #[async_trait]
    impl LlmTransport for FakeTransport {
        async fn generate(&self, _prompt: &str) -> Result<String, LlmTransportError> {
            self.0.clone()
        }
    }

    fn service(result: Result<String, LlmTransportError>) -> LlmHintService {
        LlmHintService::with_transport(Arc::new(FakeTransport(result)))
    }

    #[tokio::test]
    async fn blank_transcript_never_calls_transport() {
        let svc = service(Ok(r#"{"answer":"x"}"#.to_string()));
        assert_eq!(svc.micro("   ", &OcrSnapshot::default()).await, None);
    }

    #[tokio::test]
    async fn error_status_yields_no_answer() {
        let svc = service(Err(LlmTransportError::Status(500)));
        assert_eq!(svc.micro("hello", &OcrSnapshot::default()).await, None);
    }

    #[tokio::test]
    async fn empty_body_yields_no_answer() {
        let svc = service(Ok(String::new()));
        assert_eq!(svc.micro("hello", &OcrSnapshot::default()).await, None);
    }

    #[tokio::test]
    async fn unparseable_body_yields_no_answer() {
        let svc = service(Ok("not json".to_string()));
        assert_eq!(svc.micro("hello", &OcrSnapshot::default()).await, None);
    }

    #[tokio::test]
    async fn both_fields_empty_yields_no_answer() {
        let svc = service(Ok(r#"{"answer":"","followUp":""}"#.to_string()));
        assert_eq!(svc.micro("hello", &OcrSnapshot::default()).await, None);
    }

    #[tokio::test]
    async fn well_formed_candidate_yields_answer() {
        let svc = service(Ok(
            r#"{"answer":"Ask about budget","followUp":"What's the deadline?"}"#.to_string(),
        ));
        let answer = svc.micro("hello", &OcrSnapshot::default()).await.unwrap();
        assert_eq!(answer.answer, "Ask about budget");
        assert_eq!(answer.follow_up, "What's the deadline?");
        assert_eq!(answer.confidence, DEFAULT_LLM_CONFIDENCE);
    }

    #[tokio::test]
    async fn fenced_candidate_is_unwrapped() {
        let svc = service(Ok("```json\n{\"answer\":\"a\",\"followUp\":\"b\"}\n```".to_string()));
        let answer = svc.micro("hello", &OcrSnapshot::default()).await.unwrap();
        assert_eq!(answer.answer, "a");
        assert_eq!(answer.follow_up, "b");
    }
}
