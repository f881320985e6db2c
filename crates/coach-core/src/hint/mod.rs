//! Hint service: one synchronous call that turns a final transcript plus
//! OCR context into a coaching answer and follow-up question.

mod fallback;
mod llm;
mod prompt;

pub use fallback::FallbackHintService;
pub use llm::{LlmHintService, LlmTransport, LlmTransportError, ReqwestLlmTransport};
pub use prompt::build_prompt;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::ocr::OcrSnapshot;

/// Default confidence attached to an LLM answer that omitted one.
pub const DEFAULT_LLM_CONFIDENCE: f32 = 0.8;

/// `{answer, followUp, confidence}` — either string may be empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub answer: String,
    pub follow_up: String,
    pub confidence: f32,
}

/// One synchronous request/response over an external coaching model.
#[async_trait]
pub trait HintService: Send + Sync {
    /// Produce an answer for a non-blank transcript, or `None` on a blank
    /// transcript or any upstream failure (transport, bad status, empty
    /// candidate, unparseable body, both fields empty).
    async fn micro(&self, transcript: &str, ocr: &OcrSnapshot) -> Option<Answer>;
}

/// Build the configured hint service: LLM-backed when `LLM_API_KEY` is set,
/// the deterministic fallback otherwise.
#[must_use]
pub fn build_hint_service(config: &AppConfig) -> Arc<dyn HintService> {
    match &config.llm.api_key {
        Some(key) if !key.is_empty() => Arc::new(LlmHintService::new(config.llm.clone())),
        _ => Arc::new(FallbackHintService::new()),
    }
}
