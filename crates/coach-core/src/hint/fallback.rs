//! Deterministic fallback hint service: keyword-matched canned answers, used
//! for offline development when no LLM key is configured.

use async_trait::async_trait;

use super::{Answer, HintService};
use crate::ocr::OcrSnapshot;

const FALLBACK_CONFIDENCE: f32 = 0.45;

struct Topic {
    keyword: &'static str,
    answer: &'static str,
    follow_up: &'static str,
}

const TOPICS: &[Topic] = &[
    Topic {
        keyword: "budget",
        answer: "Highlight fiscal upside and ask who approves budget",
        follow_up: "Ask: 'Who signs off on the numbers?'",
    },
    Topic {
        keyword: "timeline",
        answer: "Confirm the deadline before committing to new scope",
        follow_up: "Ask: 'What's the hard deadline?'",
    },
    Topic {
        keyword: "risk",
        answer: "Name the biggest risk out loud before moving on",
        follow_up: "Ask: 'What would have to go wrong for this to fail?'",
    },
    Topic {
        keyword: "decision",
        answer: "Restate the decision and confirm everyone agrees",
        follow_up: "Ask: 'Are we all aligned on this decision?'",
    },
    Topic {
        keyword: "architecture",
        answer: "Check this design against the existing system boundaries",
        follow_up: "Ask: 'Does this fit our current architecture?'",
    },
];

/// Canned `answer`/`followUp` pairs, matched by scanning the transcript and
/// OCR tokens for a small set of topical keywords.
#[derive(Debug, Default)]
pub struct FallbackHintService;

impl FallbackHintService {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn matches(haystack: &str, keyword: &str) -> bool {
    haystack.to_lowercase().contains(keyword)
}

#[async_trait]
impl HintService for FallbackHintService {
    async fn micro(&self, transcript: &str, ocr: &OcrSnapshot) -> Option<Answer> {
        if transcript.trim().is_empty() {
            return None;
        }

        let ocr_text = ocr.unique().join(" ");
        let topic = TOPICS
            .iter()
            .find(|t| matches(transcript, t.keyword) || matches(&ocr_text, t.keyword))?;

        Some(Answer {
            answer: topic.answer.to_string(),
            follow_up: topic.follow_up.to_string(),
            confidence: FALLBACK_CONFIDENCE,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn matches_budget_keyword_from_scenario_s2() {
        let service = FallbackHintService::new();
        let answer = service
            .micro(
                "We can probably meet Friday to discuss the budget",
                &OcrSnapshot::default(),
            )
            .await
            .unwrap();
        assert_eq!(answer.answer, "Highlight fiscal upside and ask who approves budget");
        assert_eq!(answer.follow_up, "Ask: 'Who signs off on the numbers?'");
        assert!((0.4..=0.5).contains(&answer.confidence));
    }

    #[tokio::test]
    async fn blank_transcript_yields_nothing() {
        let service = FallbackHintService::new();
        assert!(service.micro("   ", &OcrSnapshot::default()).await.is_none());
    }

    #[tokio::test]
    async fn no_matching_keyword_yields_nothing() {
        let service = FallbackHintService::new();
        assert!(service
            .micro("let's get some coffee", &OcrSnapshot::default())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn ocr_tokens_alone_can_trigger_a_topic() {
        let service = FallbackHintService::new();
        let ocr = OcrSnapshot {
            recent: vec!["architecture".to_string()],
            ..Default::default()
        };
        let answer = service.micro("let's look at this", &ocr).await.unwrap();
        assert_eq!(answer.answer, "Check this design against the existing system boundaries");
    }
}
