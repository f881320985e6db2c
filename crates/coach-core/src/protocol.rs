//! Wire protocol types shared between the client and the session.
//!
//! Upstream messages are a single permissive shape dispatched on `type`:
//! `{type, text?, final?, ocr?, first?, last?}`. Downstream messages are a
//! tagged enum — one shape per `type` — since the server only ever emits
//! one of a closed set.

use serde::{Deserialize, Serialize};

/// An inbound text frame from the client, parsed before dispatch.
///
/// All fields beyond `msg_type` are optional because the shape is shared
/// across every upstream message kind; `Session::handle_text` picks the
/// fields relevant to the lower-cased `msg_type`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, rename = "final")]
    pub is_final: Option<bool>,
    #[serde(default)]
    pub ocr: Option<Vec<String>>,
    #[serde(default)]
    pub first: Option<bool>,
    #[serde(default)]
    pub last: Option<bool>,
}

/// An outbound text frame to the client.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum DownMessage {
    #[serde(rename = "state")]
    State { listening: bool },

    #[serde(rename = "partial")]
    Partial { text: String },

    #[serde(rename = "final")]
    Final { text: String },

    #[serde(rename = "hint_partial")]
    HintPartial { text: String },

    #[serde(rename = "followup_partial")]
    FollowupPartial { text: String },

    #[serde(rename = "hint")]
    Hint {
        text: String,
        #[serde(rename = "ttlMs")]
        ttl_ms: u32,
    },

    #[serde(rename = "followup")]
    Followup {
        text: String,
        #[serde(rename = "ttlMs")]
        ttl_ms: u32,
    },

    #[serde(rename = "warning")]
    Warning { code: String, msg: String },

    /// Reserved — not currently emitted for per-message errors.
    #[serde(rename = "error")]
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        msg: String,
    },
}

/// TTL attached to `hint` / `followup` terminal messages.
pub const HINT_TTL_MS: u32 = 4500;

/// Code used for the audio backpressure warning.
pub const AUDIO_BACKPRESSURE_CODE: &str = "AUDIO_BACKPRESSURE";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn up_message_parses_transcript() {
        let raw = r#"{"type":"transcript","text":"hello","final":true}"#;
        let msg: UpMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.msg_type, "transcript");
        assert_eq!(msg.text.as_deref(), Some("hello"));
        assert_eq!(msg.is_final, Some(true));
    }

    #[test]
    fn up_message_parses_frame_meta() {
        let raw = r#"{"type":"frame_meta","ocr":["Q4","Revenue"],"first":true}"#;
        let msg: UpMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.msg_type, "frame_meta");
        assert_eq!(msg.ocr, Some(vec!["Q4".to_string(), "Revenue".to_string()]));
        assert_eq!(msg.first, Some(true));
        assert_eq!(msg.last, None);
    }

    #[test]
    fn down_message_state_shape() {
        let json = serde_json::to_string(&DownMessage::State { listening: true }).unwrap();
        assert_eq!(json, r#"{"type":"state","listening":true}"#);
    }

    #[test]
    fn down_message_hint_shape() {
        let json = serde_json::to_string(&DownMessage::Hint {
            text: "Ask about budget".to_string(),
            ttl_ms: HINT_TTL_MS,
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"hint","text":"Ask about budget","ttlMs":4500}"#);
    }

    #[test]
    fn down_message_warning_shape() {
        let json = serde_json::to_string(&DownMessage::Warning {
            code: AUDIO_BACKPRESSURE_CODE.to_string(),
            msg: "Audio quality degraded (dropping frames).".to_string(),
        })
        .unwrap();
        assert!(json.contains(r#""type":"warning""#));
        assert!(json.contains("AUDIO_BACKPRESSURE"));
    }
}
