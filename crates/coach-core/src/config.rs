//! Environment-derived configuration.

use std::time::Duration;

/// Which ASR provider the factory should construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AsrProviderKind {
    #[default]
    Disabled,
    Stub,
    Streaming,
}

impl AsrProviderKind {
    /// Parse `ASR_PROVIDER`: `""|disabled|none|stub|streaming`, default disabled.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "stub" => Self::Stub,
            "streaming" => Self::Streaming,
            _ => Self::Disabled,
        }
    }
}

/// Credentials and endpoint for the streaming ASR upstream.
#[derive(Debug, Clone, Default)]
pub struct AsrRemoteConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

/// Credentials and endpoint for the hint LLM upstream.
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

/// Process-level configuration, read once at bootstrap.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub asr_provider: AsrProviderKind,
    pub llm: LlmConfig,
    pub asr_remote: AsrRemoteConfig,
    /// Bounded PCM staging capacity in frames (default 128).
    pub asr_pcm_buffer: usize,
}

impl AppConfig {
    /// Read configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            asr_provider: AsrProviderKind::parse(&env_or_empty("ASR_PROVIDER")),
            llm: LlmConfig {
                api_key: env_opt("LLM_API_KEY"),
                model: env_opt("LLM_MODEL"),
                base_url: env_opt("LLM_BASE_URL"),
            },
            asr_remote: AsrRemoteConfig {
                api_key: env_opt("ASR_API_KEY"),
                model: env_opt("ASR_MODEL"),
                base_url: env_opt("ASR_BASE_URL"),
            },
            asr_pcm_buffer: std::env::var("ASR_PCM_BUFFER")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(128),
        }
    }
}

fn env_or_empty(key: &str) -> String {
    std::env::var(key).unwrap_or_default()
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Minimum interval between admitted hints for a single session: 1500 ms.
pub const HINT_GATE_INTERVAL: Duration = Duration::from_millis(1500);

/// Read idle deadline per frame: 35 s.
pub const READ_IDLE_TIMEOUT: Duration = Duration::from_secs(35);

/// Write deadline per frame: 2 s.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Minimum spacing between successive backpressure warnings: 2 s.
pub const BACKPRESSURE_WARNING_INTERVAL: Duration = Duration::from_secs(2);

/// Inter-token pacing for hint/follow-up streaming: ~50 ms.
pub const TOKEN_STREAM_PACE: Duration = Duration::from_millis(50);

/// LLM request timeout: 8 s.
pub const LLM_REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

/// ASR streaming request timeout: 12 s.
pub const ASR_STREAM_TIMEOUT: Duration = Duration::from_secs(12);

/// Soft cap on buffered audio between flushes: ~60 s at 16 kHz 16-bit mono
/// = 1.92 MiB.
pub const ASR_BUFFER_SOFT_CAP_BYTES: usize = 60 * 16_000 * 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_provider_kinds() {
        assert_eq!(AsrProviderKind::parse(""), AsrProviderKind::Disabled);
        assert_eq!(AsrProviderKind::parse("none"), AsrProviderKind::Disabled);
        assert_eq!(AsrProviderKind::parse("disabled"), AsrProviderKind::Disabled);
        assert_eq!(AsrProviderKind::parse("STUB"), AsrProviderKind::Stub);
        assert_eq!(AsrProviderKind::parse("streaming"), AsrProviderKind::Streaming);
        assert_eq!(AsrProviderKind::parse("bogus"), AsrProviderKind::Disabled);
    }
}
