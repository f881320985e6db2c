//! Core error types.

/// Errors that can occur while constructing or running the coaching core.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// An ASR provider failed to construct (missing credentials, invalid
    /// config, etc). The caller falls back to the `Disabled` variant rather
    /// than propagating.
    #[error("failed to construct ASR provider: {0}")]
    AsrConstruction(String),

    /// A hint service failed to construct.
    #[error("failed to construct hint service: {0}")]
    HintConstruction(String),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}
