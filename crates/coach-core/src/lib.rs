//! Per-session state machine and concurrency fabric for the real-time
//! coaching backend: the ASR provider abstraction, the OCR context store,
//! the hint rate limiter and hint service, and the `Session` that glues
//! them to a live client connection.

pub mod asr;
pub mod config;
pub mod error;
pub mod hint;
pub mod metrics;
pub mod ocr;
pub mod protocol;
pub mod rate_gate;
pub mod session;

pub use error::CoreError;
pub use metrics::Metrics;
pub use session::{OutboundSink, Session};
