//! HTTP-layer error type and its JSON response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Errors a handler can return before the WebSocket upgrade succeeds.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            HttpError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            HttpError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            HttpError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = ErrorBody {
            error: message,
            status: status.as_u16(),
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<coach_core::CoreError> for HttpError {
    fn from(err: coach_core::CoreError) -> Self {
        match err {
            coach_core::CoreError::AsrConstruction(msg) => HttpError::ServiceUnavailable(msg),
            coach_core::CoreError::HintConstruction(msg) => HttpError::ServiceUnavailable(msg),
            coach_core::CoreError::Configuration(msg) => HttpError::Internal(msg),
        }
    }
}
