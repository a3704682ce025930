//! HTTP-facing error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use konro::error::AdmissionError;
use serde_json::json;

/// Errors surfaced synchronously, before a stream starts.
///
/// Failures after the response stream has begun travel inside the stream
/// itself as a failure marker; they cannot change the status line.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The endpoint is always-streaming; `stream: false` is not served.
    #[error("non-streaming responses are not supported")]
    StreamingRequired,

    /// The request was rejected before batching.
    #[error(transparent)]
    Admission(#[from] AdmissionError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::StreamingRequired => StatusCode::BAD_REQUEST,
            ApiError::Admission(AdmissionError::EmptyPrompt) => StatusCode::BAD_REQUEST,
            ApiError::Admission(AdmissionError::Shutdown) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
