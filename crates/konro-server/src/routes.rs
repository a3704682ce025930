//! Request handlers.

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use konro::error::GenerationError;
use konro::TelemetrySnapshot;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::ApiError;
use crate::AppState;

/// Body of `POST /generate`.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    /// The endpoint only streams; this field exists so non-streaming
    /// requests fail loudly instead of silently streaming anyway.
    #[serde(default = "default_stream")]
    pub stream: bool,
    #[serde(default)]
    pub format: StreamFormat,
}

fn default_stream() -> bool {
    true
}

/// Wire format of the streamed response body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamFormat {
    /// One JSON object per line: `{"text": ...}` for fragments and
    /// `{"error": ...}` as a final line on failure.
    #[default]
    JsonLines,
    /// Bare fragments with no framing; failures append an error marker
    /// line since the status code is already committed.
    Raw,
}

impl StreamFormat {
    fn content_type(self) -> &'static str {
        match self {
            StreamFormat::JsonLines => "application/x-ndjson",
            StreamFormat::Raw => "text/plain; charset=utf-8",
        }
    }
}

fn render_fragment(fragment: Result<String, GenerationError>, format: StreamFormat) -> Bytes {
    match (format, fragment) {
        (StreamFormat::JsonLines, Ok(text)) => {
            let mut line = json!({ "text": text }).to_string();
            line.push('\n');
            Bytes::from(line)
        }
        (StreamFormat::JsonLines, Err(error)) => {
            let mut line = json!({ "error": error.to_string() }).to_string();
            line.push('\n');
            Bytes::from(line)
        }
        (StreamFormat::Raw, Ok(text)) => Bytes::from(text),
        (StreamFormat::Raw, Err(error)) => Bytes::from(format!("\n[error: {error}]\n")),
    }
}

/// Streaming generation endpoint.
pub async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Response, ApiError> {
    if !request.stream {
        return Err(ApiError::StreamingRequired);
    }

    debug!(prompt_chars = request.prompt.chars().count(), "admitting prompt");
    let stream = state.generator.submit(request.prompt).await?;

    let format = request.format;
    let body = Body::from_stream(
        stream.map(move |fragment| Ok::<_, Infallible>(render_fragment(fragment, format))),
    );

    Ok(([(header::CONTENT_TYPE, format.content_type())], body).into_response())
}

/// Throughput counters since startup.
pub async fn stats(State(state): State<AppState>) -> Json<TelemetrySnapshot> {
    Json(state.telemetry.snapshot())
}

/// Liveness probe.
pub async fn health() -> &'static str {
    "ok"
}
