//! HTTP frontend for the konro batching pipeline.
//!
//! A thin axum layer: one streaming generation endpoint plus liveness
//! and telemetry probes. All batching, bridging, and demultiplexing
//! lives in the `konro` crate behind the [`TextGenerator`] seam.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use konro::{Telemetry, TextGenerator};

pub mod config;
pub mod error;
pub mod routes;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<dyn TextGenerator>,
    pub telemetry: Arc<Telemetry>,
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/generate", post(routes::generate))
        .route("/stats", get(routes::stats))
        .route("/health", get(routes::health))
        .with_state(state)
}
