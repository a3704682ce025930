//! # Konro
//!
//! A batching pipeline for streaming text generation: many concurrent
//! prompts are admitted into one time- and size-bounded batch, served by a
//! single blocking generation call, and demultiplexed back into one token
//! stream per caller.
//!
//! ## Overview
//!
//! Text generation engines amortize their fixed per-call cost best when
//! several prompts share one call. This crate provides the serving layer
//! around such an engine:
//!
//! - A **batch admission controller** that accumulates concurrently
//!   arriving requests, closing a batch when either a maximum size or a
//!   maximum wait time is reached.
//! - A **generation worker** that drives one blocking, step-by-step
//!   generation call per batch on a dedicated thread.
//! - A **token stream bridge**, the only structure shared between the
//!   worker thread and the async runtime: a bounded channel carrying one
//!   event per decoding step plus a terminal sentinel.
//! - A **response demultiplexer** that routes every step's per-request
//!   output back to the correct caller's stream, in arrival order.
//!
//! ## Collaborators
//!
//! The model itself is external. Implement [`model::Tokenizer`] and
//! [`model::GenerationEngine`] to plug in a real backend; the
//! [`mock`] module ships deterministic implementations for tests and
//! local serving.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use konro::{BatchGenerator, TextGenerator};
//! use konro::config::GenerationConfig;
//! use konro::mock::{MockEngine, MockTokenizer};
//!
//! # #[tokio::main(flavor = "multi_thread")]
//! # async fn main() {
//! let generator = BatchGenerator::new(
//!     Arc::new(MockTokenizer),
//!     Arc::new(MockEngine::new(4)),
//!     GenerationConfig::default(),
//! ).unwrap();
//!
//! let mut stream = generator.submit("hello".to_string()).await.unwrap();
//! while let Some(fragment) = stream.next().await {
//!     println!("{}", fragment.unwrap());
//! }
//! # }
//! ```
//!
//! ## Guarantees
//!
//! - Requests are never reordered: batch order is arrival order, and each
//!   decoding step's outputs are routed by position.
//! - The first decoding step echoes the input prompts and is never
//!   delivered to a caller.
//! - All members of a batch finish together: one generation call serves
//!   them all, and the demultiplexer closes every stream in the same tick,
//!   whether the call succeeded or failed.
//! - A caller that disconnects mid-stream does not shrink or abort its
//!   batch; the shared call runs to completion.

mod batch;
mod communication;
mod core;
mod telemetry;

pub mod config;
pub mod error;
pub mod generator;
pub mod mock;
pub mod model;

pub use communication::TokenStream;
pub use generator::{BatchGenerator, TextGenerator};
pub use telemetry::{Telemetry, TelemetrySnapshot};
