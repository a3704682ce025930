//! The public face of the pipeline: request admission.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::batch::Request;
use crate::communication::{Pill, TokenStream};
use crate::config::{BatchPolicy, GenerationConfig};
use crate::core::admission::{admission_loop, PipelineContext};
use crate::core::worker::BatchWorkerHandle;
use crate::error::{AdmissionError, ConfigError};
use crate::model::{GenerationEngine, Tokenizer};
use crate::telemetry::{Telemetry, TelemetrySnapshot};

/// Admission seam for anything that turns a prompt into a token stream.
///
/// Frontends depend on this trait rather than on [`BatchGenerator`]
/// directly, so they can be exercised against canned implementations.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Admits one prompt and immediately returns its token stream.
    ///
    /// Never blocks on batch formation or generation: the caller
    /// suspends only while awaiting fragments on the returned stream.
    async fn submit(&self, prompt: String) -> Result<TokenStream, AdmissionError>;
}

/// Batching text generator: admits prompts into dynamic batches, each
/// served by one blocking generation call.
///
/// Construction spawns a background admission task that owns batch
/// formation and generation scheduling; dropping the generator shuts the
/// task down. One instance maintains one logical queue with at most one
/// generation job in flight; run several independent instances to scale
/// out.
pub struct BatchGenerator {
    waiting: Arc<Mutex<Vec<Request>>>,
    policy: Arc<Mutex<BatchPolicy>>,
    telemetry: Arc<Telemetry>,
    handle: BatchWorkerHandle,
}

impl BatchGenerator {
    /// Builds the generator and spawns its admission task.
    ///
    /// Must be called from within a tokio runtime. Fails if `config`
    /// violates an invariant (for example a zero batch size).
    pub fn new(
        tokenizer: Arc<dyn Tokenizer>,
        engine: Arc<dyn GenerationEngine>,
        config: GenerationConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let waiting: Arc<Mutex<Vec<Request>>> = Arc::new(Mutex::new(Vec::new()));
        let policy = Arc::new(Mutex::new(config.policy));
        let telemetry = Arc::new(Telemetry::new());

        let pill = Pill::new();
        let handle = BatchWorkerHandle::new({
            let waiting = waiting.clone();
            let ctx = PipelineContext {
                tokenizer,
                engine,
                policy: policy.clone(),
                sampling: config.sampling,
                bridge: config.bridge,
                telemetry: telemetry.clone(),
            };

            move |running, notifier| {
                tokio::spawn(async move {
                    let _pill = pill;
                    admission_loop(ctx, running, notifier, waiting).await;
                })
            }
        });

        Ok(Self {
            waiting,
            policy,
            telemetry,
            handle,
        })
    }

    /// Replaces the batch-closing policy.
    ///
    /// Takes effect for the next batch formed; an already-open batch
    /// keeps the policy it was opened under.
    pub async fn set_policy(&self, policy: BatchPolicy) -> Result<(), ConfigError> {
        policy.validate()?;
        *self.policy.lock().await = policy;
        Ok(())
    }

    /// Current throughput counters.
    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.snapshot()
    }

    /// Shared handle to the underlying counters, for frontends that
    /// expose them.
    pub fn telemetry_handle(&self) -> Arc<Telemetry> {
        self.telemetry.clone()
    }

    /// Stops accepting requests and winds down the admission task.
    ///
    /// An in-flight batch runs to completion. Requests still waiting for
    /// a batch receive a [`crate::error::GenerationError::Cancelled`]
    /// marker and their streams close. Also invoked on drop.
    pub fn shutdown(&mut self) {
        self.handle.shutdown();
    }
}

#[async_trait]
impl TextGenerator for BatchGenerator {
    async fn submit(&self, prompt: String) -> Result<TokenStream, AdmissionError> {
        if prompt.trim().is_empty() {
            return Err(AdmissionError::EmptyPrompt);
        }
        if !self.handle.is_running() {
            return Err(AdmissionError::Shutdown);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut waiting = self.waiting.lock().await;
            waiting.push(Request::new(prompt, tx));
        }
        self.handle.notify();
        Ok(TokenStream::new(rx))
    }
}
