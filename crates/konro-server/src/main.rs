use std::path::PathBuf;
use std::sync::Arc;

use konro::mock::{MockEngine, MockTokenizer};
use konro::{BatchGenerator, TextGenerator};
use konro_server::config::ServerConfig;
use konro_server::{router, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config_file = std::env::args().nth(1).map(PathBuf::from);
    let config = ServerConfig::load(config_file.as_deref())?;
    let addr = config.listen_addr();
    let generation = config.generation_config();

    // Deterministic codepoint model; swap in real collaborators here to
    // serve an actual checkpoint.
    let engine = MockEngine::new(generation.sampling.max_new_tokens);
    let generator = BatchGenerator::new(Arc::new(MockTokenizer), Arc::new(engine), generation)?;

    let state = AppState {
        telemetry: generator.telemetry_handle(),
        generator: Arc::new(generator) as Arc<dyn TextGenerator>,
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "serving");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
