//! Server configuration.
//!
//! Settings are layered: built-in defaults, then an optional config file,
//! then environment variables prefixed with `KONRO__` (for example
//! `KONRO__SERVER__PORT=8080` or `KONRO__BATCH__MAX_BATCH_SIZE=4`).

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use konro::config::{BatchPolicy, BridgeConfig, GenerationConfig, SamplingParams};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: IpAddr,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 30800,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub max_batch_size: usize,
    pub batch_wait_timeout_ms: u64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_batch_size: 10,
            batch_wait_timeout_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SamplingSettings {
    pub max_new_tokens: u32,
    pub temperature: f32,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            max_new_tokens: 128,
            temperature: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    pub capacity: usize,
    pub stall_timeout_secs: u64,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            capacity: 32,
            stall_timeout_secs: 60,
        }
    }
}

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSettings,
    pub batch: BatchSettings,
    pub sampling: SamplingSettings,
    pub bridge: BridgeSettings,
}

impl ServerConfig {
    /// Loads configuration from defaults, an optional file, and the
    /// `KONRO__` environment.
    pub fn load(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }
        builder
            .add_source(
                config::Environment::with_prefix("KONRO")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }

    /// Address the HTTP listener binds to.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }

    /// Pipeline configuration derived from these settings.
    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            policy: BatchPolicy {
                max_batch_size: self.batch.max_batch_size,
                batch_wait_timeout: Duration::from_millis(self.batch.batch_wait_timeout_ms),
            },
            sampling: SamplingParams {
                max_new_tokens: self.sampling.max_new_tokens,
                temperature: self.sampling.temperature,
            },
            bridge: BridgeConfig {
                capacity: self.bridge.capacity,
                stall_timeout: Duration::from_secs(self.bridge.stall_timeout_secs),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_service_contract() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr().port(), 30800);
        assert!(config.listen_addr().ip().is_loopback());

        let generation = config.generation_config();
        assert_eq!(generation.policy.max_batch_size, 10);
        assert_eq!(generation.policy.batch_wait_timeout, Duration::from_secs(1));
        assert_eq!(generation.sampling.max_new_tokens, 128);
    }

    #[test]
    fn load_without_a_file_yields_defaults() {
        let config = ServerConfig::load(None).unwrap();
        assert_eq!(config.batch.max_batch_size, 10);
        assert_eq!(config.bridge.capacity, 32);
    }
}
