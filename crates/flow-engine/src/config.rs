//! Run and simulation configuration
//!
//! Both structs deserialize from camelCase JSON and fall back to the
//! defaults below for any missing field.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default values shared by the config types
pub mod defaults {
    /// Advisory per-node timeout in milliseconds
    pub const NODE_TIMEOUT_MS: u64 = 30_000;
    /// Artificial latency of a simulated model call
    pub const SIMULATED_LATENCY_MS: u64 = 1_000;
    /// Base URL for live OpenAI calls
    pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
    /// How long the simulator holds each node highlighted
    pub const STEP_DELAY_MS: u64 = 1_500;
    /// How long the simulator highlights a connecting edge
    pub const EDGE_DELAY_MS: u64 = 400;
    /// Pause between simulator steps
    pub const SETTLE_DELAY_MS: u64 = 200;
    /// How long the final highlights stay up after a simulation completes
    pub const CLEAR_DELAY_MS: u64 = 1_000;
}

/// Environment variables consulted for provider credentials
const CREDENTIAL_ENV_VARS: [(&str, &str); 3] = [
    ("openai", "OPENAI_API_KEY"),
    ("anthropic", "ANTHROPIC_API_KEY"),
    ("azure", "AZURE_OPENAI_API_KEY"),
];

/// Whether external calls are made for real or fabricated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Model calls return deterministic placeholder output
    #[default]
    Simulation,
    /// Model calls hit the provider API
    Live,
}

/// Configuration for a single graph run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunConfig {
    /// Simulation or live provider calls
    pub mode: ExecutionMode,
    /// Advisory per-node timeout, applied as the HTTP client timeout
    pub node_timeout_ms: u64,
    /// Provider name -> API key
    pub api_keys: HashMap<String, String>,
    /// Delay before a simulated model call returns
    pub simulated_latency_ms: u64,
    /// Base URL used for live OpenAI requests
    pub openai_base_url: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            node_timeout_ms: defaults::NODE_TIMEOUT_MS,
            api_keys: HashMap::new(),
            simulated_latency_ms: defaults::SIMULATED_LATENCY_MS,
            openai_base_url: defaults::OPENAI_BASE_URL.to_string(),
        }
    }
}

impl RunConfig {
    /// Parse a config from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a config from a JSON file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_json(&content)
    }

    /// Set the execution mode
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the simulated model latency
    pub fn with_simulated_latency(mut self, latency: Duration) -> Self {
        self.simulated_latency_ms = latency.as_millis() as u64;
        self
    }

    /// Add a provider credential
    pub fn with_api_key(mut self, provider: impl Into<String>, key: impl Into<String>) -> Self {
        self.api_keys.insert(provider.into(), key.into());
        self
    }

    /// Fill missing provider credentials from the environment
    pub fn with_env_credentials(mut self) -> Self {
        for (provider, var) in CREDENTIAL_ENV_VARS {
            if self.api_keys.contains_key(provider) {
                continue;
            }
            if let Ok(key) = std::env::var(var) {
                if !key.is_empty() {
                    log::debug!("Using {} credential from {}", provider, var);
                    self.api_keys.insert(provider.to_string(), key);
                }
            }
        }
        self
    }

    /// Credential for a provider, if configured
    pub fn api_key(&self, provider: &str) -> Option<&str> {
        self.api_keys
            .get(provider)
            .map(|k| k.as_str())
            .filter(|k| !k.is_empty())
    }

    pub fn node_timeout(&self) -> Duration {
        Duration::from_millis(self.node_timeout_ms)
    }

    pub fn simulated_latency(&self) -> Duration {
        Duration::from_millis(self.simulated_latency_ms)
    }
}

/// Timing for the highlight simulator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulationConfig {
    /// How long each node stays in the executing state
    pub step_delay_ms: u64,
    /// How long a connecting edge stays highlighted
    pub edge_delay_ms: u64,
    /// Pause after each step before the next begins
    pub settle_delay_ms: u64,
    /// Hold after the last step before every highlight is cleared
    pub clear_delay_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: defaults::STEP_DELAY_MS,
            edge_delay_ms: defaults::EDGE_DELAY_MS,
            settle_delay_ms: defaults::SETTLE_DELAY_MS,
            clear_delay_ms: defaults::CLEAR_DELAY_MS,
        }
    }
}

impl SimulationConfig {
    /// Config with every delay set to the same value
    pub fn uniform(delay: Duration) -> Self {
        let ms = delay.as_millis() as u64;
        Self {
            step_delay_ms: ms,
            edge_delay_ms: ms,
            settle_delay_ms: ms,
            clear_delay_ms: ms,
        }
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    pub fn edge_delay(&self) -> Duration {
        Duration::from_millis(self.edge_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn clear_delay(&self) -> Duration {
        Duration::from_millis(self.clear_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.mode, ExecutionMode::Simulation);
        assert_eq!(config.node_timeout(), Duration::from_secs(30));
        assert_eq!(config.simulated_latency(), Duration::from_secs(1));
        assert!(config.api_key("openai").is_none());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = RunConfig::from_json(r#"{"mode": "live", "apiKeys": {"openai": "sk-test"}}"#)
            .unwrap();
        assert_eq!(config.mode, ExecutionMode::Live);
        assert_eq!(config.api_key("openai"), Some("sk-test"));
        assert_eq!(config.node_timeout_ms, defaults::NODE_TIMEOUT_MS);
        assert_eq!(config.openai_base_url, defaults::OPENAI_BASE_URL);
    }

    #[test]
    fn test_empty_key_is_missing() {
        let config = RunConfig::default().with_api_key("anthropic", "");
        assert!(config.api_key("anthropic").is_none());
    }

    #[test]
    fn test_explicit_key_wins_over_env() {
        let config = RunConfig::default()
            .with_api_key("openai", "from-config")
            .with_env_credentials();
        assert_eq!(config.api_key("openai"), Some("from-config"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"nodeTimeoutMs": 500, "simulatedLatencyMs": 0}}"#).unwrap();

        let config = tokio_test::block_on(RunConfig::load(file.path())).unwrap();
        assert_eq!(config.node_timeout(), Duration::from_millis(500));
        assert_eq!(config.simulated_latency(), Duration::ZERO);
    }

    #[test]
    fn test_simulation_config() {
        let config: SimulationConfig = serde_json::from_str(r#"{"stepDelayMs": 10}"#).unwrap();
        assert_eq!(config.step_delay(), Duration::from_millis(10));
        assert_eq!(config.edge_delay_ms, defaults::EDGE_DELAY_MS);
        assert_eq!(config.clear_delay(), Duration::from_secs(1));

        let uniform = SimulationConfig::uniform(Duration::from_millis(5));
        assert_eq!(uniform.settle_delay(), Duration::from_millis(5));
    }
}
