//! Configuration system (layered: code defaults < TOML file < env).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TandemError;
use crate::types::GenerationConfig;

/// Default cap on generate cycles per prompt.
pub const DEFAULT_MAX_API_REQUESTS: usize = 10;

const TEMPERATURE_RANGE: std::ops::RangeInclusive<f64> = 0.0..=2.0;

const MODEL_ENV: &str = "TANDEM_MODEL";
const TEMPERATURE_ENV: &str = "TANDEM_TEMPERATURE";
const MAX_TOKENS_ENV: &str = "TANDEM_MAX_TOKENS";
const TIMEOUT_MS_ENV: &str = "TANDEM_TIMEOUT_MS";
const MAX_API_REQUESTS_ENV: &str = "TANDEM_MAX_API_REQUESTS";

/// Agent-layer settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentSettings {
    /// Name used when the agent is exposed to a parent as a tool.
    pub name: String,
    pub description: String,
    /// Maximum generate cycles per prompt.
    pub max_api_requests: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            name: "agent".to_string(),
            description: String::new(),
            max_api_requests: DEFAULT_MAX_API_REQUESTS,
        }
    }
}

impl AgentSettings {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_max_api_requests(mut self, max_api_requests: usize) -> Self {
        self.max_api_requests = max_api_requests;
        self
    }
}

/// Layered configuration for sessions and agents.
///
/// Resolution order (later wins):
/// 1. Code defaults
/// 2. A TOML file (`[generation]` and `[agent]` tables)
/// 3. `TANDEM_*` environment variables (a `.env` file is honored)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TandemConfig {
    pub generation: GenerationConfig,
    pub agent: AgentSettings,
}

impl TandemConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self, TandemError> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| TandemError::Configuration(format!("invalid TOML config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, TandemError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TandemError::Configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Defaults overlaid with environment variables.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::default().with_env_overrides()
    }

    /// Overlay `TANDEM_*` environment variables onto this config.
    ///
    /// Unparseable, zero or out-of-range numeric values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(model) = env_string(MODEL_ENV) {
            self.generation.model = Some(model);
        }
        if let Some(temperature) = env_string(TEMPERATURE_ENV)
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|t| TEMPERATURE_RANGE.contains(t))
        {
            self.generation.temperature = Some(temperature);
        }
        if let Some(max_tokens) = env_positive(MAX_TOKENS_ENV) {
            self.generation.max_tokens = u32::try_from(max_tokens).ok();
        }
        if let Some(timeout_ms) = env_positive(TIMEOUT_MS_ENV) {
            self.generation.timeout_ms = Some(timeout_ms as u64);
        }
        if let Some(max_api_requests) = env_positive(MAX_API_REQUESTS_ENV) {
            self.agent.max_api_requests = max_api_requests;
        }
        self
    }

    fn validate(&self) -> Result<(), TandemError> {
        if self.agent.max_api_requests == 0 {
            return Err(TandemError::Configuration(
                "agent.max_api_requests must be at least 1".to_string(),
            ));
        }
        if let Some(t) = self.generation.temperature {
            if !TEMPERATURE_RANGE.contains(&t) {
                return Err(TandemError::Configuration(format!(
                    "generation.temperature {t} outside 0.0..=2.0"
                )));
            }
        }
        Ok(())
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_positive(key: &str) -> Option<usize> {
    env_string(key).and_then(|v| parse_positive_usize(&v))
}

pub(crate) fn parse_positive_usize(value: &str) -> Option<usize> {
    let parsed = value.trim().parse::<usize>().ok()?;
    if parsed == 0 {
        None
    } else {
        Some(parsed)
    }
}
