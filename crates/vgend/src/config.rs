//! Configuration for vgend

use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use vgen_core::PipelineConfig;
use vgen_llm::LlmConfig;
use vgen_sim::SimConfig;

use crate::error::{DaemonError, DaemonResult};

/// Main daemon configuration. Every section is optional in the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
    pub llm: LlmConfig,
    pub sim: SimConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
        }
    }
}

impl DaemonConfig {
    /// Load from `path`, or defaults when no file is given.
    pub fn load(path: Option<&Path>) -> DaemonResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|e| {
            DaemonError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> DaemonResult<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| DaemonError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DaemonResult<()> {
        self.pipeline
            .validate()
            .map_err(|e| DaemonError::Config(e.to_string()))
    }
}
