//! Pipeline configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Knobs of the generation pipeline. Every field has a default, so a TOML
/// file only needs to name what it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Repair iterations before a run is declared exhausted.
    pub max_iterations: u32,

    /// Subtasks generated concurrently. 1 means strictly sequential.
    pub subtask_concurrency: usize,

    /// Ask a human to review the planning artifact.
    pub review_planning: bool,

    /// Ask a human to review the generated testbench.
    pub review_testbench: bool,

    /// Directory holding one subdirectory per run.
    pub workspace: PathBuf,

    /// Idle poll interval of progress streams.
    pub stream_poll_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 4,
            subtask_concurrency: 1,
            review_planning: false,
            review_testbench: false,
            workspace: PathBuf::from(".vgen/runs"),
            stream_poll_interval_ms: 1000,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::Invalid {
                field: "max_iterations",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.subtask_concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "subtask_concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.stream_poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "stream_poll_interval_ms",
                reason: "must be positive".to_string(),
            });
        }
        if self.workspace.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "workspace",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn stream_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stream_poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_iterations, 4);
        assert_eq!(config.subtask_concurrency, 1);
        assert!(!config.review_planning);
        assert!(!config.review_testbench);
        assert_eq!(config.stream_poll_interval(), Duration::from_secs(1));
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml_str(
            "subtask_concurrency = 3\nreview_testbench = true\nworkspace = \"/tmp/vgen\"\n",
        )
        .unwrap();
        assert_eq!(config.subtask_concurrency, 3);
        assert!(config.review_testbench);
        assert_eq!(config.max_iterations, 4);
        assert_eq!(config.workspace, PathBuf::from("/tmp/vgen"));
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let err = PipelineConfig::from_toml_str("max_iterations = 0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "max_iterations",
                ..
            }
        ));
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        assert!(matches!(
            PipelineConfig::from_toml_str("max_iterations = \"four\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PipelineConfig::load(&dir.path().join("vgen.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
