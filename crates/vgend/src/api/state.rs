//! Application state for API handlers

use std::sync::Arc;
use std::time::Duration;

use vgen_core::{Orchestrator, RunRegistry};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,

    /// Daemon version
    pub version: String,

    /// Daemon start time
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            version: vgen_core::VERSION.to_string(),
            started_at: chrono::Utc::now(),
        }
    }

    pub fn registry(&self) -> &Arc<RunRegistry> {
        self.orchestrator.registry()
    }

    /// Idle poll interval of progress streams.
    pub fn stream_poll_interval(&self) -> Duration {
        self.orchestrator.config().stream_poll_interval()
    }

    /// Get uptime as a human-readable string
    pub fn uptime(&self) -> String {
        let secs = (chrono::Utc::now() - self.started_at).num_seconds();

        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else if secs < 86400 {
            format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
        } else {
            format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
        }
    }
}
