//! Simulator settings.

use serde::{Deserialize, Serialize};

/// How to invoke Icarus Verilog. Read from the `[sim]` table of the vgen
/// config file; every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub iverilog_bin: String,
    pub vvp_bin: String,

    /// Language generation flag passed to iverilog.
    pub language_flag: String,

    pub compile_timeout_secs: u64,
    pub simulate_timeout_secs: u64,

    /// Case-sensitive markers that flag a failing check in simulation output.
    pub failure_markers: Vec<String>,

    /// Have the text generator write the report from the simulator outcome
    /// instead of deriving it directly.
    pub llm_reports: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            iverilog_bin: "iverilog".to_string(),
            vvp_bin: "vvp".to_string(),
            language_flag: "-g2012".to_string(),
            compile_timeout_secs: 60,
            simulate_timeout_secs: 120,
            failure_markers: vec![
                "FAIL".to_string(),
                "ERROR".to_string(),
                "Error".to_string(),
                "Mismatch".to_string(),
                "MISMATCH".to_string(),
            ],
            llm_reports: false,
        }
    }
}

impl SimConfig {
    /// Whether a simulation output line reports a failed check.
    pub fn is_failure_line(&self, line: &str) -> bool {
        self.failure_markers.iter().any(|m| line.contains(m.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_markers() {
        let config = SimConfig::default();
        assert!(config.is_failure_line("FAIL: A=100 B=7 result=13"));
        assert!(config.is_failure_line("Mismatch at t=40"));
        assert!(!config.is_failure_line("PASS: all 12 vectors"));
    }
}
