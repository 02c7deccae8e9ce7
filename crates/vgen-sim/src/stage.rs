//! Simulator stage definitions.

use std::path::Path;

use serde::{Deserialize, Serialize};
use vgen_core::ReportStage;

use crate::config::SimConfig;

/// The two steps of an Icarus Verilog run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SimStage {
    /// iverilog -g2012 -o <out> <design> <testbench>
    Compile,

    /// vvp <out>
    Simulate,
}

impl SimStage {
    pub fn name(&self) -> &'static str {
        match self {
            SimStage::Compile => "iverilog",
            SimStage::Simulate => "vvp",
        }
    }

    /// Where a failure of this step lands in the verification report.
    pub fn report_stage(&self) -> ReportStage {
        match self {
            SimStage::Compile => ReportStage::Compilation,
            SimStage::Simulate => ReportStage::Simulation,
        }
    }
}

/// One process invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    pub name: String,

    /// Command to execute (first element is the executable).
    pub command: Vec<String>,

    /// Zero disables the timeout.
    pub timeout_secs: u64,
}

impl StageConfig {
    pub fn custom(name: impl Into<String>, command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            name: name.into(),
            command,
            timeout_secs,
        }
    }

    pub fn compile(config: &SimConfig, design: &Path, testbench: &Path, output: &Path) -> Self {
        Self::custom(
            SimStage::Compile.name(),
            vec![
                config.iverilog_bin.clone(),
                config.language_flag.clone(),
                "-o".to_string(),
                output.display().to_string(),
                design.display().to_string(),
                testbench.display().to_string(),
            ],
            config.compile_timeout_secs,
        )
    }

    pub fn simulate(config: &SimConfig, compiled: &Path) -> Self {
        Self::custom(
            SimStage::Simulate.name(),
            vec![config.vvp_bin.clone(), compiled.display().to_string()],
            config.simulate_timeout_secs,
        )
    }
}
