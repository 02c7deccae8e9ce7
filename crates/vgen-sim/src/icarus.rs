//! Icarus Verilog verifier.
//!
//! Compiles the design together with its testbench, runs the result under
//! `vvp`, and turns the outcome into the fenced JSON report the repair loop
//! consumes. Without a reviewer the report is derived from the simulator
//! output alone; with one, the reviewer writes the report from the outcome.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use vgen_core::{
    prompts, CollaboratorError, FileReport, ReportFiles, ReportStage, ReportStatus, TextGenerator,
    VerificationReport, Verifier,
};

use crate::config::SimConfig;
use crate::error::Result;
use crate::runner::ProcessRunner;
use crate::stage::{SimStage, StageConfig};

/// Name of the compiled simulation image inside the scratch directory.
pub const COMPILED_IMAGE: &str = "testbench_out";

/// What the simulator said about one design/testbench pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimOutcome {
    pub stage: ReportStage,
    pub passed: bool,
    /// Raw simulator output.
    pub log: String,
    /// Diagnostics attributed to the design.
    pub design_issues: Vec<String>,
    /// Diagnostics attributed to the testbench.
    pub testbench_issues: Vec<String>,
}

impl SimOutcome {
    fn failed(stage: ReportStage, log: String) -> Self {
        Self {
            stage,
            passed: false,
            log,
            design_issues: Vec::new(),
            testbench_issues: Vec::new(),
        }
    }

    /// Plain-text summary handed to a reviewer.
    pub fn summary(&self) -> String {
        match (self.passed, self.stage) {
            (true, _) => format!("Simulation passed.\n{}", self.log),
            (false, ReportStage::Compilation) => format!("Error during compilation: {}", self.log),
            (false, ReportStage::FileReading) => format!("Error reading files: {}", self.log),
            (false, _) => format!("Error during simulation: {}", self.log),
        }
    }

    /// Build the structured report. Issues become suggestions; a failure with
    /// no attributable line leaves both files clean for the core to attribute.
    pub fn into_report(self, design: String, testbench: String) -> VerificationReport {
        VerificationReport {
            status: if self.passed {
                ReportStatus::Success
            } else {
                ReportStatus::Error
            },
            stage: self.stage,
            files: ReportFiles {
                design: FileReport {
                    content: design,
                    suggestions: self.design_issues.join("\n"),
                },
                testbench: FileReport {
                    content: testbench,
                    suggestions: self.testbench_issues.join("\n"),
                },
            },
            log: self.log,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Render a report the way collaborators do: a fenced `json` block.
pub fn render_report(report: &VerificationReport) -> serde_json::Result<String> {
    Ok(format!(
        "```json\n{}\n```\n",
        serde_json::to_string_pretty(report)?
    ))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub struct IcarusVerifier {
    config: SimConfig,
    reviewer: Option<Arc<dyn TextGenerator>>,
}

impl IcarusVerifier {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            reviewer: None,
        }
    }

    /// Have `reviewer` write the report from the simulator outcome.
    pub fn with_reviewer(mut self, reviewer: Arc<dyn TextGenerator>) -> Self {
        self.reviewer = Some(reviewer);
        self
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Compile and run `design` with `testbench`.
    ///
    /// # Errors
    ///
    /// Launch failures and timeouts. Compile errors and failing checks are
    /// outcomes, not errors.
    pub async fn simulate(&self, design: &Path, testbench: &Path) -> Result<SimOutcome> {
        for (path, is_design) in [(design, true), (testbench, false)] {
            if let Err(err) = tokio::fs::metadata(path).await {
                let message = format!("cannot read {}: {err}", path.display());
                let mut outcome = SimOutcome::failed(ReportStage::FileReading, message.clone());
                if is_design {
                    outcome.design_issues.push(message);
                } else {
                    outcome.testbench_issues.push(message);
                }
                return Ok(outcome);
            }
        }

        let scratch = tempfile::tempdir()?;
        let image = scratch.path().join(COMPILED_IMAGE);
        let design_name = file_name(design);
        let testbench_name = file_name(testbench);

        let compile = ProcessRunner::execute_stage(&StageConfig::compile(
            &self.config,
            design,
            testbench,
            &image,
        ))
        .await?;
        if !compile.passed() {
            let log = compile.combined_output();
            let mut outcome = SimOutcome::failed(SimStage::Compile.report_stage(), log.clone());
            for line in log.lines() {
                if !testbench_name.is_empty() && line.contains(&testbench_name) {
                    outcome.testbench_issues.push(line.trim().to_string());
                } else if !design_name.is_empty() && line.contains(&design_name) {
                    outcome.design_issues.push(line.trim().to_string());
                }
            }
            tracing::info!(stage = "compilation", "design did not compile");
            return Ok(outcome);
        }

        let run = ProcessRunner::execute_stage(&StageConfig::simulate(&self.config, &image)).await?;
        let log = run.combined_output();
        let failures: Vec<&str> = log
            .lines()
            .filter(|line| self.config.is_failure_line(line))
            .collect();

        let mut outcome = SimOutcome {
            stage: SimStage::Simulate.report_stage(),
            passed: run.passed() && failures.is_empty(),
            log: log.clone(),
            design_issues: Vec::new(),
            testbench_issues: Vec::new(),
        };
        for line in failures {
            if !testbench_name.is_empty() && line.contains(&testbench_name) {
                outcome.testbench_issues.push(line.trim().to_string());
            } else {
                outcome.design_issues.push(line.trim().to_string());
            }
        }
        tracing::info!(stage = "simulation", passed = outcome.passed, "simulation finished");
        Ok(outcome)
    }
}

#[async_trait]
impl Verifier for IcarusVerifier {
    async fn verify(
        &self,
        design: &Path,
        testbench: &Path,
    ) -> std::result::Result<String, CollaboratorError> {
        let outcome = self.simulate(design, testbench).await?;
        let design_text = tokio::fs::read_to_string(design).await.unwrap_or_default();
        let testbench_text = tokio::fs::read_to_string(testbench)
            .await
            .unwrap_or_default();

        match &self.reviewer {
            Some(reviewer) => {
                let prompt =
                    prompts::verification_review(&design_text, &testbench_text, &outcome.summary());
                reviewer
                    .generate(&prompt)
                    .await?
                    .into_text()
                    .map_err(|e| CollaboratorError::Generation(e.to_string()))
            }
            None => render_report(&outcome.into_report(design_text, testbench_text))
                .map_err(|e| CollaboratorError::Verification(e.to_string())),
        }
    }
}
