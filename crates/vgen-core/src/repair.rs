//! Bounded verify/repair loop.
//!
//! ```text
//! VERIFYING ──clean──────────────────────────▶ TERMINAL(success)
//!     │ unclean, iterations < max
//!     ▼
//! REPAIRING ──each unclean artifact → rev+1──▶ VERIFYING
//!     │ unclean, iterations == max
//!     ▼
//! TERMINAL(exhausted)
//! ```
//!
//! Any collaborator or extraction error leaves the loop immediately with
//! that error; the caller records it as a fatal outcome.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::assemble::clean_hdl;
use crate::collaborator::{TextGenerator, Verifier};
use crate::domain::{
    ArtifactKind, DesignArtifact, Result, Revisioned, RunEvent, RunOutcome, Stage,
    TestHarnessArtifact, VerificationReport,
};
use crate::metrics::METRICS;
use crate::obs;
use crate::pipeline::RunContext;
use crate::prompts;
use crate::report::{attribute_unassigned_error, extract_report};
use crate::store::{DESIGN_FILE, REPORT_JSON_FILE, REPORT_MARKDOWN_FILE, TESTBENCH_FILE};

/// Result of a loop that ended without a collaborator error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopOutcome {
    /// `Success` or `Exhausted`.
    pub outcome: RunOutcome,
    /// Repair iterations performed.
    pub iterations: u32,
    pub verifications: u32,
    pub design_repairs: u32,
    pub testbench_repairs: u32,
    /// Final (best-known) design.
    pub design: DesignArtifact,
    pub testbench: TestHarnessArtifact,
    pub last_report: VerificationReport,
}

impl LoopOutcome {
    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Success
    }
}

pub struct RepairLoop {
    generator: Arc<dyn TextGenerator>,
    verifier: Arc<dyn Verifier>,
    max_iterations: u32,
}

impl RepairLoop {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        verifier: Arc<dyn Verifier>,
        max_iterations: u32,
    ) -> Self {
        Self {
            generator,
            verifier,
            max_iterations,
        }
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Drive the loop from the given design and testbench.
    pub async fn run(
        &self,
        ctx: &RunContext,
        mut design: DesignArtifact,
        mut testbench: TestHarnessArtifact,
    ) -> Result<LoopOutcome> {
        let mut iterations = 0u32;
        let mut verifications = 0u32;
        let mut design_repairs = 0u32;
        let mut testbench_repairs = 0u32;

        loop {
            let report = self.verify(ctx, &design, &testbench, verifications + 1).await?;
            verifications += 1;

            let outcome = if report.is_clean() {
                Some(RunOutcome::Success)
            } else if iterations >= self.max_iterations {
                Some(RunOutcome::Exhausted)
            } else {
                None
            };
            if let Some(outcome) = outcome {
                return Ok(LoopOutcome {
                    outcome,
                    iterations,
                    verifications,
                    design_repairs,
                    testbench_repairs,
                    design,
                    testbench,
                    last_report: report,
                });
            }

            let repaired = report.artifacts_needing_repair();
            for kind in &repaired {
                let suggestions = &report.file(*kind).suggestions;
                match kind {
                    ArtifactKind::Design => {
                        self.repair(ctx, &mut design, suggestions, iterations + 1).await?;
                        design_repairs += 1;
                    }
                    ArtifactKind::Testbench => {
                        self.repair(ctx, &mut testbench, suggestions, iterations + 1).await?;
                        testbench_repairs += 1;
                    }
                }
            }

            iterations += 1;
            ctx.registry.set_iteration(&ctx.run_id, iterations)?;
            obs::emit_repair_iteration(&ctx.run_id, iterations, &repaired);
        }
    }

    async fn verify(
        &self,
        ctx: &RunContext,
        design: &DesignArtifact,
        testbench: &TestHarnessArtifact,
        attempt: u32,
    ) -> Result<VerificationReport> {
        let design_path = ctx.dir.write(DESIGN_FILE, &design.content)?;
        let testbench_path = ctx.dir.write(TESTBENCH_FILE, &testbench.content)?;

        ctx.emit(RunEvent::new(
            Stage::Simulation,
            format!("Running Icarus Verilog simulation - {attempt}"),
        ))?;
        let raw = self.verifier.verify(&design_path, &testbench_path).await?;
        METRICS.inc_verifications();
        ctx.dir.write(REPORT_MARKDOWN_FILE, &raw)?;
        ctx.emit(
            RunEvent::new(Stage::Simulation, format!("Simulation {attempt} complete"))
                .with_output(raw.as_str()),
        )?;

        ctx.emit(RunEvent::new(Stage::Processing, "Processing simulation report"))?;
        let mut report = extract_report(&raw)?;
        if let Some(kind) = attribute_unassigned_error(&mut report, TESTBENCH_FILE) {
            tracing::debug!(run_id = %ctx.run_id, artifact = %kind, "unattributed error assigned");
        }
        ctx.dir
            .write(REPORT_JSON_FILE, &serde_json::to_string_pretty(&report)?)?;
        Ok(report)
    }

    async fn repair(
        &self,
        ctx: &RunContext,
        artifact: &mut Revisioned,
        suggestions: &str,
        round: u32,
    ) -> Result<()> {
        let kind = artifact.kind;
        ctx.emit(RunEvent::new(
            Stage::Fixing,
            format!("The {kind} has suggestions. Running {kind} repair - {round}"),
        ))?;

        let prompt = match kind {
            ArtifactKind::Design => prompts::design_repair(&artifact.content, suggestions),
            ArtifactKind::Testbench => prompts::testbench_repair(&artifact.content, suggestions),
        };
        let text = self.generator.generate(&prompt).await?.into_text()?;
        artifact.revise(clean_hdl(&text));
        METRICS.inc_repairs();

        ctx.emit(
            RunEvent::new(
                Stage::Fixing,
                format!("{kind} repair {round} complete (revision {})", artifact.revision),
            )
            .with_output(artifact.content.as_str()),
        )?;
        Ok(())
    }
}
