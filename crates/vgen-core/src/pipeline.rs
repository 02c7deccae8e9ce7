//! Stage sequencing for one run.
//!
//! A `full` run goes planning → subtasks → merging → testbench → iverilog.
//! Every other run type executes one stage and reads its inputs from the run
//! directory, where an earlier run (or `source_run` seeding) left them.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};

use crate::assemble::{assemble, clean_hdl};
use crate::collaborator::{Prompt, TextGenerator, Verifier};
use crate::config::PipelineConfig;
use crate::decompose::{decompose, Decomposition, PlanningArtifact};
use crate::domain::{
    ArtifactKind, CodeFragment, DesignArtifact, Result, Revisioned, RunEvent, RunRequest, RunType,
    Stage, SubTask, TestHarnessArtifact, VgenError,
};
use crate::gate::{HumanGate, ReviewDecision};
use crate::prompts;
use crate::registry::RunRegistry;
use crate::repair::{LoopOutcome, RepairLoop};
use crate::store::{RunDir, DECOMPOSITION_FILE, DESIGN_FILE, PLANNING_FILE, TESTBENCH_FILE};

/// Everything a stage needs to report progress and persist artifacts.
#[derive(Clone)]
pub struct RunContext {
    pub run_id: String,
    pub registry: Arc<RunRegistry>,
    pub dir: RunDir,
}

impl RunContext {
    pub fn new(run_id: impl Into<String>, registry: Arc<RunRegistry>, dir: RunDir) -> Self {
        Self {
            run_id: run_id.into(),
            registry,
            dir,
        }
    }

    pub fn emit(&self, event: RunEvent) -> Result<u64> {
        self.registry.append_event(&self.run_id, event)
    }
}

/// What a run produced before finalization.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutput {
    /// A partial run stopped after `run_type`'s stage.
    Stage { run_type: RunType, output: String },
    /// The verify/repair loop ran to a terminal state.
    Verified(LoopOutcome),
}

pub struct Pipeline {
    generator: Arc<dyn TextGenerator>,
    repair: RepairLoop,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        verifier: Arc<dyn Verifier>,
        config: PipelineConfig,
    ) -> Self {
        let repair = RepairLoop::new(generator.clone(), verifier, config.max_iterations);
        Self {
            generator,
            repair,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Whether any stage may stop for human review.
    pub fn needs_gate(&self) -> bool {
        self.config.review_planning || self.config.review_testbench
    }

    pub async fn execute(
        &self,
        ctx: &RunContext,
        request: &RunRequest,
        mut gate: Option<&mut HumanGate>,
    ) -> Result<PipelineOutput> {
        let run_type = request.run_type;
        let mut decomposition: Option<Decomposition> = None;
        let mut fragments: Option<Vec<CodeFragment>> = None;
        let mut design: Option<DesignArtifact> = None;
        let mut testbench: Option<TestHarnessArtifact> = None;
        let mut output = String::new();

        if run_type.runs(RunType::Planning) {
            let plan = self
                .plan(ctx, &request.problem, gate.as_deref_mut())
                .await?;
            output = plan.to_json_pretty()?;
            decomposition = Some(plan);
        }

        if run_type.runs(RunType::Subtasks) {
            let plan = match decomposition.take() {
                Some(plan) => plan,
                None => load_decomposition(ctx)?,
            };
            let generated = self.generate_subtasks(ctx, &plan.subtasks).await?;
            output = generated
                .iter()
                .map(|f| f.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n");
            fragments = Some(generated);
            decomposition = Some(plan);
        }

        if run_type.runs(RunType::Merging) {
            let fragments = match fragments.take() {
                Some(fragments) => fragments,
                None => load_fragments(ctx, decomposition.as_ref())?,
            };
            let merged = self.merge(ctx, &fragments)?;
            output = merged.content.clone();
            design = Some(merged);
        }

        if run_type.runs(RunType::Testbench) {
            let design = match &design {
                Some(design) => design.clone(),
                None => load_artifact(ctx, ArtifactKind::Design)?,
            };
            let harness = self
                .generate_testbench(ctx, &request.problem, &design, gate.as_deref_mut())
                .await?;
            output = harness.content.clone();
            testbench = Some(harness);
        }

        if run_type.runs(RunType::Iverilog) {
            let design = match design {
                Some(design) => design,
                None => load_artifact(ctx, ArtifactKind::Design)?,
            };
            let testbench = match testbench {
                Some(testbench) => testbench,
                None => load_artifact(ctx, ArtifactKind::Testbench)?,
            };
            let outcome = self.repair.run(ctx, design, testbench).await?;
            return Ok(PipelineOutput::Verified(outcome));
        }

        Ok(PipelineOutput::Stage { run_type, output })
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        Ok(self.generator.generate(prompt).await?.into_text()?)
    }

    /// Let a reviewer accept `content` or send it back with feedback until
    /// they accept. Returns `content` unchanged when review is off.
    async fn review<F, N>(
        &self,
        ctx: &RunContext,
        gate: Option<&mut HumanGate>,
        label: &str,
        mut content: String,
        revise: F,
        normalize: N,
    ) -> Result<String>
    where
        F: Fn(&str, &str) -> Prompt,
        N: Fn(String) -> String,
    {
        let Some(gate) = gate else {
            return Ok(content);
        };
        loop {
            match gate.request(label, &content).await? {
                ReviewDecision::Accept => return Ok(content),
                ReviewDecision::Revise(feedback) => {
                    ctx.emit(RunEvent::new(
                        Stage::HumanInput,
                        format!("Revising the {label} with feedback"),
                    ))?;
                    content = normalize(self.generate(&revise(&content, &feedback)).await?);
                }
            }
        }
    }

    async fn plan(
        &self,
        ctx: &RunContext,
        problem: &str,
        gate: Option<&mut HumanGate>,
    ) -> Result<Decomposition> {
        ctx.emit(RunEvent::new(Stage::Planning, "Starting planning"))?;
        let raw = self.generate(&prompts::planning(problem)).await?;
        let gate = gate.filter(|_| self.config.review_planning);
        let raw = self
            .review(
                ctx,
                gate,
                "plan",
                raw,
                |previous, feedback| prompts::planning_revision(problem, previous, feedback),
                |revised| revised,
            )
            .await?;
        ctx.dir.write(PLANNING_FILE, &raw)?;
        ctx.emit(RunEvent::new(Stage::Planning, "Planning complete").with_output(raw.as_str()))?;

        ctx.emit(RunEvent::new(Stage::Processing, "Processing markdown to JSON"))?;
        let plan = decompose(&PlanningArtifact::new(raw))?;
        ctx.dir.write(DECOMPOSITION_FILE, &plan.to_json_pretty()?)?;
        ctx.emit(RunEvent::new(
            Stage::Processing,
            format!("Decomposed into {} subtasks", plan.subtasks.len()),
        ))?;
        Ok(plan)
    }

    async fn generate_subtasks(
        &self,
        ctx: &RunContext,
        subtasks: &[SubTask],
    ) -> Result<Vec<CodeFragment>> {
        let total = subtasks.len();
        ctx.emit(RunEvent::new(
            Stage::Subtasks,
            format!("Found {total} subtasks to process"),
        ))?;

        // Futures are built eagerly; a lazily mapped stream of borrowing
        // futures is not `Send` for all lifetimes. `buffered` keeps input order.
        let pending: Vec<_> = subtasks
            .iter()
            .enumerate()
            .map(|(index, task)| self.generate_subtask(ctx, index + 1, total, task))
            .collect();
        let fragments: Vec<CodeFragment> = stream::iter(pending)
            .buffered(self.config.subtask_concurrency.max(1))
            .try_collect()
            .await?;

        ctx.emit(RunEvent::new(Stage::Subtasks, "All subtasks complete"))?;
        Ok(fragments)
    }

    async fn generate_subtask(
        &self,
        ctx: &RunContext,
        position: usize,
        total: usize,
        task: &SubTask,
    ) -> Result<CodeFragment> {
        ctx.emit(RunEvent::new(
            Stage::Subtask,
            format!("Processing subtask {position}/{total}: {}", task.content),
        ))?;
        let completion = self.generator.generate(&prompts::subtask(task)).await?;
        let fragment = CodeFragment::from_completion(task.id, completion)?;
        ctx.dir.write(&task.fragment_file_name(), &fragment.text)?;
        ctx.emit(
            RunEvent::new(
                Stage::SubtaskResult,
                format!("Completed subtask {position}/{total}"),
            )
            .with_output(fragment.text.as_str()),
        )?;
        Ok(fragment)
    }

    fn merge(&self, ctx: &RunContext, fragments: &[CodeFragment]) -> Result<DesignArtifact> {
        ctx.emit(RunEvent::new(
            Stage::Merging,
            format!("Merging {} code fragments", fragments.len()),
        ))?;
        let design = assemble(fragments);
        if design.content.trim().is_empty() {
            return Err(VgenError::MalformedArtifact(
                "assembled design is empty".to_string(),
            ));
        }
        ctx.dir.write(DESIGN_FILE, &design.content)?;
        ctx.emit(
            RunEvent::new(Stage::Merging, "Merging complete").with_output(design.content.as_str()),
        )?;
        Ok(design)
    }

    async fn generate_testbench(
        &self,
        ctx: &RunContext,
        problem: &str,
        design: &DesignArtifact,
        gate: Option<&mut HumanGate>,
    ) -> Result<TestHarnessArtifact> {
        ctx.emit(RunEvent::new(Stage::Testbench, "Generating testbench"))?;
        let raw = self.generate(&prompts::testbench(problem, &design.content)).await?;
        let gate = gate.filter(|_| self.config.review_testbench);
        let content = self
            .review(
                ctx,
                gate,
                "testbench",
                clean_hdl(&raw),
                |previous, feedback| {
                    prompts::testbench_revision(&design.content, previous, feedback)
                },
                |revised| clean_hdl(&revised),
            )
            .await?;
        ctx.dir.write(TESTBENCH_FILE, &content)?;
        ctx.emit(
            RunEvent::new(Stage::Testbench, "Testbench complete").with_output(content.as_str()),
        )?;
        Ok(Revisioned::initial(ArtifactKind::Testbench, content))
    }
}

fn load_decomposition(ctx: &RunContext) -> Result<Decomposition> {
    Decomposition::from_json(&ctx.dir.read(DECOMPOSITION_FILE)?)
}

fn load_fragments(ctx: &RunContext, plan: Option<&Decomposition>) -> Result<Vec<CodeFragment>> {
    let loaded;
    let plan = match plan {
        Some(plan) => plan,
        None => {
            loaded = load_decomposition(ctx)?;
            &loaded
        }
    };
    plan.subtasks
        .iter()
        .map(|task| Ok(CodeFragment::new(task.id, ctx.dir.read(&task.fragment_file_name())?)))
        .collect()
}

fn load_artifact(ctx: &RunContext, kind: ArtifactKind) -> Result<Revisioned> {
    let file = match kind {
        ArtifactKind::Design => DESIGN_FILE,
        ArtifactKind::Testbench => TESTBENCH_FILE,
    };
    Ok(Revisioned::initial(kind, ctx.dir.read(file)?))
}
