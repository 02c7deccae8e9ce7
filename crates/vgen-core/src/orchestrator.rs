//! Run submission and the per-run worker.
//!
//! Each submitted run executes on its own tokio task. Whatever happens inside
//! (stage errors, collaborator failures, panics) ends as a terminal status in
//! the registry; nothing propagates to the caller's task.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::PipelineConfig;
use crate::domain::{
    new_run_id, Result, RunEvent, RunOutcome, RunRequest, RunState, RunStatus, Stage,
};
use crate::gate::HumanGate;
use crate::metrics::METRICS;
use crate::obs;
use crate::pipeline::{Pipeline, PipelineOutput, RunContext};
use crate::registry::RunRegistry;
use crate::store::ArtifactStore;

/// A run that has been accepted and spawned.
pub struct SubmittedRun {
    pub run_id: String,
    /// Snapshot taken at submission (`starting`).
    pub state: RunState,
    pub handle: JoinHandle<()>,
}

#[derive(Clone)]
pub struct Orchestrator {
    pipeline: Arc<Pipeline>,
    store: ArtifactStore,
    registry: Arc<RunRegistry>,
}

impl Orchestrator {
    pub fn new(pipeline: Pipeline, store: ArtifactStore, registry: Arc<RunRegistry>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            store,
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<RunRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        self.pipeline.config()
    }

    /// Register a run and start it in the background. Must be called from
    /// within a tokio runtime.
    ///
    /// # Errors
    ///
    /// `InvalidRunId` when `source_run` is not a plain run id,
    /// `MissingArtifact` when it names a run with no directory, and I/O
    /// errors preparing the run directory.
    pub fn submit(&self, request: RunRequest) -> Result<SubmittedRun> {
        let source = request
            .source_run
            .as_deref()
            .map(|id| self.store.existing_run_dir(id))
            .transpose()?;

        let run_id = new_run_id();
        let dir = self.store.run_dir(&run_id)?;
        if let Some(source) = &source {
            let copied = dir.seed_from(source)?;
            tracing::debug!(run_id = %run_id, copied, "seeded run directory");
        }
        let state = self.registry.create(&run_id, &request)?;
        METRICS.inc_runs_started();

        let ctx = RunContext::new(run_id.clone(), self.registry.clone(), dir);
        let pipeline = self.pipeline.clone();
        let handle = tokio::spawn(
            run_worker(pipeline, ctx, request).instrument(obs::run_span(&run_id)),
        );

        Ok(SubmittedRun {
            run_id,
            state,
            handle,
        })
    }

    /// Submit a run and wait for it to reach a terminal status.
    pub async fn run_to_completion(&self, request: RunRequest) -> Result<RunState> {
        let submitted = self.submit(request)?;
        if let Err(err) = submitted.handle.await {
            tracing::warn!(run_id = %submitted.run_id, error = %err, "run worker did not finish");
        }
        self.registry.get(&submitted.run_id)
    }
}

async fn run_worker(pipeline: Arc<Pipeline>, ctx: RunContext, request: RunRequest) {
    let started = Instant::now();
    obs::emit_run_started(&ctx.run_id, request.run_type);

    let result = AssertUnwindSafe(drive(&pipeline, &ctx, &request))
        .catch_unwind()
        .await;
    let finished = match result {
        Ok(Ok(output)) => finish(&pipeline, &ctx, output),
        Ok(Err(err)) => {
            tracing::warn!(run_id = %ctx.run_id, error = %err, "run failed");
            ctx.registry.fail(&ctx.run_id, &err.to_string())
        }
        Err(_) => ctx.registry.fail(&ctx.run_id, "run worker panicked"),
    };

    match finished {
        Ok(state) => {
            if let Err(err) = ctx.dir.write_run_summary(&state) {
                obs::emit_run_finalize_error(&ctx.run_id, &err);
            }
            obs::emit_run_finished(
                &ctx.run_id,
                started.elapsed().as_millis() as u64,
                state.outputs.len() as u64,
                state.outcome,
            );
        }
        // Typically the run was removed while in flight.
        Err(err) => obs::emit_run_finalize_error(&ctx.run_id, &err),
    }
    METRICS.flush();
}

async fn drive(
    pipeline: &Pipeline,
    ctx: &RunContext,
    request: &RunRequest,
) -> Result<PipelineOutput> {
    ctx.registry.set_status(&ctx.run_id, RunStatus::Running)?;
    let mut gate = if pipeline.needs_gate() {
        Some(HumanGate::attach(ctx.registry.clone(), &ctx.run_id)?)
    } else {
        None
    };
    pipeline.execute(ctx, request, gate.as_mut()).await
}

fn finish(pipeline: &Pipeline, ctx: &RunContext, output: PipelineOutput) -> Result<RunState> {
    let (status, outcome, event) = match output {
        PipelineOutput::Stage { run_type, output } => (
            RunStatus::Completed,
            RunOutcome::Success,
            RunEvent::new(Stage::Complete, format!("{run_type} run complete")).with_output(output),
        ),
        PipelineOutput::Verified(result) if result.is_success() => (
            RunStatus::Completed,
            RunOutcome::Success,
            RunEvent::new(
                Stage::Result,
                format!(
                    "Final design content (revision {}, {} repair iterations)",
                    result.design.revision, result.iterations
                ),
            )
            .with_output(result.design.content),
        ),
        PipelineOutput::Verified(result) => (
            RunStatus::Exhausted,
            RunOutcome::Exhausted,
            RunEvent::new(
                Stage::Result,
                format!(
                    "Maximum iterations ({}) reached after {} simulations; open suggestions may \
                     remain. Best-known design is revision {}",
                    pipeline.config().max_iterations,
                    result.verifications,
                    result.design.revision
                ),
            )
            .with_output(result.design.content),
        ),
    };
    ctx.registry
        .finish(&ctx.run_id, status, Some(outcome), event)
}
