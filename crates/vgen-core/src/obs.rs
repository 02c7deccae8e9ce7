//! Structured lifecycle events for pipeline runs.
//!
//! Everything here logs at `info!` (or `warn!` for finalize errors) with an
//! `event` field, so `RUST_LOG=vgen_core=info` plus JSON output gives a
//! machine-readable run trail.

use tracing::info;

use crate::domain::{ArtifactKind, RunOutcome, RunType, Stage};

/// Enters a run-scoped span; every log line inside carries `run_id`.
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    pub fn enter(run_id: &str) -> Self {
        let span = tracing::info_span!("vgen.run", run_id = %run_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Span for instrumenting a run's future (`.instrument(run_span(id))`).
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("vgen.run", run_id = %run_id)
}

pub fn emit_run_started(run_id: &str, run_type: RunType) {
    info!(event = "run.started", run_id = %run_id, run_type = %run_type);
}

pub fn emit_event_appended(run_id: &str, stage: Stage, seq: u64) {
    info!(event = "run.event_appended", run_id = %run_id, stage = %stage, seq = seq);
}

pub fn emit_repair_iteration(run_id: &str, iteration: u32, repaired: &[ArtifactKind]) {
    let repaired: Vec<&str> = repaired.iter().map(ArtifactKind::as_str).collect();
    info!(
        event = "repair.iteration",
        run_id = %run_id,
        iteration = iteration,
        repaired = ?repaired,
    );
}

pub fn emit_run_finished(
    run_id: &str,
    duration_ms: u64,
    total_events: u64,
    outcome: Option<RunOutcome>,
) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        total_events = total_events,
        outcome = ?outcome,
    );
}

/// Summary or digest could not be written after the run ended.
pub fn emit_run_finalize_error(run_id: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "run.finalize_error", run_id = %run_id, error = %error);
}
