//! vgen core library
//!
//! Turns a natural-language hardware problem into a verified HDL design:
//! plan → decompose → per-subtask generation → assembly → testbench →
//! bounded verify/repair loop. External text generation and simulation sit
//! behind the [`TextGenerator`] and [`Verifier`] traits.

pub mod assemble;
pub mod collaborator;
pub mod config;
pub mod decompose;
pub mod domain;
pub mod fakes;
pub mod gate;
pub mod markdown;
pub mod metrics;
pub mod obs;
pub mod orchestrator;
pub mod pipeline;
pub mod prompts;
pub mod registry;
pub mod repair;
pub mod report;
pub mod store;
pub mod telemetry;

pub use domain::{
    new_run_id, ArtifactKind, CodeFragment, CollaboratorError, DesignArtifact, FileReport,
    ReportFiles, ReportStage, ReportStatus, Result, Revisioned, RunEvent, RunOutcome, RunRequest,
    RunState, RunStatus, RunType, Stage, SubTask, TestHarnessArtifact, VerificationReport,
    VgenError,
};

pub use assemble::{assemble, clean_hdl};
pub use collaborator::{extract_raw_text, Completion, Prompt, PromptKind, TextGenerator, Verifier};
pub use config::{ConfigError, PipelineConfig};
pub use decompose::{decompose, Decomposition, PlanningArtifact};
pub use gate::{HumanGate, ReviewDecision};
pub use orchestrator::{Orchestrator, SubmittedRun};
pub use pipeline::{Pipeline, PipelineOutput, RunContext};
pub use registry::{EventsSince, RunRegistry, StreamCursor, StreamItem};
pub use repair::{LoopOutcome, RepairLoop};
pub use report::{attribute_unassigned_error, extract_report};
pub use store::{ArtifactStore, RunDir};

pub use metrics::METRICS;
pub use obs::{emit_run_finished, emit_run_started, RunSpan};
pub use telemetry::init_tracing;

/// Crate version, reported by the daemon's health endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
