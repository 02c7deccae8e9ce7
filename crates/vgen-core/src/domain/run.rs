//! Run and event tracking.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::VgenError;

/// Status of a run as seen by observers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Starting,
    Running,
    WaitingForInput,
    Completed,
    /// Repair budget spent with suggestions still open. Not a failure.
    Exhausted,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Exhausted | RunStatus::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Starting => "starting",
            RunStatus::Running => "running",
            RunStatus::WaitingForInput => "waiting_for_input",
            RunStatus::Completed => "completed",
            RunStatus::Exhausted => "exhausted",
            RunStatus::Failed => "failed",
        }
    }
}

/// How the repair loop (or the run as a whole) terminated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    Exhausted,
    Fatal,
}

/// Which slice of the pipeline a run executes.
///
/// `Full` runs every stage; every other variant runs exactly one stage,
/// reading its inputs from the run directory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunType {
    #[default]
    Full,
    Planning,
    Subtasks,
    Merging,
    Testbench,
    Iverilog,
}

impl RunType {
    /// Whether a run of this type executes `step`.
    pub fn runs(&self, step: RunType) -> bool {
        *self == RunType::Full || *self == step
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunType::Full => "full",
            RunType::Planning => "planning",
            RunType::Subtasks => "subtasks",
            RunType::Merging => "merging",
            RunType::Testbench => "testbench",
            RunType::Iverilog => "iverilog",
        }
    }
}

impl FromStr for RunType {
    type Err = VgenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(RunType::Full),
            "planning" => Ok(RunType::Planning),
            "subtasks" => Ok(RunType::Subtasks),
            "merging" => Ok(RunType::Merging),
            "testbench" => Ok(RunType::Testbench),
            "iverilog" => Ok(RunType::Iverilog),
            other => Err(VgenError::InvalidRunType(other.to_string())),
        }
    }
}

impl std::fmt::Display for RunType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage label attached to every event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Planning,
    Processing,
    Subtasks,
    Subtask,
    SubtaskResult,
    Merging,
    Testbench,
    Simulation,
    Fixing,
    PreFeedback,
    HumanInput,
    Result,
    Error,
    Complete,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Planning => "planning",
            Stage::Processing => "processing",
            Stage::Subtasks => "subtasks",
            Stage::Subtask => "subtask",
            Stage::SubtaskResult => "subtask_result",
            Stage::Merging => "merging",
            Stage::Testbench => "testbench",
            Stage::Simulation => "simulation",
            Stage::Fixing => "fixing",
            Stage::PreFeedback => "pre_feedback",
            Stage::HumanInput => "human_input",
            Stage::Result => "result",
            Stage::Error => "error",
            Stage::Complete => "complete",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry in a run's append-only event log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunEvent {
    /// Position in the run's log; assigned by the registry on append.
    pub seq: u64,

    pub stage: Stage,

    pub message: String,

    /// Artifact content or collaborator output attached to the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl RunEvent {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            seq: 0,
            stage,
            message: message.into(),
            output: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }
}

/// Parameters of a submitted run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunRequest {
    #[serde(default = "default_problem")]
    pub problem: String,

    #[serde(default)]
    pub run_type: RunType,

    /// Earlier run whose artifacts seed this run's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_run: Option<String>,
}

fn default_problem() -> String {
    crate::prompts::DEFAULT_PROBLEM.to_string()
}

impl RunRequest {
    pub fn new(problem: impl Into<String>, run_type: RunType) -> Self {
        Self {
            problem: problem.into(),
            run_type,
            source_run: None,
        }
    }

    pub fn with_source_run(mut self, run_id: impl Into<String>) -> Self {
        self.source_run = Some(run_id.into());
        self
    }
}

impl Default for RunRequest {
    fn default() -> Self {
        Self::new(default_problem(), RunType::Full)
    }
}

/// Aggregate state of one run, owned by the registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunState {
    pub run_id: String,
    pub status: RunStatus,
    pub problem: String,
    pub run_type: RunType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_run: Option<String>,
    pub current_stage: Option<Stage>,
    pub outputs: Vec<RunEvent>,
    pub iteration_count: u32,
    pub waiting_for_input: bool,
    pub started_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RunOutcome>,
}

impl RunState {
    pub fn new(run_id: impl Into<String>, request: &RunRequest) -> Self {
        let now = Utc::now();
        Self {
            run_id: run_id.into(),
            status: RunStatus::Starting,
            problem: request.problem.clone(),
            run_type: request.run_type,
            source_run: request.source_run.clone(),
            current_stage: None,
            outputs: Vec::new(),
            iteration_count: 0,
            waiting_for_input: false,
            started_at: now,
            last_update: now,
            error: None,
            outcome: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn last_event(&self) -> Option<&RunEvent> {
        self.outputs.last()
    }
}

/// Generate a fresh, sortable run identifier.
pub fn new_run_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "run_{}_{}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        &suffix[..8]
    )
}
