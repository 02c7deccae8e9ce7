//! Domain models for vgen.
//!
//! Canonical definitions for the core entities:
//! - `SubTask` / `CodeFragment`: decomposition output and per-subtask code
//! - `Revisioned`: the live design and test harness
//! - `VerificationReport`: one compile/simulate verdict
//! - `RunState` / `RunEvent`: registry-owned run tracking

pub mod artifact;
pub mod error;
pub mod report;
pub mod run;
pub mod subtask;

pub use artifact::{ArtifactKind, DesignArtifact, Revisioned, TestHarnessArtifact};
pub use error::{CollaboratorError, Result, VgenError};
pub use report::{FileReport, ReportFiles, ReportStage, ReportStatus, VerificationReport};
pub use run::{
    new_run_id, RunEvent, RunOutcome, RunRequest, RunState, RunStatus, RunType, Stage,
};
pub use subtask::{CodeFragment, SubTask};
