//! Icarus Verilog adapter for vgen.
//!
//! Runs `iverilog` and `vvp` as child processes with per-step timeouts and
//! implements [`vgen_core::Verifier`] on top of them.

pub mod config;
pub mod error;
pub mod icarus;
pub mod runner;
pub mod stage;

pub use config::SimConfig;
pub use error::{Result, SimError};
pub use icarus::{render_report, IcarusVerifier, SimOutcome, COMPILED_IMAGE};
pub use runner::{ProcessRunner, StageResult};
pub use stage::{SimStage, StageConfig};
