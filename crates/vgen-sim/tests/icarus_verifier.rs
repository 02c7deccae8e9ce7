//! IcarusVerifier against stand-in `iverilog`/`vvp` shell scripts.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use vgen_core::fakes::{clean_report, ScriptedGenerator};
use vgen_core::{
    attribute_unassigned_error, extract_report, ArtifactKind, CollaboratorError, PromptKind,
    ReportStage, ReportStatus, Verifier,
};
use vgen_sim::{IcarusVerifier, SimConfig};

// Writing an executable while another test forks can make exec fail with
// ETXTBSY, so script-based tests run one at a time.
static SERIAL: Mutex<()> = Mutex::new(());

/// iverilog args: -g2012 -o <out> <design> <testbench>
const COMPILE_OK: &str = "touch \"$3\"";
const SIM_PASS: &str = "echo 'PASS: 12 vectors'";

struct Workspace {
    dir: TempDir,
    design: PathBuf,
    testbench: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let design = dir.path().join("design.sv");
        let testbench = dir.path().join("testbench.sv");
        std::fs::write(&design, "module div_16bit; endmodule\n").unwrap();
        std::fs::write(&testbench, "module tb; endmodule\n").unwrap();
        Self {
            dir,
            design,
            testbench,
        }
    }

    fn script(&self, name: &str, body: &str) -> String {
        let path = self.dir.path().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    fn config(&self, compile: &str, simulate: &str) -> SimConfig {
        SimConfig {
            iverilog_bin: self.script("fake-iverilog", compile),
            vvp_bin: self.script("fake-vvp", simulate),
            ..SimConfig::default()
        }
    }

    async fn verify(&self, verifier: &IcarusVerifier) -> Result<String, CollaboratorError> {
        verifier.verify(&self.design, &self.testbench).await
    }
}

fn lock() -> std::sync::MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[tokio::test]
async fn passing_simulation_yields_clean_report() {
    let _guard = lock();
    let ws = Workspace::new();
    let verifier = IcarusVerifier::new(ws.config(COMPILE_OK, SIM_PASS));

    let report = extract_report(&ws.verify(&verifier).await.unwrap()).unwrap();

    assert_eq!(report.status, ReportStatus::Success);
    assert_eq!(report.stage, ReportStage::Simulation);
    assert!(report.is_clean());
    assert!(report.log.contains("PASS"));
    assert_eq!(report.files.design.content, "module div_16bit; endmodule\n");
}

#[tokio::test]
async fn compile_errors_are_attributed_by_file_name() {
    let _guard = lock();
    let ws = Workspace::new();
    let compile = "echo \"$4:3: syntax error\" >&2\necho \"$5:9: Unknown module type: dut\" >&2\nexit 1";
    let verifier = IcarusVerifier::new(ws.config(compile, SIM_PASS));

    let report = extract_report(&ws.verify(&verifier).await.unwrap()).unwrap();

    assert_eq!(report.status, ReportStatus::Error);
    assert_eq!(report.stage, ReportStage::Compilation);
    assert!(report.files.design.suggestions.contains("syntax error"));
    assert!(report
        .files
        .testbench
        .suggestions
        .contains("Unknown module type"));
}

#[tokio::test]
async fn failing_checks_land_on_the_design() {
    let _guard = lock();
    let ws = Workspace::new();
    let simulate = "echo 'PASS: 1/1'\necho 'FAIL: A=100 B=7 expected 14 got 13'";
    let verifier = IcarusVerifier::new(ws.config(COMPILE_OK, simulate));

    let report = extract_report(&ws.verify(&verifier).await.unwrap()).unwrap();

    assert_eq!(report.status, ReportStatus::Error);
    assert_eq!(
        report.files.design.suggestions,
        "FAIL: A=100 B=7 expected 14 got 13"
    );
    assert!(report.testbench_clean());
}

#[tokio::test]
async fn silent_crash_is_left_for_default_attribution() {
    let _guard = lock();
    let ws = Workspace::new();
    let verifier = IcarusVerifier::new(ws.config(COMPILE_OK, "exit 3"));

    let mut report = extract_report(&ws.verify(&verifier).await.unwrap()).unwrap();

    assert_eq!(report.status, ReportStatus::Error);
    assert!(report.is_clean());
    assert_eq!(
        attribute_unassigned_error(&mut report, "testbench.sv"),
        Some(ArtifactKind::Design)
    );
}

#[tokio::test]
async fn missing_simulator_is_a_collaborator_failure() {
    let _guard = lock();
    let ws = Workspace::new();
    let config = SimConfig {
        iverilog_bin: "vgen-no-such-iverilog".to_string(),
        ..SimConfig::default()
    };

    let err = ws.verify(&IcarusVerifier::new(config)).await.unwrap_err();

    assert!(
        matches!(err, CollaboratorError::Verification(ref m) if m.contains("vgen-no-such-iverilog"))
    );
}

#[tokio::test]
async fn hung_simulation_times_out() {
    let _guard = lock();
    let ws = Workspace::new();
    let config = SimConfig {
        simulate_timeout_secs: 1,
        ..ws.config(COMPILE_OK, "sleep 5")
    };

    let err = ws.verify(&IcarusVerifier::new(config)).await.unwrap_err();

    assert_eq!(
        err,
        CollaboratorError::Timeout {
            collaborator: "vvp".to_string(),
            timeout_secs: 1,
        }
    );
}

#[tokio::test]
async fn missing_testbench_is_a_file_reading_report() {
    let ws = Workspace::new();
    let verifier = IcarusVerifier::new(SimConfig::default());

    let raw = verifier
        .verify(&ws.design, Path::new("/nonexistent/testbench.sv"))
        .await
        .unwrap();
    let report = extract_report(&raw).unwrap();

    assert_eq!(report.stage, ReportStage::FileReading);
    assert!(report.design_clean());
    assert!(!report.testbench_clean());
}

#[tokio::test]
async fn reviewer_writes_the_report() {
    let _guard = lock();
    let ws = Workspace::new();
    let reviewer = Arc::new(
        ScriptedGenerator::new().with_default(PromptKind::VerificationReview, clean_report()),
    );
    let verifier =
        IcarusVerifier::new(ws.config(COMPILE_OK, SIM_PASS)).with_reviewer(reviewer.clone());

    let raw = ws.verify(&verifier).await.unwrap();

    assert_eq!(raw, clean_report());
    let prompt = &reviewer.calls()[0];
    assert_eq!(prompt.kind, PromptKind::VerificationReview);
    assert!(prompt.text.contains("PASS: 12 vectors"));
    assert!(prompt.text.contains("module div_16bit"));
}
