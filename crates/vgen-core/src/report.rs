//! Report extraction: raw verifier text → [`VerificationReport`].

use chrono::Utc;
use serde_json::{Map, Value};

use crate::domain::{
    ArtifactKind, FileReport, ReportFiles, ReportStage, ReportStatus, Result, VerificationReport,
    VgenError,
};
use crate::markdown::extract_json_block;

/// Suggestion keys in precedence order. The canonical spelling comes first;
/// the rest are spellings upstream reviewers have been seen to emit.
pub const SUGGESTION_KEYS: [&str; 4] = ["suggestions", "suggesstions", "sugestions", "suggestion"];

/// Parse the verifier's markdown-fenced JSON report.
///
/// # Errors
///
/// `VgenError::ReportParse` when there is no JSON payload, the payload does
/// not parse, or it lacks a `status`.
pub fn extract_report(raw: &str) -> Result<VerificationReport> {
    let payload = extract_json_block(raw)
        .ok_or_else(|| VgenError::ReportParse("no JSON block in verifier output".to_string()))?;
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| VgenError::ReportParse(format!("invalid JSON: {e}")))?;
    let root = value
        .as_object()
        .ok_or_else(|| VgenError::ReportParse("report is not a JSON object".to_string()))?;

    let status = match root.get("status").and_then(Value::as_str) {
        Some(s) => parse_status(s),
        None => return Err(VgenError::ReportParse("report has no `status`".to_string())),
    };
    let stage = root
        .get("stage")
        .and_then(Value::as_str)
        .map(ReportStage::parse_lenient)
        .unwrap_or(ReportStage::Unknown);

    let files = root.get("files").and_then(Value::as_object);
    let file = |key: &str| {
        files
            .and_then(|f| f.get(key))
            .and_then(Value::as_object)
            .map(file_report)
            .unwrap_or_default()
    };

    Ok(VerificationReport {
        status,
        stage,
        files: ReportFiles {
            design: file("design"),
            testbench: file("testbench"),
        },
        log: text_field(root, "log"),
        timestamp: root
            .get("timestamp")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Utc::now().to_rfc3339()),
    })
}

fn parse_status(raw: &str) -> ReportStatus {
    match raw.trim().to_ascii_lowercase().as_str() {
        "success" | "pass" | "passed" | "ok" => ReportStatus::Success,
        _ => ReportStatus::Error,
    }
}

fn file_report(map: &Map<String, Value>) -> FileReport {
    let suggestions = SUGGESTION_KEYS
        .iter()
        .map(|key| text_field(map, key))
        .find(|s| !s.is_empty())
        .unwrap_or_default();
    FileReport {
        content: text_field(map, "content"),
        suggestions,
    }
}

/// String value of `key`, trimmed. Arrays of strings are joined by newlines;
/// null and missing fields read as empty.
fn text_field(map: &Map<String, Value>, key: &str) -> String {
    match map.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Route an error report with no per-file suggestions to one artifact.
///
/// The log (or a synthesized message) becomes the testbench's suggestion only
/// when the log names `harness_file_name`; otherwise it goes to the design.
/// Returns the artifact that received the suggestion, if any.
pub fn attribute_unassigned_error(
    report: &mut VerificationReport,
    harness_file_name: &str,
) -> Option<ArtifactKind> {
    if report.status != ReportStatus::Error || !report.is_clean() {
        return None;
    }

    let target = if !harness_file_name.is_empty() && report.log.contains(harness_file_name) {
        ArtifactKind::Testbench
    } else {
        ArtifactKind::Design
    };
    let suggestion = if report.log.trim().is_empty() {
        format!(
            "verification reported an error during {} without further detail",
            report.stage.as_str()
        )
    } else {
        report.log.trim().to_string()
    };
    report.file_mut(target).suggestions = suggestion;
    Some(target)
}
