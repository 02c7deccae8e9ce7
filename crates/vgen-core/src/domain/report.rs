//! Structured verification report.

use serde::{Deserialize, Serialize};

use super::artifact::ArtifactKind;

/// Overall verdict of one verification pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Success,
    Error,
}

/// Where in the compile/simulate flow the report was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStage {
    FileReading,
    Compilation,
    Simulation,
    Process,
    Unknown,
}

impl ReportStage {
    /// Lenient mapping from upstream stage labels. Unrecognised labels map to `Unknown`.
    pub fn parse_lenient(raw: &str) -> Self {
        let normalized = raw
            .trim()
            .to_ascii_lowercase()
            .replace(|c: char| c == ' ' || c == '-', "_");
        match normalized.as_str() {
            "file_reading" | "reading" => ReportStage::FileReading,
            "compilation" | "compile" => ReportStage::Compilation,
            "simulation" | "simulate" => ReportStage::Simulation,
            "process" => ReportStage::Process,
            _ => ReportStage::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStage::FileReading => "file_reading",
            ReportStage::Compilation => "compilation",
            ReportStage::Simulation => "simulation",
            ReportStage::Process => "process",
            ReportStage::Unknown => "unknown",
        }
    }
}

/// Per-artifact content and repair advice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub content: String,
    /// Free-text advice; empty iff the artifact needs no repair.
    pub suggestions: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFiles {
    pub design: FileReport,
    pub testbench: FileReport,
}

/// One verification pass, fully replacing any previous report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub status: ReportStatus,
    pub stage: ReportStage,
    pub files: ReportFiles,
    pub log: String,
    pub timestamp: String,
}

impl VerificationReport {
    pub fn file(&self, kind: ArtifactKind) -> &FileReport {
        match kind {
            ArtifactKind::Design => &self.files.design,
            ArtifactKind::Testbench => &self.files.testbench,
        }
    }

    pub fn file_mut(&mut self, kind: ArtifactKind) -> &mut FileReport {
        match kind {
            ArtifactKind::Design => &mut self.files.design,
            ArtifactKind::Testbench => &mut self.files.testbench,
        }
    }

    /// `true` when the given artifact has no outstanding suggestions.
    pub fn is_artifact_clean(&self, kind: ArtifactKind) -> bool {
        self.file(kind).suggestions.is_empty()
    }

    pub fn design_clean(&self) -> bool {
        self.is_artifact_clean(ArtifactKind::Design)
    }

    pub fn testbench_clean(&self) -> bool {
        self.is_artifact_clean(ArtifactKind::Testbench)
    }

    /// Both artifacts clean. Pure function of the report.
    pub fn is_clean(&self) -> bool {
        self.design_clean() && self.testbench_clean()
    }

    /// Artifacts that carry suggestions, design first.
    pub fn artifacts_needing_repair(&self) -> Vec<ArtifactKind> {
        [ArtifactKind::Design, ArtifactKind::Testbench]
            .into_iter()
            .filter(|kind| !self.is_artifact_clean(*kind))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(design: &str, testbench: &str) -> VerificationReport {
        VerificationReport {
            status: ReportStatus::Success,
            stage: ReportStage::Simulation,
            files: ReportFiles {
                design: FileReport {
                    content: String::new(),
                    suggestions: design.to_string(),
                },
                testbench: FileReport {
                    content: String::new(),
                    suggestions: testbench.to_string(),
                },
            },
            log: String::new(),
            timestamp: String::new(),
        }
    }

    #[test]
    fn test_clean_predicates_are_independent() {
        let r = report("fix width mismatch", "");
        assert!(!r.design_clean());
        assert!(r.testbench_clean());
        assert!(!r.is_clean());
        assert_eq!(r.artifacts_needing_repair(), vec![ArtifactKind::Design]);
    }

    #[test]
    fn test_clean_check_is_stable() {
        let r = report("", "");
        assert_eq!(r.is_clean(), r.is_clean());
        assert!(r.is_clean());
        assert!(r.artifacts_needing_repair().is_empty());
    }

    #[test]
    fn test_stage_parse_lenient() {
        assert_eq!(ReportStage::parse_lenient("Compilation"), ReportStage::Compilation);
        assert_eq!(ReportStage::parse_lenient("file reading"), ReportStage::FileReading);
        assert_eq!(ReportStage::parse_lenient("elaboration"), ReportStage::Unknown);
    }
}
