//! Revisioned single-copy artifacts: the design under repair and its test harness.

use serde::{Deserialize, Serialize};

/// Which artifact a suggestion, repair or file refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Design,
    Testbench,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Design => "design",
            ArtifactKind::Testbench => "testbench",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The current revision of a text artifact.
///
/// Only the live revision is kept; `revise` overwrites the content and bumps
/// the revision counter by exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revisioned {
    pub kind: ArtifactKind,
    pub content: String,
    pub revision: u32,
}

impl Revisioned {
    /// Revision 0 of an artifact.
    pub fn initial(kind: ArtifactKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            revision: 0,
        }
    }

    /// Replace the content with an accepted fix.
    pub fn revise(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.revision += 1;
    }
}

/// The candidate HDL design.
pub type DesignArtifact = Revisioned;

/// The verification harness for the design.
pub type TestHarnessArtifact = Revisioned;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revise_is_monotonic() {
        let mut design = Revisioned::initial(ArtifactKind::Design, "module a; endmodule");
        assert_eq!(design.revision, 0);

        design.revise("module b; endmodule");
        design.revise("module c; endmodule");

        assert_eq!(design.revision, 2);
        assert_eq!(design.content, "module c; endmodule");
    }

    #[test]
    fn test_artifact_kind_display() {
        assert_eq!(ArtifactKind::Design.to_string(), "design");
        assert_eq!(ArtifactKind::Testbench.to_string(), "testbench");
    }
}
