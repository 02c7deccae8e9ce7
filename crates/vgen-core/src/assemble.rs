//! Code assembly: per-subtask fragments → one design, revision 0.

use crate::collaborator::Completion;
use crate::domain::{ArtifactKind, CodeFragment, DesignArtifact, Result, Revisioned};

/// Compiler directive whose leading backtick must survive cleaning.
pub const TIMESCALE_DIRECTIVE: &str = "`timescale";

/// Separator placed between fragments.
const FRAGMENT_SEPARATOR: &str = "\n\n";

impl CodeFragment {
    /// Build a fragment from whatever shape the text generator returned.
    pub fn from_completion(subtask_id: u32, completion: Completion) -> Result<Self> {
        Ok(Self::new(subtask_id, completion.into_text()?))
    }
}

/// Strip markdown noise from generated HDL.
///
/// Lines starting with a code fence are dropped and every remaining backtick
/// is removed, except the one introducing `` `timescale ``.
pub fn clean_hdl(content: &str) -> String {
    content
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .map(strip_stray_backticks)
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_stray_backticks(line: &str) -> String {
    match line.find(TIMESCALE_DIRECTIVE) {
        Some(pos) => {
            let before = line[..pos].replace('`', "");
            let after = line[pos + TIMESCALE_DIRECTIVE.len()..].replace('`', "");
            format!("{before}{TIMESCALE_DIRECTIVE}{after}")
        }
        None => line.replace('`', ""),
    }
}

/// Merge fragments, in the order given, into design revision 0.
///
/// Callers pass fragments in subtask order; the order is preserved verbatim.
/// Fragments that are empty after cleaning are skipped.
pub fn assemble(fragments: &[CodeFragment]) -> DesignArtifact {
    let body = fragments
        .iter()
        .map(|f| clean_hdl(&f.text).trim().to_string())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(FRAGMENT_SEPARATOR);

    let mut content = body;
    if !content.is_empty() {
        content.push('\n');
    }
    Revisioned::initial(ArtifactKind::Design, content)
}
