//! Sub-module work items produced by decomposition.

use serde::{Deserialize, Serialize};

/// One independently generatable sub-module description.
///
/// Collections of subtasks keep insertion order, which is also the order the
/// generated fragments are assembled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTask {
    /// 1-based ordinal within the decomposition.
    pub id: u32,

    /// Natural-language description of the sub-module.
    pub content: String,

    /// Requirement text (or reference snippet) the description was derived from.
    #[serde(default)]
    pub source: String,
}

impl SubTask {
    pub fn new(id: u32, content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
            source: source.into(),
        }
    }

    /// File name the generated fragment for this subtask is persisted under.
    pub fn fragment_file_name(&self) -> String {
        format!("subtask_{}.v", self.id)
    }
}

/// A code fragment generated for one subtask, held only until assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeFragment {
    pub subtask_id: u32,
    pub text: String,
}

impl CodeFragment {
    pub fn new(subtask_id: u32, text: impl Into<String>) -> Self {
        Self {
            subtask_id,
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_file_name_uses_ordinal() {
        let task = SubTask::new(3, "full adder", "");
        assert_eq!(task.fragment_file_name(), "subtask_3.v");
    }

    #[test]
    fn test_source_defaults_to_empty() {
        let task: SubTask =
            serde_json::from_str(r#"{"id": 1, "content": "ripple carry chain"}"#).unwrap();
        assert_eq!(task.source, "");
    }
}
