//! Task decomposition: planning artifact → ordered subtasks.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Result, SubTask, VgenError};
use crate::markdown::{extract_json_block, strip_fence_markers};

/// Key of the subtask list inside the planning JSON.
pub const SUBTASK_KEY: &str = "Sub-Task";

/// Raw planning output, immutable once decomposed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanningArtifact {
    pub raw: String,
}

impl PlanningArtifact {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }
}

/// Cleaned decomposition, persisted between the planning and subtask stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decomposition {
    #[serde(rename = "Sub-Task")]
    pub subtasks: Vec<SubTask>,
}

impl Decomposition {
    /// Parse a previously persisted decomposition, re-validating its structure.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| VgenError::MalformedArtifact(format!("decomposition is not JSON: {e}")))?;
        Ok(Self {
            subtasks: subtasks_from_value(&value)?,
        })
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Split a planning artifact into its ordered subtasks.
///
/// # Errors
///
/// Returns `VgenError::MalformedArtifact` when the artifact holds no JSON
/// payload, the payload has no non-empty `Sub-Task` list, or an entry lacks
/// `content`.
pub fn decompose(artifact: &PlanningArtifact) -> Result<Decomposition> {
    let payload = extract_json_block(&artifact.raw).ok_or_else(|| {
        VgenError::MalformedArtifact("planning output contains no JSON payload".to_string())
    })?;
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| VgenError::MalformedArtifact(format!("planning payload is not JSON: {e}")))?;

    Ok(Decomposition {
        subtasks: subtasks_from_value(&value)?,
    })
}

fn subtasks_from_value(value: &Value) -> Result<Vec<SubTask>> {
    let entries = value
        .get(SUBTASK_KEY)
        .and_then(Value::as_array)
        .ok_or_else(|| {
            VgenError::MalformedArtifact(format!("missing `{SUBTASK_KEY}` list"))
        })?;

    if entries.is_empty() {
        return Err(VgenError::MalformedArtifact(format!(
            "`{SUBTASK_KEY}` list is empty"
        )));
    }

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| subtask_from_entry(index, entry))
        .collect()
}

fn subtask_from_entry(index: usize, entry: &Value) -> Result<SubTask> {
    let ordinal = index as u32 + 1;

    let content = entry
        .get("content")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| {
            VgenError::MalformedArtifact(format!("subtask {ordinal} has no `content`"))
        })?;

    let source = match entry.get("source") {
        Some(Value::String(s)) => strip_fence_markers(s),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    let id = entry
        .get("id")
        .and_then(Value::as_u64)
        .map(|id| id as u32)
        .unwrap_or(ordinal);

    Ok(SubTask::new(id, content, source))
}
