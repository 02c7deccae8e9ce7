//! Boundaries to the two external black boxes: text generation and verification.
//!
//! Both traits are async and backend-agnostic. Deterministic implementations
//! for tests live in [`crate::fakes`]; production adapters live in the
//! `vgen-llm` and `vgen-sim` crates.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{CollaboratorError, VgenError};

/// Purpose of a text-generation request. Lets adapters and fakes route or
/// account for calls without parsing prompt text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    Planning,
    PlanningRevision,
    Subtask,
    Testbench,
    TestbenchRevision,
    DesignRepair,
    TestbenchRepair,
    VerificationReview,
}

/// A single text-generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub kind: PromptKind,
    pub text: String,
}

impl Prompt {
    pub fn new(kind: PromptKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// What a text generator hands back.
///
/// `Text` is the contract. `Structured` exists for integrations whose response
/// shape cannot be pinned down; [`Completion::into_text`] resolves it through
/// [`extract_raw_text`], the single fallback search.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Text(String),
    Structured(Value),
}

impl Completion {
    pub fn into_text(self) -> Result<String, VgenError> {
        match self {
            Completion::Text(text) => Ok(text),
            Completion::Structured(value) => extract_raw_text(&value).ok_or_else(|| {
                VgenError::MalformedArtifact(
                    "text generator response carried no raw text field".to_string(),
                )
            }),
        }
    }
}

impl From<String> for Completion {
    fn from(text: String) -> Self {
        Completion::Text(text)
    }
}

impl From<&str> for Completion {
    fn from(text: &str) -> Self {
        Completion::Text(text.to_string())
    }
}

/// Field names searched, in order, at every level of a nested response.
const RAW_TEXT_FIELDS: [&str; 5] = ["raw", "raw_output", "output", "text", "content"];

/// Find the raw completion text inside an arbitrarily nested response.
///
/// Search order: a bare string is returned as-is; for objects the
/// [`RAW_TEXT_FIELDS`] are checked in order (a string value wins, a nested
/// value is searched recursively), then every remaining field; arrays are
/// searched element by element. Returns `None` when no string is reachable
/// through those fields.
pub fn extract_raw_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => {
            for key in RAW_TEXT_FIELDS {
                if let Some(found) = map.get(key).and_then(extract_raw_text) {
                    return Some(found);
                }
            }
            map.iter()
                .filter(|(key, _)| !RAW_TEXT_FIELDS.contains(&key.as_str()))
                .filter(|(_, v)| v.is_object() || v.is_array())
                .find_map(|(_, v)| extract_raw_text(v))
        }
        Value::Array(items) => items.iter().find_map(extract_raw_text),
        _ => None,
    }
}

/// Stateless prompt-to-text service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &Prompt) -> Result<Completion, CollaboratorError>;
}

/// Compile-and-simulate service.
///
/// Returns the raw diagnostic document (markdown-fenced JSON) that the
/// report extractor turns into a `VerificationReport`.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, design: &Path, testbench: &Path) -> Result<String, CollaboratorError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_text_completion() {
        let c = Completion::from("module top; endmodule");
        assert_eq!(c.into_text().unwrap(), "module top; endmodule");
    }

    #[test]
    fn test_extract_from_wrapped_result() {
        let value = json!({
            "tasks_output": [],
            "result": { "raw": "module adder; endmodule", "token_usage": 12 }
        });
        assert_eq!(
            extract_raw_text(&value).as_deref(),
            Some("module adder; endmodule")
        );
    }

    #[test]
    fn test_known_field_wins_over_other_fields() {
        let value = json!({ "meta": { "note": "ignore me" }, "output": "picked" });
        assert_eq!(extract_raw_text(&value).as_deref(), Some("picked"));
    }

    #[test]
    fn test_nested_array_search() {
        let value = json!({ "choices": [ { "message": { "content": "from choice" } } ] });
        assert_eq!(extract_raw_text(&value).as_deref(), Some("from choice"));
    }

    #[test]
    fn test_no_text_is_malformed() {
        let c = Completion::Structured(json!({ "usage": 10 }));
        assert!(matches!(c.into_text(), Err(VgenError::MalformedArtifact(_))));
    }
}
