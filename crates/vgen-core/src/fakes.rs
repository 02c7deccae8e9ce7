//! Deterministic collaborator fakes (testing only).
//!
//! `ScriptedGenerator` answers prompts from per-kind queues and
//! `ScriptedVerifier` replays a sequence of verifier outputs. Both record
//! every call so tests can assert on what the pipeline asked for.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use crate::collaborator::{Completion, Prompt, PromptKind, TextGenerator, Verifier};
use crate::domain::CollaboratorError;

type Scripted<T> = Result<T, CollaboratorError>;
type Responder = Arc<dyn Fn(&Prompt) -> String + Send + Sync>;

// ---------------------------------------------------------------------------
// ScriptedGenerator
// ---------------------------------------------------------------------------

/// Text generator driven by per-[`PromptKind`] response queues.
///
/// A queued response is used once; when a kind's queue is empty its
/// responder or default (in that order) answers instead. A kind with none of
/// these fails with `CollaboratorError::Generation`.
#[derive(Default)]
pub struct ScriptedGenerator {
    queues: Mutex<HashMap<PromptKind, VecDeque<Scripted<Completion>>>>,
    responders: Mutex<HashMap<PromptKind, Responder>>,
    defaults: Mutex<HashMap<PromptKind, Completion>>,
    calls: Mutex<Vec<Prompt>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every `kind` prompt with `text` once its queue runs dry.
    pub fn with_default(self, kind: PromptKind, text: impl Into<String>) -> Self {
        self.defaults
            .lock()
            .unwrap()
            .insert(kind, Completion::Text(text.into()));
        self
    }

    /// Answer `kind` prompts by computing the text from the prompt itself.
    pub fn with_responder<F>(self, kind: PromptKind, responder: F) -> Self
    where
        F: Fn(&Prompt) -> String + Send + Sync + 'static,
    {
        self.responders
            .lock()
            .unwrap()
            .insert(kind, Arc::new(responder));
        self
    }

    pub fn push(&self, kind: PromptKind, completion: impl Into<Completion>) {
        self.queues
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push_back(Ok(completion.into()));
    }

    pub fn push_error(&self, kind: PromptKind, error: CollaboratorError) {
        self.queues
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push_back(Err(error));
    }

    /// Every prompt received, in order.
    pub fn calls(&self) -> Vec<Prompt> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, kind: PromptKind) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.kind == kind)
            .count()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &Prompt) -> Result<Completion, CollaboratorError> {
        self.calls.lock().unwrap().push(prompt.clone());
        let queued = self
            .queues
            .lock()
            .unwrap()
            .get_mut(&prompt.kind)
            .and_then(VecDeque::pop_front);
        if let Some(result) = queued {
            return result;
        }
        let responder = self.responders.lock().unwrap().get(&prompt.kind).cloned();
        match responder {
            Some(respond) => Ok(Completion::Text(respond(prompt))),
            None => self
                .defaults
                .lock()
                .unwrap()
                .get(&prompt.kind)
                .cloned()
                .ok_or_else(|| {
                    CollaboratorError::Generation(format!(
                        "no scripted response for {:?}",
                        prompt.kind
                    ))
                }),
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptedVerifier
// ---------------------------------------------------------------------------

/// What the verifier saw on one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyCall {
    pub design: String,
    pub testbench: String,
}

/// Verifier that replays queued raw reports. Once the queue is empty the
/// last report is repeated.
#[derive(Debug, Default)]
pub struct ScriptedVerifier {
    queue: Mutex<VecDeque<Scripted<String>>>,
    last: Mutex<Option<String>>,
    calls: Mutex<Vec<VerifyCall>>,
}

impl ScriptedVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verifier that reports `raw` on every call.
    pub fn always(raw: impl Into<String>) -> Self {
        let verifier = Self::new();
        verifier.push(raw);
        verifier
    }

    pub fn push(&self, raw: impl Into<String>) {
        self.queue.lock().unwrap().push_back(Ok(raw.into()));
    }

    pub fn push_error(&self, error: CollaboratorError) {
        self.queue.lock().unwrap().push_back(Err(error));
    }

    pub fn calls(&self) -> Vec<VerifyCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Verifier for ScriptedVerifier {
    async fn verify(&self, design: &Path, testbench: &Path) -> Result<String, CollaboratorError> {
        let read = |path: &Path| {
            std::fs::read_to_string(path).map_err(|e| {
                CollaboratorError::Verification(format!("cannot read {}: {e}", path.display()))
            })
        };
        self.calls.lock().unwrap().push(VerifyCall {
            design: read(design)?,
            testbench: read(testbench)?,
        });

        let next = self.queue.lock().unwrap().pop_front();
        match next {
            Some(Ok(raw)) => {
                *self.last.lock().unwrap() = Some(raw.clone());
                Ok(raw)
            }
            Some(Err(err)) => Err(err),
            None => self.last.lock().unwrap().clone().ok_or_else(|| {
                CollaboratorError::Verification("no scripted report".to_string())
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Report builders
// ---------------------------------------------------------------------------

/// Markdown-fenced verifier report with the given per-file suggestions.
pub fn report_markdown(design_suggestions: &str, testbench_suggestions: &str) -> String {
    let status = if design_suggestions.is_empty() && testbench_suggestions.is_empty() {
        "success"
    } else {
        "error"
    };
    let report = json!({
        "status": status,
        "stage": "simulation",
        "files": {
            "design": {"content": "", "suggestions": design_suggestions},
            "testbench": {"content": "", "suggestions": testbench_suggestions},
        },
        "log": "",
        "timestamp": "2025-01-01T00:00:00Z",
    });
    format!("Simulation review:\n```json\n{report:#}\n```\n")
}

/// A report with nothing left to fix.
pub fn clean_report() -> String {
    report_markdown("", "")
}

/// Planning output in the shape the planner is asked for.
pub fn planning_markdown(subtasks: &[(&str, &str)]) -> String {
    let entries: Vec<_> = subtasks
        .iter()
        .enumerate()
        .map(|(i, (content, source))| json!({"id": i + 1, "content": content, "source": source}))
        .collect();
    let plan = json!({"Top-Level": "design", "Sub-Task": entries});
    format!("```json\n{plan:#}\n```\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::extract_report;

    #[tokio::test]
    async fn test_generator_queue_then_default() {
        let generator = ScriptedGenerator::new().with_default(PromptKind::Subtask, "module d;");
        generator.push(PromptKind::Subtask, "module first;");

        let prompt = Prompt::new(PromptKind::Subtask, "x");
        let first = generator.generate(&prompt).await.unwrap();
        let second = generator.generate(&prompt).await.unwrap();
        assert_eq!(first, Completion::from("module first;"));
        assert_eq!(second, Completion::from("module d;"));
        assert_eq!(generator.call_count(PromptKind::Subtask), 2);

        let err = generator
            .generate(&Prompt::new(PromptKind::Planning, "p"))
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Generation(_)));
    }

    #[test]
    fn test_report_builders_parse() {
        let clean = extract_report(&clean_report()).unwrap();
        assert!(clean.is_clean());
        let dirty = extract_report(&report_markdown("fix it", "")).unwrap();
        assert!(!dirty.design_clean());
        assert!(dirty.testbench_clean());
    }
}
