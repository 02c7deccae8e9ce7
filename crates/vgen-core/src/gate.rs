//! Human review gate.
//!
//! A gate suspends its run until a value arrives through
//! [`RunRegistry::supply_input`]. There is no timeout.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::domain::{Result, RunEvent, Stage, VgenError};
use crate::registry::RunRegistry;

/// What the reviewer decided about the artifact under review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    Accept,
    Revise(String),
}

impl ReviewDecision {
    /// Empty (or whitespace) input accepts; anything else is feedback.
    pub fn from_input(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            ReviewDecision::Accept
        } else {
            ReviewDecision::Revise(trimmed.to_string())
        }
    }
}

pub struct HumanGate {
    registry: Arc<RunRegistry>,
    run_id: String,
    input: mpsc::Receiver<String>,
}

impl HumanGate {
    /// Bind a gate to `run_id`, taking ownership of its input channel.
    pub fn attach(registry: Arc<RunRegistry>, run_id: &str) -> Result<Self> {
        let input = registry.take_input_receiver(run_id)?;
        Ok(Self {
            registry,
            run_id: run_id.to_string(),
            input,
        })
    }

    /// Show `content` for review and wait for the reviewer's answer.
    pub async fn request(&mut self, label: &str, content: &str) -> Result<ReviewDecision> {
        self.registry.append_event(
            &self.run_id,
            RunEvent::new(Stage::PreFeedback, format!("Review the {label}")).with_output(content),
        )?;
        self.registry.append_event(
            &self.run_id,
            RunEvent::new(Stage::HumanInput, "Waiting for human input..."),
        )?;
        self.registry.begin_input_wait(&self.run_id)?;
        tracing::info!(run_id = %self.run_id, label, "waiting for human input");

        let value = self
            .input
            .recv()
            .await
            .ok_or_else(|| VgenError::InputChannelClosed(self.run_id.clone()))?;

        let decision = ReviewDecision::from_input(&value);
        let message = match &decision {
            ReviewDecision::Accept => "Input received: accepted".to_string(),
            ReviewDecision::Revise(feedback) => format!("Input received: {feedback}"),
        };
        self.registry
            .append_event(&self.run_id, RunEvent::new(Stage::HumanInput, message))?;
        Ok(decision)
    }
}
