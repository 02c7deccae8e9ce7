//! Backend selection and credentials.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LlmError, Result};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2:3b";
pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Gemini,
    /// Any `/chat/completions` API.
    OpenAi,
    Ollama,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Gemini => "gemini",
            BackendKind::OpenAi => "openai",
            BackendKind::Ollama => "ollama",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            BackendKind::Gemini => DEFAULT_GEMINI_MODEL,
            BackendKind::OpenAi => DEFAULT_OPENAI_MODEL,
            BackendKind::Ollama => DEFAULT_OLLAMA_MODEL,
        }
    }

    /// Environment variable holding this backend's API key, if it uses one.
    pub fn api_key_var(&self) -> Option<&'static str> {
        match self {
            BackendKind::Gemini => Some("GEMINI_API_KEY"),
            BackendKind::OpenAi => Some("OPENAI_API_KEY"),
            BackendKind::Ollama => None,
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(BackendKind::Gemini),
            "openai" | "open_ai" | "openai-compatible" => Ok(BackendKind::OpenAi),
            "ollama" | "local" => Ok(BackendKind::Ollama),
            other => Err(format!("unknown text-generation backend: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub backend: BackendKind,
    /// Empty means the backend's default model.
    pub model: String,
    /// Base URL or full endpoint; `None` uses the backend's public endpoint.
    pub endpoint: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            model: String::new(),
            endpoint: None,
            api_key: None,
            temperature: None,
            max_tokens: None,
            timeout_secs: 120,
        }
    }
}

impl LlmConfig {
    pub fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            ..Self::default()
        }
    }

    pub fn model(&self) -> &str {
        if self.model.trim().is_empty() {
            self.backend.default_model()
        } else {
            &self.model
        }
    }

    /// Fill unset fields from environment variables (`VGEN_LLM_BACKEND`,
    /// `VGEN_LLM_MODEL`, `VGEN_LLM_ENDPOINT` and the backend's key variable).
    pub fn with_env(self) -> Self {
        self.with_lookup(|key| std::env::var(key).ok())
    }

    pub fn with_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(backend) = non_empty("VGEN_LLM_BACKEND").and_then(|v| v.parse().ok()) {
            self.backend = backend;
        }
        if self.model.is_empty() {
            self.model = non_empty("VGEN_LLM_MODEL").unwrap_or_default();
        }
        if self.endpoint.is_none() {
            self.endpoint = non_empty("VGEN_LLM_ENDPOINT");
        }
        if self.api_key.is_none() {
            self.api_key = self.backend.api_key_var().and_then(non_empty);
        }
        self
    }

    /// Check that the selected backend has what it needs to make a call.
    pub fn validate(&self) -> Result<()> {
        if let Some(var) = self.backend.api_key_var() {
            if self.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
                return Err(LlmError::NotConfigured(
                    self.backend.as_str(),
                    format!("set {var}"),
                ));
            }
        }
        if self.timeout_secs == 0 {
            return Err(LlmError::NotConfigured(
                self.backend.as_str(),
                "timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
