//! HTTP text-generation backends for vgen.
//!
//! [`HttpTextGenerator`] implements [`vgen_core::TextGenerator`] against an
//! OpenAI-compatible chat API, a local Ollama server, or Google Gemini.

pub mod backends;
pub mod client;
pub mod config;
pub mod error;

pub use client::HttpTextGenerator;
pub use config::{BackendKind, LlmConfig};
pub use error::{LlmError, Result};
