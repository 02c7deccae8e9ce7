//! `TextGenerator` over HTTP.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use vgen_core::{CollaboratorError, Completion, Prompt, TextGenerator};

use crate::backends;
use crate::config::{BackendKind, LlmConfig};
use crate::error::{LlmError, Result};

pub struct HttpTextGenerator {
    client: Client,
    config: LlmConfig,
}

impl HttpTextGenerator {
    /// Validate `config` and build a client with its timeout. System proxies
    /// are ignored unless `VGEN_USE_SYSTEM_PROXY` is set.
    pub fn new(config: LlmConfig) -> Result<Self> {
        config.validate()?;
        let mut builder = Client::builder().timeout(Duration::from_secs(config.timeout_secs));
        let use_system_proxy = std::env::var("VGEN_USE_SYSTEM_PROXY")
            .map(|value| matches!(value.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        if !use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| LlmError::Client(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Send one prompt and return the completion text.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let backend = self.config.backend;
        let url = backends::endpoint(&self.config)?;
        let mut request = self
            .client
            .post(url)
            .json(&backends::payload(&self.config, prompt));
        if backend == BackendKind::OpenAi {
            if let Some(key) = self.config.api_key.as_deref() {
                request = request.bearer_auth(key);
            }
        }

        let started = Instant::now();
        let response = request.send().await.map_err(|e| self.request_error(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.request_error(e))?;
        if !status.is_success() {
            return Err(LlmError::Status {
                backend: backend.as_str(),
                status: status.as_u16(),
                body: backends::truncate(&body),
            });
        }

        let text = backends::parse_response(backend, &body)?;
        tracing::debug!(
            backend = backend.as_str(),
            model = self.config.model(),
            latency_ms = started.elapsed().as_millis() as u64,
            chars = text.len(),
            "completion received"
        );
        Ok(text)
    }

    fn request_error(&self, err: reqwest::Error) -> LlmError {
        if err.is_timeout() {
            LlmError::Timeout {
                backend: self.config.backend.as_str(),
                timeout_secs: self.config.timeout_secs,
            }
        } else {
            LlmError::Request {
                backend: self.config.backend.as_str(),
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(
        &self,
        prompt: &Prompt,
    ) -> std::result::Result<Completion, CollaboratorError> {
        tracing::debug!(kind = ?prompt.kind, "text generation request");
        Ok(Completion::Text(self.complete(&prompt.text).await?))
    }
}
