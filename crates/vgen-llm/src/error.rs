//! Text-generation backend errors.

use vgen_core::CollaboratorError;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("{0} backend is not configured: {1}")]
    NotConfigured(&'static str, String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("invalid {backend} endpoint {endpoint}: {message}")]
    Endpoint {
        backend: &'static str,
        endpoint: String,
        message: String,
    },

    #[error("{backend} request failed: {message}")]
    Request {
        backend: &'static str,
        message: String,
    },

    #[error("{backend} error {status}: {body}")]
    Status {
        backend: &'static str,
        status: u16,
        body: String,
    },

    #[error("invalid {backend} response: {message}")]
    InvalidResponse {
        backend: &'static str,
        message: String,
    },

    #[error("{backend} returned no text")]
    EmptyOutput { backend: &'static str },

    #[error("{backend} timed out after {timeout_secs}s")]
    Timeout {
        backend: &'static str,
        timeout_secs: u64,
    },
}

pub type Result<T> = std::result::Result<T, LlmError>;

impl From<LlmError> for CollaboratorError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Timeout {
                backend,
                timeout_secs,
            } => CollaboratorError::Timeout {
                collaborator: backend.to_string(),
                timeout_secs,
            },
            other => CollaboratorError::Generation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_keeps_its_shape() {
        let err: CollaboratorError = LlmError::Timeout {
            backend: "gemini",
            timeout_secs: 120,
        }
        .into();
        assert_eq!(err.to_string(), "gemini timed out after 120s");
    }

    #[test]
    fn test_status_error_is_generation_failure() {
        let err: CollaboratorError = LlmError::Status {
            backend: "openai",
            status: 429,
            body: "rate limited".to_string(),
        }
        .into();
        assert!(matches!(err, CollaboratorError::Generation(ref m) if m.contains("429")));
    }
}
