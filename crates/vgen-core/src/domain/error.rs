//! Domain-level error taxonomy for vgen.

use std::path::PathBuf;

/// Failures raised by an external collaborator (text generation or verification).
///
/// These are terminal for the run: the repair loop never retries a failed call,
/// it only iterates on successful-but-unclean verification reports.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("text generation failed: {0}")]
    Generation(String),

    #[error("verification failed: {0}")]
    Verification(String),

    #[error("{collaborator} timed out after {timeout_secs}s")]
    Timeout {
        collaborator: String,
        timeout_secs: u64,
    },
}

/// vgen domain errors.
#[derive(Debug, thiserror::Error)]
pub enum VgenError {
    #[error("malformed artifact: {0}")]
    MalformedArtifact(String),

    #[error("report parse error: {0}")]
    ReportParse(String),

    #[error("collaborator failure: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("missing artifact: {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("run not found: {0}")]
    RunNotFound(String),

    #[error("run already exists: {0}")]
    RunExists(String),

    #[error("run {0} has already finished")]
    RunFinished(String),

    #[error("run {0} is not currently waiting for input")]
    NotWaitingForInput(String),

    #[error("human input channel closed for run {0}")]
    InputChannelClosed(String),

    #[error("invalid run id: {0:?}")]
    InvalidRunId(String),

    #[error("invalid run type: {0}")]
    InvalidRunType(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for vgen domain operations.
pub type Result<T> = std::result::Result<T, VgenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_error_display() {
        let err = VgenError::from(CollaboratorError::Verification(
            "connection refused".to_string(),
        ));
        let msg = err.to_string();
        assert!(msg.contains("collaborator failure"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_timeout_display() {
        let err = CollaboratorError::Timeout {
            collaborator: "iverilog".to_string(),
            timeout_secs: 30,
        };
        assert_eq!(err.to_string(), "iverilog timed out after 30s");
    }

    #[test]
    fn test_missing_artifact_names_path() {
        let err = VgenError::MissingArtifact(PathBuf::from("runs/r1/design.sv"));
        assert!(err.to_string().contains("runs/r1/design.sv"));
    }
}
