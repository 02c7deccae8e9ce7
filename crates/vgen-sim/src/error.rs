//! Simulator adapter errors.

use vgen_core::CollaboratorError;

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("stage {0} has an empty command")]
    EmptyCommand(String),

    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("stage {stage} timed out after {timeout_secs} seconds")]
    Timeout { stage: String, timeout_secs: u64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;

impl From<SimError> for CollaboratorError {
    fn from(err: SimError) -> Self {
        match err {
            SimError::Timeout {
                stage,
                timeout_secs,
            } => CollaboratorError::Timeout {
                collaborator: stage,
                timeout_secs,
            },
            other => CollaboratorError::Verification(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_maps_to_collaborator_timeout() {
        let err: CollaboratorError = SimError::Timeout {
            stage: "vvp".to_string(),
            timeout_secs: 30,
        }
        .into();
        assert_eq!(err.to_string(), "vvp timed out after 30s");
    }

    #[test]
    fn test_spawn_failure_is_verification_error() {
        let err: CollaboratorError = SimError::Spawn {
            program: "iverilog".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        }
        .into();
        assert!(matches!(err, CollaboratorError::Verification(ref m) if m.contains("iverilog")));
    }
}
