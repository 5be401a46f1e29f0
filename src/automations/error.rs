// Error types for the automation engine

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Automation not found: {0}")]
    NotFound(Uuid),

    /// Stored trigger or action type the engine does not know
    #[error("Unknown {kind} '{value}'")]
    UnknownType { kind: &'static str, value: String },

    #[error("Invalid trigger configuration for automation {automation_id}: {reason}")]
    InvalidTriggerConfig { automation_id: Uuid, reason: String },

    #[error("No evaluator registered for trigger '{0}'")]
    UnregisteredTrigger(String),
}

/// Failure reported by the message-sending collaborator
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatch timed out after {0:?}")]
    Timeout(Duration),

    #[error("message rejected: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        DispatchError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let id = Uuid::nil();
        let error = AutomationError::InvalidTriggerConfig {
            automation_id: id,
            reason: "hours_before must be a non-negative integer".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid trigger configuration for automation 00000000-0000-0000-0000-000000000000: hours_before must be a non-negative integer"
        );

        let error = AutomationError::UnknownType {
            kind: "trigger type",
            value: "moon_phase".to_string(),
        };
        assert_eq!(error.to_string(), "Unknown trigger type 'moon_phase'");
    }

    #[test]
    fn test_dispatch_timeout_display() {
        let error = DispatchError::Timeout(Duration::from_secs(10));
        assert_eq!(error.to_string(), "dispatch timed out after 10s");
    }

    #[test]
    fn test_error_from_sqlx() {
        let error: AutomationError = sqlx::Error::RowNotFound.into();
        assert!(matches!(error, AutomationError::Database(_)));
    }
}
