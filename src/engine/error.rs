//! Error types for the reconciliation engine.

use super::ReconcileState;
use crate::intent::{IntentError, ValidationErrors};
use crate::resource::ResourceError;
use thiserror::Error;

/// Errors returned by [`ReconciliationEngine`](super::ReconciliationEngine).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Write rejected; nothing was changed.
    #[error("validation failed: {}", summarize(.0))]
    Validation(ValidationErrors),

    #[error("no handler registered for intent type '{0}'")]
    UnknownIntentType(String),

    /// Another reconciliation of the same target is in flight.
    #[error("target '{0}' is already being reconciled")]
    Busy(String),

    /// Cancelled before any network change was made.
    #[error("reconciliation of '{0}' cancelled")]
    Cancelled(String),

    #[error("target '{target}' cannot move from {from} to {to}")]
    InvalidTransition {
        target: String,
        from: ReconcileState,
        to: ReconcileState,
    },

    #[error(transparent)]
    Intent(#[from] IntentError),

    #[error(transparent)]
    Resource(#[from] ResourceError),
}

fn summarize(errors: &ValidationErrors) -> String {
    errors
        .iter()
        .map(|(field, message)| format!("{}: {}", field, message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display_lists_fields() {
        let mut errors = ValidationErrors::new();
        errors.insert("mtu".to_string(), "too small".to_string());
        errors.insert("Value inconsistency".to_string(), "same element".to_string());

        let message = EngineError::Validation(errors).to_string();
        assert_eq!(
            message,
            "validation failed: Value inconsistency: same element; mtu: too small"
        );
    }

    #[test]
    fn test_intent_error_conversion() {
        let err: EngineError = IntentError::validation("target", "empty").into();
        assert!(matches!(err, EngineError::Intent(_)));
    }
}
