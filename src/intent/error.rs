//! Error types for intent handlers.

use crate::platform::DeviceError;
use crate::resource::ResourceError;
use thiserror::Error;

/// Errors raised by an [`IntentHandler`](super::IntentHandler).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntentError {
    /// Target or config could not be interpreted.
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Handler returned something the engine cannot use.
    #[error("handler contract violated: {0}")]
    Contract(String),
}

impl IntentError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        IntentError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}
