//! Error types for platform capabilities.

use thiserror::Error;

/// Errors reported by injected device, inventory and persistence capabilities.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Element unreachable or its management session is down.
    #[error("device {element_id} unavailable: {reason}")]
    Unavailable { element_id: String, reason: String },

    /// Queried object or element does not exist.
    #[error("{element_id}: no object at {path}")]
    NotFound { element_id: String, path: String },

    /// Element refused the configuration.
    #[error("device {element_id} rejected configuration: {reason}")]
    Rejected { element_id: String, reason: String },

    /// Configuration could not be rendered from the template.
    #[error("failed to render template '{template}': {reason}")]
    Render { template: String, reason: String },

    /// Persistence backend failure.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("timed out after {0}s")]
    Timeout(u64),
}

impl DeviceError {
    pub fn unavailable(element_id: &str, reason: impl Into<String>) -> Self {
        DeviceError::Unavailable {
            element_id: element_id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn not_found(element_id: &str, path: &str) -> Self {
        DeviceError::NotFound {
            element_id: element_id.to_string(),
            path: path.to_string(),
        }
    }
}
