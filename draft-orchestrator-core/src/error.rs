//! Unified error type definition

use serde::Serialize;
use thiserror::Error;

/// Core layer error type
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum CoreError {
    /// Backend metadata could not be loaded (connectivity / service handshake)
    #[error("Metadata unavailable: {0}")]
    MetadataUnavailable(String),

    /// Product not found
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Draft not found
    #[error("Draft not found: {0}")]
    DraftNotFound(String),

    /// Draft is in process by another user
    #[error("Draft for {product} is locked by {user}")]
    DraftLocked { product: String, user: String },

    /// Backend rejected the creation of a draft (e.g. concurrent draft limit)
    #[error("Draft creation rejected: {0}")]
    DraftCreationRejected(String),

    /// Backend call failed
    #[error("Backend error: {operation} - {message}")]
    BackendError { operation: String, message: String },

    /// Field-change submission failed
    #[error("Submitting changes failed: {0}")]
    SubmitFailed(String),

    /// serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Configuration could not be read
    #[error("Config error: {0}")]
    ConfigError(String),
}

impl CoreError {
    /// Shorthand for a failed backend operation.
    pub fn backend(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendError {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Whether it is expected behavior (user input, resource does not exist, etc.) is used for log classification.
    ///
    /// Level `warn` should be used when returning `true` and level `error` when returning `false`.
    /// **Please update this method simultaneously when new variants are added. **
    #[must_use]
    pub fn is_expected(&self) -> bool {
        match self {
            Self::ProductNotFound(_)
            | Self::DraftNotFound(_)
            | Self::DraftLocked { .. }
            | Self::DraftCreationRejected(_)
            | Self::ValidationError(_) => true,
            Self::MetadataUnavailable(_)
            | Self::BackendError { .. }
            | Self::SubmitFailed(_)
            | Self::SerializationError(_)
            | Self::ConfigError(_) => false,
        }
    }

    /// Log this error at the level matching [`CoreError::is_expected`].
    pub fn log(&self, context: &str) {
        if self.is_expected() {
            log::warn!("{context}: {self}");
        } else {
            log::error!("{context}: {self}");
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// Core layer Result type alias
pub type CoreResult<T> = std::result::Result<T, CoreError>;
