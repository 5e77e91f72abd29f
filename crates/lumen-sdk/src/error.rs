//! Error types for the Lumen SDK

use lumen_gateway::GatewayError;
use thiserror::Error;

/// Result type for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;

/// SDK error types
#[derive(Error, Debug)]
pub enum SdkError {
    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network or transport error
    #[error("Network error: {0}")]
    Network(String),

    /// The store refused the operation for the current identity
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// Remote call succeeded but echoed a different value than requested
    #[error("Verification failed for {entity}: expected {expected}, got {actual}")]
    Verification {
        entity: String,
        expected: String,
        actual: String,
    },

    /// A remote procedure reported failure in its envelope
    #[error("Remote procedure {name} failed: {message}")]
    Rpc {
        name: String,
        code: Option<String>,
        message: String,
    },

    /// Storage (upload/object) error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Local validation failed before anything was sent
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No identity available for an operation that needs one
    #[error("No active session")]
    NoSession,
}

impl SdkError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        SdkError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Short text suitable for a transient user notification
    pub fn user_message(&self) -> String {
        match self {
            SdkError::Unauthorized(_) | SdkError::NoSession => {
                "You don't have permission to do that. Please sign in again.".to_string()
            }
            SdkError::Network(_) => "Couldn't reach the server. Please try again.".to_string(),
            SdkError::Verification { .. } => {
                "The change didn't stick on the server and was undone.".to_string()
            }
            SdkError::Validation { field, message } => format!("{}: {}", field, message),
            other => other.to_string(),
        }
    }
}

impl From<GatewayError> for SdkError {
    fn from(err: GatewayError) -> Self {
        if err.is_authorization() {
            return SdkError::Unauthorized(err.to_string());
        }
        match err {
            GatewayError::Http(e) => SdkError::Network(e.to_string()),
            GatewayError::Json(e) => SdkError::Serialization(e.to_string()),
            GatewayError::NotFound(what) => SdkError::NotFound(what),
            GatewayError::Rpc { name, code, message } => SdkError::Rpc { name, code, message },
            GatewayError::Config(msg) => SdkError::Config(msg),
            other => SdkError::Network(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        SdkError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for SdkError {
    fn from(err: toml::de::Error) -> Self {
        SdkError::Config(err.to_string())
    }
}
