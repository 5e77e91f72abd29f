//! Error types for the gateway client

use thiserror::Error;

/// Gateway client error
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed before a response arrived
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The platform rejected the caller (401/403 or policy violation)
    #[error("Unauthorized ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    /// Server returned an error
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Row, object or procedure not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A remote procedure answered with `success: false`
    #[error("RPC {name} failed: {message}")]
    Rpc {
        name: String,
        code: Option<String>,
        message: String,
    },

    /// Invalid response from server
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl GatewayError {
    /// Whether the platform refused the operation for the current identity.
    ///
    /// Some policy failures come back as a plain 400 with a row-level security
    /// message, so the body text is checked as well.
    pub fn is_authorization(&self) -> bool {
        match self {
            GatewayError::Unauthorized { .. } => true,
            GatewayError::Server { message, .. } => looks_like_policy_violation(message),
            GatewayError::Rpc { code, message, .. } => {
                matches!(code.as_deref(), Some("42501") | Some("PGRST301"))
                    || looks_like_policy_violation(message)
            }
            _ => false,
        }
    }

    /// Whether the request never got a usable answer (network, timeout)
    pub fn is_transport(&self) -> bool {
        matches!(self, GatewayError::Http(_))
    }
}

fn looks_like_policy_violation(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("row-level security")
        || lower.contains("permission denied")
        || lower.contains("jwt expired")
        || lower.contains("not authorized")
}

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_message_counts_as_authorization() {
        let err = GatewayError::Server {
            status: 400,
            message: "new row violates row-level security policy for table \"projects\"".into(),
        };
        assert!(err.is_authorization());

        let err = GatewayError::Server {
            status: 500,
            message: "deadlock detected".into(),
        };
        assert!(!err.is_authorization());
    }

    #[test]
    fn test_rpc_permission_code() {
        let err = GatewayError::Rpc {
            name: "update_project_status".into(),
            code: Some("42501".into()),
            message: "denied".into(),
        };
        assert!(err.is_authorization());
        assert!(!err.is_transport());
    }
}
