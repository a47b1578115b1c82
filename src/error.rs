//! Error types for the HyperConverged operator

use thiserror::Error;

/// Result type alias using the operator's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Operator error types
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Malformed value in an environment override
    #[error("failed to decode environment variable {name}: {reason}")]
    EnvDecode { name: String, reason: String },

    /// Malformed or disallowed JSON patch annotation
    #[error("JSON patch error: {0}")]
    Patch(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create an environment decode error
    pub fn env_decode(name: &str, reason: impl ToString) -> Self {
        Error::EnvDecode {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a JSON patch error
    pub fn patch(msg: impl Into<String>) -> Self {
        Error::Patch(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// HTTP status code of the underlying API error, if any
    pub fn api_code(&self) -> Option<u16> {
        match self {
            Error::Kube(kube::Error::Api(resp)) => Some(resp.code),
            _ => None,
        }
    }

    /// The API server rejected a write because of a stale resource version
    pub fn is_conflict(&self) -> bool {
        self.api_code() == Some(409)
    }
}
