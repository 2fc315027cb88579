//! # Client Error Types
//!
//! Errors that abort a whole client operation. Failures of individual requests
//! inside an operation are not errors: they are collected into
//! [`ResultSet::failure`](crate::results::ResultSet) so sibling requests still complete.

use thiserror::Error;

/// Client operation result type
pub type ClientResult<T> = Result<T, ClientError>;

/// Operation-level error types
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization failed: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid option for {name}; should be one of: {}", .allowed.join(", "))]
    InvalidOption { name: String, allowed: Vec<String> },

    #[error("Page count probe failed for {endpoint}: {reason}")]
    CountProbeFailure { endpoint: String, reason: String },

    #[error("Correlation id {0} used by more than one request in a batch")]
    DuplicateCorrelationId(String),

    #[error("Admission gate closed: {0}")]
    AdmissionClosed(String),

    #[error("Invalid response: {field} - {reason}")]
    InvalidResponse { field: String, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ClientError {
    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Create an invalid option error from the field name and its accepted values
    pub fn invalid_option<I, S>(name: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::InvalidOption {
            name: name.into(),
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a count probe failure for a listing endpoint
    pub fn count_probe_failure(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CountProbeFailure {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid response error for a payload missing a required field
    pub fn invalid_response(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is recoverable (worth retrying the whole operation)
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            ClientError::HttpError(e) => e.is_timeout() || e.is_connect(),
            // A probe can fail on a transient network error; the caller may retry
            ClientError::CountProbeFailure { .. } => true,
            ClientError::InvalidResponse { .. } => false,
            _ => false,
        }
    }
}
