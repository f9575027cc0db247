//! Error types for the Ghost provider.

use thiserror::Error;

use crate::client::ClientError;
use crate::schema::Diagnostic;

/// Errors returned by the provider surface.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The configuration failed schema validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The provider is misconfigured or not configured yet.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The remote object changed since it was last read (etag mismatch).
    #[error("Resource changed since last plan, re-run plan: {0}")]
    Stale(String),

    /// The API rejected the credentials.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The API did not answer in time.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// The API could not be reached.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Any other failed API call.
    #[error("API error: {0}")]
    Api(String),

    /// The state handed to the provider lacks something it needs.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Get the error message without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Serialization(err) => err.to_string(),
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::Stale(msg)
            | Self::PermissionDenied(msg)
            | Self::DeadlineExceeded(msg)
            | Self::Unavailable(msg)
            | Self::Api(msg)
            | Self::InvalidRequest(msg) => msg.clone(),
        }
    }

    /// Render this error as an error diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.to_string())
    }
}

impl From<ClientError> for ProviderError {
    fn from(err: ClientError) -> Self {
        let msg = err.to_string();
        match err {
            ClientError::Status { status: 404, .. } => Self::NotFound(msg),
            ClientError::Status { status: 412, .. } => Self::Stale(msg),
            ClientError::Status {
                status: 401 | 403, ..
            } => Self::PermissionDenied(msg),
            ClientError::Status { .. } => Self::Api(msg),
            ClientError::Request(e) if e.is_timeout() => Self::DeadlineExceeded(msg),
            ClientError::Request(_) => Self::Unavailable(msg),
            ClientError::Decode(_) => Self::Api(msg),
            ClientError::Encode(e) => Self::Serialization(e),
        }
    }
}
