use thiserror::Error;

use crate::error::CopilotError;

/// Errors raised while acquiring or exchanging credentials.
///
/// `authorization_pending` and `slow_down` are not errors; the polling loop
/// models them as states.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Access denied by user")]
    AccessDenied,
    #[error("Expired or invalid grant")]
    ExpiredOrInvalidGrant,
    #[error("OAuth error: {0}")]
    OAuth(String),
    #[error("{endpoint} request failed with status {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Failed to decode response: {0}")]
    Serialization(String),
    #[error("Operation cancelled")]
    Cancelled,
}

impl AuthError {
    /// HTTP status carried by a protocol error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<AuthError> for CopilotError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Cancelled => CopilotError::Cancelled,
            other => CopilotError::Authentication(other),
        }
    }
}
