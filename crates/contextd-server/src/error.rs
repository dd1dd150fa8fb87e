// src/error.rs
// Standardized error type for contextd, mapped to wire error codes at the tool boundary.

use contextd_types::ErrorCode;
use thiserror::Error;

/// Error kinds used across every service. Every variant carries a message naming the offending
/// field or operation — generic messages are forbidden at this boundary.
#[derive(Error, Debug)]
pub enum ContextdError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// Caller already retried via the adapter's backoff policy and still failed.
    #[error("backend unavailable: {0}")]
    TransientBackend(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ContextdError>;

impl ContextdError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidInput(_) => ErrorCode::ValidationError,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Conflict(_) => ErrorCode::Conflict,
            Self::TransientBackend(_) => ErrorCode::InternalError,
            Self::Timeout(_) => ErrorCode::TimeoutError,
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }
}

impl From<anyhow::Error> for ContextdError {
    fn from(err: anyhow::Error) -> Self {
        ContextdError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_mapping_matches_spec_table() {
        assert_eq!(
            ContextdError::InvalidInput("x".into()).code(),
            ErrorCode::ValidationError
        );
        assert_eq!(
            ContextdError::NotFound("x".into()).code(),
            ErrorCode::NotFound
        );
        assert_eq!(
            ContextdError::Timeout("x".into()).code(),
            ErrorCode::TimeoutError
        );
        assert_eq!(
            ContextdError::Conflict("x".into()).code(),
            ErrorCode::Conflict
        );
    }
}
