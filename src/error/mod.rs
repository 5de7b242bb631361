//! Crate-level error type.

use thiserror::Error;

use crate::auth::AuthError;

/// Primary error type surfaced to the host process.
#[derive(Error, Debug)]
pub enum HytaleAuthError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: {0}")]
    Authentication(#[from] AuthError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used to decide how the host should react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Credentials,
    Network,
    RateLimit,
    Timeout,
    Storage,
    Protocol,
}

impl HytaleAuthError {
    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Io(_) => ErrorCategory::Storage,
            Self::Authentication(error) => match error {
                AuthError::NotLoggedIn
                | AuthError::AccessDenied
                | AuthError::DeviceCodeExpired
                | AuthError::ExpiredOrInvalidGrant
                | AuthError::InvalidSelection(_) => ErrorCategory::Credentials,
                AuthError::AuthorizationPending | AuthError::Timeout(_) => ErrorCategory::Timeout,
                AuthError::RateLimited { .. } => ErrorCategory::RateLimit,
                AuthError::Network(_) => ErrorCategory::Network,
                AuthError::Io(_) | AuthError::Serialization(_) => ErrorCategory::Storage,
                AuthError::InvalidResponse(_) => ErrorCategory::Protocol,
            },
        }
    }

    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Network | ErrorCategory::RateLimit | ErrorCategory::Timeout
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, HytaleAuthError>;
