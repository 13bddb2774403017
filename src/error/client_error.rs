//! Unified error type for the client.
//!
//! `ClientError` consolidates the domain-specific error types so every
//! operation can return one `Result` and `main` can derive a single exit
//! status from whatever went wrong.

use std::fmt;

use super::auth::AuthError;
use super::category::ErrorCategory;
use super::config::{ConfigError, UsageError};
use super::network::NetworkError;
use super::task::TaskError;
use crate::hashing::HashError;

/// Unified error type for the client.
#[derive(Debug)]
pub enum ClientError {
    /// Missing or invalid configuration.
    Config(ConfigError),

    /// Contradictory flags or endpoint/scheme mismatch.
    Usage(UsageError),

    /// Transport and HTTP status failures.
    Network(NetworkError),

    /// Session acquisition and credential store failures.
    Auth(AuthError),

    /// Asynchronous task outcomes.
    Task(TaskError),

    /// Local file hashing failures.
    Hash(HashError),

    /// The service reported application-level errors and the caller opted
    /// into angry mode.
    Application { errors: u64 },
}

impl ClientError {
    /// Get the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ClientError::Config(err) => err.category(),
            ClientError::Usage(err) => err.category(),
            ClientError::Network(err) => err.category(),
            ClientError::Auth(err) => err.category(),
            ClientError::Task(err) => err.category(),
            ClientError::Hash(err) => err.category(),
            ClientError::Application { .. } => ErrorCategory::General,
        }
    }

    /// The process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        self.category().exit_code()
    }

    /// Get the recovery hint for this error.
    pub fn recovery_hint(&self) -> &'static str {
        self.category().recovery_hint()
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Config(err) => write!(f, "{}", err),
            ClientError::Usage(err) => write!(f, "{}", err),
            ClientError::Network(err) => write!(f, "{}", err),
            ClientError::Auth(err) => write!(f, "{}", err),
            ClientError::Task(err) => write!(f, "{}", err),
            ClientError::Hash(err) => write!(f, "{}", err),
            ClientError::Application { errors } => {
                write!(f, "Service reported {} error(s)", errors)
            }
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Config(err) => Some(err),
            ClientError::Usage(err) => Some(err),
            ClientError::Network(err) => Some(err),
            ClientError::Auth(err) => Some(err),
            ClientError::Task(err) => Some(err),
            ClientError::Hash(err) => Some(err),
            ClientError::Application { .. } => None,
        }
    }
}

// ============================================================================
// From implementations for automatic error conversion
// ============================================================================

impl From<ConfigError> for ClientError {
    fn from(err: ConfigError) -> Self {
        ClientError::Config(err)
    }
}

impl From<UsageError> for ClientError {
    fn from(err: UsageError) -> Self {
        ClientError::Usage(err)
    }
}

impl From<NetworkError> for ClientError {
    fn from(err: NetworkError) -> Self {
        ClientError::Network(err)
    }
}

impl From<AuthError> for ClientError {
    fn from(err: AuthError) -> Self {
        ClientError::Auth(err)
    }
}

impl From<TaskError> for ClientError {
    fn from(err: TaskError) -> Self {
        ClientError::Task(err)
    }
}

impl From<HashError> for ClientError {
    fn from(err: HashError) -> Self {
        ClientError::Hash(err)
    }
}
