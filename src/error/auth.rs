//! Authentication-related error types.
//!
//! Errors raised while obtaining, refreshing or persisting bearer sessions.

use std::fmt;
use std::path::PathBuf;

use super::category::ErrorCategory;

/// Authentication-specific error variants.
#[derive(Debug, Clone)]
pub enum AuthError {
    /// No session could be obtained for the scope without operator input.
    NoSession { scope: String },

    /// The operator never pasted a usable callback URL.
    PromptExhausted { attempts: u32 },

    /// The prompt could not be read (closed stdin, ...).
    PromptFailed { message: String },

    /// The callback URL carried a different `state` than the one issued.
    StateMismatch,

    /// The callback URL had no authorization `code`.
    MissingCode { callback: String },

    /// The identity provider rejected a grant or refresh exchange.
    TokenEndpoint { status: u16, message: String },

    /// The token endpoint answered with something that is not a token.
    InvalidTokenResponse { message: String },

    /// The stored record has no refresh token.
    NoRefreshToken { scope: String },

    /// The credential store exists but is not valid JSON.
    CredentialsMalformed { path: PathBuf, message: String },

    /// The credential store could not be written.
    CredentialsSaveFailed { path: PathBuf, message: String },

    /// Bearer mode requested without `CLIENT_ID`/`CLIENT_SECRET`.
    MissingClientCredentials,
}

impl AuthError {
    /// Map onto the exit taxonomy.
    pub fn category(&self) -> ErrorCategory {
        match self {
            AuthError::NoSession { .. }
            | AuthError::PromptExhausted { .. }
            | AuthError::PromptFailed { .. }
            | AuthError::NoRefreshToken { .. } => ErrorCategory::TempFail,
            AuthError::StateMismatch | AuthError::MissingCode { .. } => {
                ErrorCategory::Permission
            }
            AuthError::TokenEndpoint { status, .. } => match *status {
                429 | 503 => ErrorCategory::TempFail,
                500 => ErrorCategory::Unavailable,
                _ => ErrorCategory::Permission,
            },
            AuthError::InvalidTokenResponse { .. } => ErrorCategory::Unavailable,
            AuthError::CredentialsMalformed { .. } | AuthError::MissingClientCredentials => {
                ErrorCategory::Configuration
            }
            AuthError::CredentialsSaveFailed { .. } => ErrorCategory::Io,
        }
    }

    /// Whether a fresh interactive grant could fix this error.
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            AuthError::NoSession { .. }
                | AuthError::NoRefreshToken { .. }
                | AuthError::TokenEndpoint { .. }
                | AuthError::InvalidTokenResponse { .. }
        )
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::NoSession { .. } => "E_AUTH_NO_SESSION",
            AuthError::PromptExhausted { .. } => "E_AUTH_PROMPT",
            AuthError::PromptFailed { .. } => "E_AUTH_PROMPT_IO",
            AuthError::StateMismatch => "E_AUTH_STATE",
            AuthError::MissingCode { .. } => "E_AUTH_CODE",
            AuthError::TokenEndpoint { .. } => "E_AUTH_TOKEN",
            AuthError::InvalidTokenResponse { .. } => "E_AUTH_TOKEN_FORMAT",
            AuthError::NoRefreshToken { .. } => "E_AUTH_NO_REFRESH",
            AuthError::CredentialsMalformed { .. } => "E_AUTH_STORE_FORMAT",
            AuthError::CredentialsSaveFailed { .. } => "E_AUTH_STORE_WRITE",
            AuthError::MissingClientCredentials => "E_AUTH_CLIENT",
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::NoSession { scope } => write!(
                f,
                "Unexpected OAuth error: no session for scope '{}'. Try refreshing all tokens with `ocarina oauth refresh`.",
                scope
            ),
            AuthError::PromptExhausted { attempts } => write!(
                f,
                "Giving up on OAuth authentication after {} attempts. Try again later.",
                attempts
            ),
            AuthError::PromptFailed { message } => {
                write!(f, "Could not read the callback URL: {}", message)
            }
            AuthError::StateMismatch => {
                write!(f, "Callback state does not match the authorization request")
            }
            AuthError::MissingCode { callback } => {
                write!(f, "Callback URL has no authorization code: {}", callback)
            }
            AuthError::TokenEndpoint { status, message } => {
                write!(f, "Token endpoint returned HTTP {}: {}", status, message)
            }
            AuthError::InvalidTokenResponse { message } => {
                write!(f, "Invalid token response: {}", message)
            }
            AuthError::NoRefreshToken { scope } => {
                write!(f, "Stored token for scope '{}' cannot be refreshed", scope)
            }
            AuthError::CredentialsMalformed { path, message } => write!(
                f,
                "{} does not appear to be valid JSON: {}",
                path.display(),
                message
            ),
            AuthError::CredentialsSaveFailed { path, message } => {
                write!(f, "Failed to write {}: {}", path.display(), message)
            }
            AuthError::MissingClientCredentials => {
                write!(f, "CLIENT_ID and CLIENT_SECRET must be configured to use --oauth")
            }
        }
    }
}

impl std::error::Error for AuthError {}
