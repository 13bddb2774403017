//! Configuration and usage error types.
//!
//! Both are raised before any network activity and are never retried.

use std::fmt;
use std::path::PathBuf;

use super::category::ErrorCategory;

/// Problems with the primary configuration.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// No configuration file existed; a skeleton was written at `path`.
    Initialised { path: PathBuf },

    /// The configuration file is not valid JSON.
    InvalidJson { path: PathBuf, message: String },

    /// `--profile` named a profile the file does not define.
    UnknownProfile { profile: String },

    /// Required keys are unset.
    MissingKeys { keys: Vec<&'static str> },

    /// A key holds a value of the wrong type.
    InvalidValue { key: String, message: String },

    /// The home directory could not be determined.
    NoHomeDirectory,

    /// The configuration file could not be read or written.
    Io { path: PathBuf, message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Initialised { path } => write!(
                f,
                "No configuration file found.\nThe default configuration has been initialised at {}\nEdit the file and fill in the configuration keys to use Ocarina.",
                path.display()
            ),
            ConfigError::InvalidJson { path, message } => write!(
                f,
                "{} does not appear to be valid JSON: {}",
                path.display(),
                message
            ),
            ConfigError::UnknownProfile { profile } => {
                write!(f, "Profile '{}' is not defined in the configuration", profile)
            }
            ConfigError::MissingKeys { keys } => {
                write!(f, "{} must be set", keys.join(", "))
            }
            ConfigError::InvalidValue { key, message } => {
                write!(f, "Invalid value for {}: {}", key, message)
            }
            ConfigError::NoHomeDirectory => write!(f, "Could not determine home directory"),
            ConfigError::Io { path, message } => {
                write!(f, "Could not access {}: {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Contradictory requests detected before any network call.
#[derive(Debug, Clone)]
pub enum UsageError {
    /// An experimental or v3 endpoint was used without `--oauth`.
    BearerRequired { endpoint: String },

    /// A bearer request had no scope to authenticate under.
    NoActiveScope { endpoint: String },

    /// The endpoint name is not in the registry.
    UnknownEndpoint { name: String },

    /// The payload given on the command line is unusable.
    InvalidPayload { message: String },
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageError::BearerRequired { endpoint } => write!(
                f,
                "--oauth is required with experimental or v3 API endpoints ({})",
                endpoint
            ),
            UsageError::NoActiveScope { endpoint } => write!(
                f,
                "{} inherits its scope from a previous call, but no scope is active",
                endpoint
            ),
            UsageError::UnknownEndpoint { name } => write!(f, "Unknown endpoint '{}'", name),
            UsageError::InvalidPayload { message } => write!(f, "Invalid payload: {}", message),
        }
    }
}

impl std::error::Error for UsageError {}

impl ConfigError {
    /// Always [`ErrorCategory::Configuration`].
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

impl UsageError {
    /// Always [`ErrorCategory::Usage`].
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::Usage
    }
}
