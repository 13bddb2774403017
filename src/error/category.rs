//! Error category classification and the process exit-status taxonomy.
//!
//! Every fatal error the client can raise belongs to exactly one category,
//! and every category maps to exactly one BSD `sysexits` status. Automation
//! wrapping the CLI keys off these codes, so they must stay stable.

use std::fmt;

/// Generic failure (`EX_GENERAL`).
pub const EX_GENERAL: i32 = 1;
/// Command line usage error (`EX_USAGE`).
pub const EX_USAGE: i32 = 64;
/// Data format error (`EX_DATAERR`).
pub const EX_DATAERR: i32 = 65;
/// Service unavailable (`EX_UNAVAILABLE`).
pub const EX_UNAVAILABLE: i32 = 69;
/// Internal software error (`EX_SOFTWARE`).
pub const EX_SOFTWARE: i32 = 70;
/// Input/output error (`EX_IOERR`).
pub const EX_IOERR: i32 = 74;
/// Temporary failure, the operator may retry (`EX_TEMPFAIL`).
pub const EX_TEMPFAIL: i32 = 75;
/// Permission denied (`EX_NOPERM`).
pub const EX_NOPERM: i32 = 77;
/// Configuration error (`EX_CONFIG`).
pub const EX_CONFIG: i32 = 78;

/// High-level categorization of errors for exit handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The service accepted the request but reported errors, and the
    /// caller asked for those to be fatal.
    General,

    /// Contradictory or misplaced flags, or a scheme mismatch detected
    /// before any network call.
    Usage,

    /// A job did not reach a terminal state within the polling budget.
    Timeout,

    /// The service failed (HTTP 500, undecodable body, failed task).
    Unavailable,

    /// Unexpected responses or states, most likely a client/server mismatch.
    Software,

    /// A local file could not be read.
    Io,

    /// A transient condition (rate limiting, no usable session).
    TempFail,

    /// The service refused the request (HTTP 400/403).
    Permission,

    /// Missing or invalid configuration.
    Configuration,
}

impl ErrorCategory {
    /// The process exit status for this category.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorCategory::General => EX_GENERAL,
            ErrorCategory::Usage => EX_USAGE,
            ErrorCategory::Timeout => EX_DATAERR,
            ErrorCategory::Unavailable => EX_UNAVAILABLE,
            ErrorCategory::Software => EX_SOFTWARE,
            ErrorCategory::Io => EX_IOERR,
            ErrorCategory::TempFail => EX_TEMPFAIL,
            ErrorCategory::Permission => EX_NOPERM,
            ErrorCategory::Configuration => EX_CONFIG,
        }
    }

    /// Returns a short label for the category suitable for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::General => "general",
            ErrorCategory::Usage => "usage",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Unavailable => "unavailable",
            ErrorCategory::Software => "software",
            ErrorCategory::Io => "io",
            ErrorCategory::TempFail => "tempfail",
            ErrorCategory::Permission => "permission",
            ErrorCategory::Configuration => "configuration",
        }
    }

    /// Returns suggested recovery actions for this category.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCategory::General => "Inspect the errors reported in the response",
            ErrorCategory::Usage => "Check the command line flags",
            ErrorCategory::Timeout => "The task is still running; poll it again later",
            ErrorCategory::Unavailable => "The service may be down. Please try again later",
            ErrorCategory::Software => "This may be a bug. Please report it if it persists",
            ErrorCategory::Io => "Check that the file exists and is readable",
            ErrorCategory::TempFail => {
                "Try again later, or refresh all tokens with `ocarina oauth refresh`"
            }
            ErrorCategory::Permission => "Check your credentials and the request contents",
            ErrorCategory::Configuration => "Check your configuration settings",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_follow_sysexits() {
        assert_eq!(ErrorCategory::General.exit_code(), 1);
        assert_eq!(ErrorCategory::Usage.exit_code(), 64);
        assert_eq!(ErrorCategory::Timeout.exit_code(), 65);
        assert_eq!(ErrorCategory::Unavailable.exit_code(), 69);
        assert_eq!(ErrorCategory::Software.exit_code(), 70);
        assert_eq!(ErrorCategory::Io.exit_code(), 74);
        assert_eq!(ErrorCategory::TempFail.exit_code(), 75);
        assert_eq!(ErrorCategory::Permission.exit_code(), 77);
        assert_eq!(ErrorCategory::Configuration.exit_code(), 78);
    }

    #[test]
    fn test_category_as_str() {
        assert_eq!(ErrorCategory::TempFail.as_str(), "tempfail");
        assert_eq!(format!("{}", ErrorCategory::Configuration), "configuration");
    }

    #[test]
    fn test_tempfail_hint_mentions_refresh() {
        assert!(ErrorCategory::TempFail
            .recovery_hint()
            .contains("ocarina oauth refresh"));
    }

    #[test]
    fn test_category_hash() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(ErrorCategory::Usage);
        set.insert(ErrorCategory::Permission);
        set.insert(ErrorCategory::Usage);

        assert_eq!(set.len(), 2);
    }
}
