//! Error handling for the client.
//!
//! This module provides:
//!
//! - **Error Categories**: one per process exit status
//! - **Domain-specific Errors**: Config, Usage, Network, Auth and Task errors
//! - **Unified Error Type**: `ClientError` consolidates all error types
//! - **Result Type Alias**: `ClientResult<T>` for consistent return types
//!
//! # Exit statuses
//!
//! | Category | Exit | Typical cause |
//! |----------|------|---------------|
//! | General | 1 | `errors > 0` in angry mode |
//! | Usage | 64 | bearer endpoint without `--oauth` |
//! | Timeout | 65 | task still pending after the last attempt |
//! | Unavailable | 69 | HTTP 500, undecodable body, failed task |
//! | Software | 70 | unexpected status or task state |
//! | Io | 74 | unreadable file while hashing |
//! | TempFail | 75 | HTTP 429/503, no session |
//! | Permission | 77 | HTTP 400/403 |
//! | Configuration | 78 | missing or malformed config |

mod auth;
mod category;
mod client_error;
mod config;
mod network;
mod task;

pub use auth::AuthError;
pub use category::{
    ErrorCategory, EX_CONFIG, EX_DATAERR, EX_GENERAL, EX_IOERR, EX_NOPERM, EX_SOFTWARE,
    EX_TEMPFAIL, EX_UNAVAILABLE, EX_USAGE,
};
pub use client_error::ClientError;
pub use config::{ConfigError, UsageError};
pub use network::{classify_http_error, NetworkError};
pub use task::TaskError;

/// Type alias for Results using ClientError.
pub type ClientResult<T> = Result<T, ClientError>;
