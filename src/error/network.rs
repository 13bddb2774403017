//! Transport and protocol error types.
//!
//! These errors represent failures talking to the service: the request
//! never completed, the service answered with a non-success status, or the
//! body could not be decoded.

use std::fmt;

use super::category::ErrorCategory;
use crate::traits::HttpError;

/// Network-specific error variants.
#[derive(Debug, Clone)]
pub enum NetworkError {
    /// Connection to the server failed.
    ConnectionFailed { url: String, message: String },

    /// The service answered with a non-success HTTP status.
    HttpStatus { status: u16, body: String },

    /// A success response whose body was not valid JSON.
    UndecodableBody { message: String },

    /// The request URL could not be built.
    InvalidUrl { url: String, message: String },

    /// Any other transport failure.
    Other { message: String },
}

impl NetworkError {
    /// Map the failure onto the exit taxonomy.
    ///
    /// 400/403 are permission failures, 500 is an outage, 429/503 are
    /// temporary. Every other status is treated as a client bug.
    pub fn category(&self) -> ErrorCategory {
        match self {
            NetworkError::HttpStatus { status, .. } => match *status {
                400 | 403 => ErrorCategory::Permission,
                500 => ErrorCategory::Unavailable,
                429 | 503 => ErrorCategory::TempFail,
                _ => ErrorCategory::Software,
            },
            NetworkError::UndecodableBody { .. } => ErrorCategory::Unavailable,
            NetworkError::ConnectionFailed { .. } => ErrorCategory::Unavailable,
            NetworkError::InvalidUrl { .. } => ErrorCategory::Configuration,
            NetworkError::Other { .. } => ErrorCategory::Unavailable,
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed { .. } => "E_NET_CONN",
            NetworkError::HttpStatus { .. } => "E_NET_HTTP",
            NetworkError::UndecodableBody { .. } => "E_NET_DECODE",
            NetworkError::InvalidUrl { .. } => "E_NET_URL",
            NetworkError::Other { .. } => "E_NET_OTHER",
        }
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::ConnectionFailed { url, message } => {
                write!(f, "Connection failed to '{}': {}", url, message)
            }
            NetworkError::HttpStatus { status, .. } => {
                write!(f, "Service returned HTTP {}", status)
            }
            NetworkError::UndecodableBody { message } => {
                write!(f, "Service response could not be decoded: {}", message)
            }
            NetworkError::InvalidUrl { url, message } => {
                write!(f, "Invalid URL '{}': {}", url, message)
            }
            NetworkError::Other { message } => write!(f, "Network error: {}", message),
        }
    }
}

impl std::error::Error for NetworkError {}

/// Classify a transport-level [`HttpError`] for the request to `url`.
pub fn classify_http_error(err: HttpError, url: &str) -> NetworkError {
    match err {
        HttpError::ConnectionFailed(message) | HttpError::Timeout(message) => {
            NetworkError::ConnectionFailed {
                url: url.to_string(),
                message,
            }
        }
        HttpError::InvalidUrl(message) => NetworkError::InvalidUrl {
            url: url.to_string(),
            message,
        },
        HttpError::Io(message) | HttpError::Other(message) => NetworkError::Other { message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> NetworkError {
        NetworkError::HttpStatus {
            status: code,
            body: String::new(),
        }
    }

    #[test]
    fn test_status_taxonomy() {
        assert_eq!(status(400).category(), ErrorCategory::Permission);
        assert_eq!(status(403).category(), ErrorCategory::Permission);
        assert_eq!(status(500).category(), ErrorCategory::Unavailable);
        assert_eq!(status(429).category(), ErrorCategory::TempFail);
        assert_eq!(status(503).category(), ErrorCategory::TempFail);
        assert_eq!(status(404).category(), ErrorCategory::Software);
        assert_eq!(status(502).category(), ErrorCategory::Software);
    }

    #[test]
    fn test_undecodable_body_is_unavailable() {
        let err = NetworkError::UndecodableBody {
            message: "expected value".to_string(),
        };
        assert_eq!(err.category().exit_code(), 69);
    }

    #[test]
    fn test_classify_connection_refused() {
        let err = classify_http_error(
            HttpError::ConnectionFailed("refused".to_string()),
            "https://example.org/api/",
        );
        assert!(matches!(err, NetworkError::ConnectionFailed { .. }));
        assert!(err.to_string().contains("https://example.org/api/"));
    }

    #[test]
    fn test_classify_timeout_is_unavailable() {
        let err = classify_http_error(HttpError::Timeout("30s".to_string()), "https://example.org/");
        assert_eq!(err.category(), ErrorCategory::Unavailable);
    }
}
