//! Trait abstractions for dependency injection and testability.
//!
//! # Traits
//!
//! - [`HttpClient`] - HTTP client operations (GET, POST)
//! - [`Prompt`] - operator interaction during the authorization grant

pub mod http;
pub mod prompt;

pub use http::{Headers, HttpClient, HttpError, Response};
pub use prompt::Prompt;
