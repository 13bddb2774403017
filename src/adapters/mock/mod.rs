//! Test doubles for the trait seams in `crate::traits`.
//!
//! - [`MockHttpClient`] - configurable responses with request recording
//! - [`ScriptedPrompt`] - replays callback URLs for the authorization grant

pub mod http;
pub mod prompt;

pub use http::{MockHttpClient, MockResponse, RecordedRequest};
pub use prompt::ScriptedPrompt;
