//! Concrete implementations of trait abstractions.
//!
//! # Adapters
//!
//! - [`ReqwestHttpClient`] - HTTP client using reqwest
//! - [`TerminalPrompt`] - stdin/stdout operator prompt
//!
//! The [`mock`] submodule provides test doubles for both.

pub mod mock;
pub mod reqwest_http;
pub mod terminal_prompt;

pub use mock::{MockHttpClient, MockResponse, ScriptedPrompt};
pub use reqwest_http::ReqwestHttpClient;
pub use terminal_prompt::TerminalPrompt;
