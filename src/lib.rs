//! Ocarina - a command-line client for the Majora metadata service
//!
//! This library exposes modules for use in integration tests.

pub mod adapters;
pub mod auth;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod endpoints;
pub mod error;
pub mod hashing;
pub mod storage;
pub mod task;
pub mod traits;

pub use cli::version::{user_agent, VERSION};
