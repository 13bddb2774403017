//! Bearer authentication.
//!
//! This module provides:
//! - Token storage keyed by exact scope string
//! - A client for the identity provider's token endpoint
//! - The interactive authorization-code grant
//! - Per-scope session lifecycle (reuse, refresh, grant)

pub mod credentials;
pub mod flow;
pub mod oauth_api;
pub mod session;

pub use credentials::{CredentialStore, TokenRecord};
pub use oauth_api::{OAuthClient, TokenResponse};
pub use session::{BearerSession, RefreshOutcome, SessionManager};
