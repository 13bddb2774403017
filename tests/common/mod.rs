//! Common test utilities for integration tests.
//!
//! Fixtures build a configuration rooted in a temporary directory so token
//! stores never touch the real home directory.
//!
//! # Example
//!
//! ```ignore
//! let dir = tempfile::TempDir::new().unwrap();
//! let mock = MockHttpClient::new();
//! let mut dispatcher = dispatcher(test_config(&dir), AuthScheme::Bearer, &mock);
//! ```

use std::sync::Arc;

use ocarina::adapters::{MockHttpClient, MockResponse, ScriptedPrompt};
use ocarina::auth::{CredentialStore, TokenRecord};
use ocarina::config::Config;
use ocarina::dispatch::{AuthScheme, ClientContext, Dispatcher};
use serde_json::{json, Value};
use tempfile::TempDir;

pub const DOMAIN: &str = "https://majora.test/";
pub const TOKEN_URL: &str = "https://majora.test/o/token/";
pub const API_PREFIX: &str = "https://majora.test/api/";

/// Configuration with a shared secret, client credentials and a token
/// store inside `dir`.
pub fn test_config(dir: &TempDir) -> Config {
    config_for(DOMAIN, dir)
}

/// Same as [`test_config`] for another service root, e.g. a mock server.
pub fn config_for(domain: &str, dir: &TempDir) -> Config {
    Config::new(domain)
        .with_user("test-user")
        .with_token("shared-secret-token")
        .with_tokens_file(dir.path().join("tokens.json"))
        .with_client("test-client-id", "test-client-secret")
        .with_quiet(true)
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn token_record(scope: &str, access: &str, refresh: Option<&str>, expires_at: i64) -> TokenRecord {
    TokenRecord {
        scope: scope.to_string(),
        access_token: access.to_string(),
        refresh_token: refresh.map(str::to_string),
        expires_at,
        ..Default::default()
    }
}

/// Store a token for `scope` in the configured token file.
pub fn store_token(config: &Config, record: &TokenRecord) {
    CredentialStore::new(config.tokens_file.clone())
        .save(record)
        .unwrap();
}

/// A non-interactive dispatcher that talks to `mock`.
pub fn dispatcher(config: Config, scheme: AuthScheme, mock: &MockHttpClient) -> Dispatcher {
    let ctx = ClientContext::new(config, scheme).with_interactive(false);
    Dispatcher::new(ctx, Arc::new(mock.clone()), Box::new(ScriptedPrompt::default()))
}

/// A token endpoint answer.
#[allow(dead_code)]
pub fn token_response(access: &str, refresh: &str, expires_in: i64) -> MockResponse {
    MockResponse::json(
        200,
        json!({
            "access_token": access,
            "refresh_token": refresh,
            "expires_in": expires_in,
            "token_type": "Bearer",
        }),
    )
}

/// A task status answer in `state`.
#[allow(dead_code)]
pub fn task_status(state: &str) -> MockResponse {
    MockResponse::json(200, task_body(state))
}

#[allow(dead_code)]
pub fn task_body(state: &str) -> Value {
    json!({
        "errors": 0,
        "warnings": 0,
        "task": {"id": "task-1", "state": state},
    })
}
