//! Integration tests for the bearer session lifecycle.
//!
//! These tests verify:
//! 1. An expired token triggers exactly one refresh
//! 2. The refreshed token is persisted before the API call goes out
//! 3. A 401 from the service triggers one forced refresh and one re-send
//! 4. Non-interactive mode never prompts
//! 5. The manual refresh flow covers every stored scope

mod common;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::*;
use ocarina::adapters::{MockHttpClient, MockResponse, ScriptedPrompt};
use ocarina::auth::{CredentialStore, SessionManager};
use ocarina::dispatch::{AuthScheme, ClientContext, Dispatcher, Payload};
use ocarina::endpoints;
use ocarina::error::{EX_CONFIG, EX_TEMPFAIL};
use ocarina::traits::{Headers, HttpClient, HttpError, Response};
use serde_json::json;
use tempfile::TempDir;

const SCOPE: &str = "majora2.view_biosampleartifact";
const ENDPOINT: &str = "api.v3.artifact.biosample.get";

/// Records the access token on disk at the moment each API call is made.
#[derive(Clone)]
struct StoreSnapshotClient {
    inner: MockHttpClient,
    store: PathBuf,
    seen_on_disk: Arc<Mutex<Vec<Option<String>>>>,
}

impl StoreSnapshotClient {
    fn snapshot(&self, url: &str) {
        if url.starts_with(API_PREFIX) {
            let token = CredentialStore::new(self.store.clone())
                .get(SCOPE)
                .ok()
                .flatten()
                .map(|record| record.access_token);
            self.seen_on_disk.lock().unwrap().push(token);
        }
    }
}

#[async_trait]
impl HttpClient for StoreSnapshotClient {
    async fn get(&self, url: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.snapshot(url);
        self.inner.get(url, headers).await
    }

    async fn post(&self, url: &str, body: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.snapshot(url);
        self.inner.post(url, body, headers).await
    }
}

#[tokio::test]
async fn test_expired_token_refreshes_once_and_persists_first() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    store_token(&config, &token_record(SCOPE, "stale", Some("refresh-1"), now() - 60));

    let mock = MockHttpClient::new();
    mock.set_response(TOKEN_URL, token_response("fresh", "refresh-2", 3600));
    mock.set_response(API_PREFIX, MockResponse::json(200, json!({"errors": 0})));
    let client = StoreSnapshotClient {
        inner: mock.clone(),
        store: config.tokens_file.clone(),
        seen_on_disk: Arc::default(),
    };

    let ctx = ClientContext::new(config.clone(), AuthScheme::Bearer).with_interactive(false);
    let mut dispatcher = Dispatcher::new(ctx, Arc::new(client.clone()), Box::new(ScriptedPrompt::default()));

    let before = now();
    dispatcher
        .emit(endpoints::lookup(ENDPOINT).unwrap(), Payload::new())
        .await
        .unwrap();

    let requests = mock.get_requests();
    assert_eq!(mock.request_count(TOKEN_URL), 1, "exactly one refresh");
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].url, TOKEN_URL);
    assert!(requests[1].url.starts_with(API_PREFIX));
    assert_eq!(
        requests[1].headers.get("Authorization").map(String::as_str),
        Some("Bearer fresh")
    );

    let refresh_body = requests[0].body.clone().unwrap();
    assert!(refresh_body.contains("grant_type=refresh_token"));
    assert!(refresh_body.contains("refresh_token=refresh-1"));
    assert!(refresh_body.contains("client_id=test-client-id"));
    assert!(refresh_body.contains("client_secret=test-client-secret"));

    assert_eq!(*client.seen_on_disk.lock().unwrap(), vec![Some("fresh".to_string())]);

    let stored = CredentialStore::new(config.tokens_file.clone())
        .get(SCOPE)
        .unwrap()
        .unwrap();
    assert_eq!(stored.access_token, "fresh");
    assert_eq!(stored.refresh_token.as_deref(), Some("refresh-2"));
    assert!(stored.expires_at >= before + 3600);
}

#[tokio::test]
async fn test_valid_token_is_reused_without_exchange() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    store_token(&config, &token_record(SCOPE, "valid", Some("refresh-1"), now() + 600));

    let mock = MockHttpClient::new();
    mock.set_response(API_PREFIX, MockResponse::json(200, json!({"errors": 0})));
    let mut dispatcher = dispatcher(config, AuthScheme::Bearer, &mock);

    for _ in 0..3 {
        dispatcher
            .emit(endpoints::lookup(ENDPOINT).unwrap(), Payload::new())
            .await
            .unwrap();
    }

    assert_eq!(mock.request_count(TOKEN_URL), 0);
    assert_eq!(mock.request_count(API_PREFIX), 3);
}

#[tokio::test]
async fn test_unauthorized_triggers_single_self_refresh() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    store_token(&config, &token_record(SCOPE, "revoked", Some("refresh-1"), now() + 600));

    let mock = MockHttpClient::new();
    mock.queue_responses(
        API_PREFIX,
        [MockResponse::json(401, json!({"detail": "invalid token"}))],
    );
    mock.set_response(API_PREFIX, MockResponse::json(200, json!({"errors": 0, "ok": true})));
    mock.set_response(TOKEN_URL, token_response("renewed", "refresh-2", 3600));
    let mut dispatcher = dispatcher(config, AuthScheme::Bearer, &mock);

    let response = dispatcher
        .emit(endpoints::lookup(ENDPOINT).unwrap(), Payload::new())
        .await
        .unwrap();
    assert_eq!(response["ok"], true);

    let urls: Vec<String> = mock.get_requests().into_iter().map(|r| r.url).collect();
    assert_eq!(urls.len(), 3);
    assert!(urls[0].starts_with(API_PREFIX));
    assert_eq!(urls[1], TOKEN_URL);
    assert!(urls[2].starts_with(API_PREFIX));

    let resent = &mock.get_requests()[2];
    assert_eq!(
        resent.headers.get("Authorization").map(String::as_str),
        Some("Bearer renewed")
    );
}

#[tokio::test]
async fn test_repeated_unauthorized_is_not_retried_again() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    store_token(&config, &token_record(SCOPE, "revoked", Some("refresh-1"), now() + 600));

    let mock = MockHttpClient::new();
    mock.set_response(API_PREFIX, MockResponse::json(401, json!({"detail": "invalid token"})));
    mock.set_response(TOKEN_URL, token_response("renewed", "refresh-2", 3600));
    let mut dispatcher = dispatcher(config, AuthScheme::Bearer, &mock);

    let err = dispatcher
        .emit(endpoints::lookup(ENDPOINT).unwrap(), Payload::new())
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 70);
    assert_eq!(mock.request_count(API_PREFIX), 2);
    assert_eq!(mock.request_count(TOKEN_URL), 1);
}

#[tokio::test]
async fn test_failed_refresh_without_interaction_is_tempfail() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    store_token(&config, &token_record(SCOPE, "stale", Some("refresh-1"), now() - 60));

    let mock = MockHttpClient::new();
    mock.set_response(TOKEN_URL, MockResponse::json(400, json!({"error": "invalid_grant"})));
    let mut dispatcher = dispatcher(config, AuthScheme::Bearer, &mock);

    let err = dispatcher
        .emit(endpoints::lookup(ENDPOINT).unwrap(), Payload::new())
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), EX_TEMPFAIL);
    assert_eq!(mock.request_count(API_PREFIX), 0);
}

#[tokio::test]
async fn test_refresh_without_client_credentials_is_config_error() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir).with_client("", "");
    store_token(&config, &token_record(SCOPE, "stale", Some("refresh-1"), now() - 60));

    let mock = MockHttpClient::new();
    let mut dispatcher = dispatcher(config, AuthScheme::Bearer, &mock);

    let err = dispatcher
        .emit(endpoints::lookup(ENDPOINT).unwrap(), Payload::new())
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), EX_CONFIG);
    assert!(mock.get_requests().is_empty());
}

#[tokio::test]
async fn test_interactive_grant_when_no_token() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);

    let mock = MockHttpClient::new();
    mock.set_response(TOKEN_URL, token_response("granted", "refresh-1", 3600));
    mock.set_response(API_PREFIX, MockResponse::json(200, json!({"errors": 0})));

    // The prompt cannot know the random state, so the grant must fail
    // after the code is read and no API call may follow.
    let prompt = ScriptedPrompt::new(["https://majora.test/o/callback/?code=c&state=wrong"]);
    let ctx = ClientContext::new(config, AuthScheme::Bearer).with_interactive(true);
    let mut dispatcher = Dispatcher::new(ctx, Arc::new(mock.clone()), Box::new(prompt));

    let err = dispatcher
        .emit(endpoints::lookup(ENDPOINT).unwrap(), Payload::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ocarina::error::ClientError::Auth(_)));
    assert!(mock.get_requests().is_empty());
}

#[tokio::test]
async fn test_interactive_grant_persists_before_first_call() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);

    let mock = MockHttpClient::new();
    mock.set_response(TOKEN_URL, token_response("granted", "refresh-1", 3600));
    mock.set_response(API_PREFIX, MockResponse::json(200, json!({"errors": 0})));
    let client = StoreSnapshotClient {
        inner: mock.clone(),
        store: config.tokens_file.clone(),
        seen_on_disk: Arc::default(),
    };

    let ctx = ClientContext::new(config.clone(), AuthScheme::Bearer).with_interactive(true);
    let prompt = ScriptedPrompt::approving("auth-code");
    let mut dispatcher = Dispatcher::new(ctx, Arc::new(client.clone()), Box::new(prompt));

    dispatcher
        .emit(endpoints::lookup(ENDPOINT).unwrap(), Payload::new())
        .await
        .unwrap();

    let requests = mock.get_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].url, TOKEN_URL);
    assert!(requests[0].body.as_deref().unwrap().contains("code=auth-code"));
    assert_eq!(
        requests[1].headers.get("Authorization").map(String::as_str),
        Some("Bearer granted")
    );
    assert_eq!(*client.seen_on_disk.lock().unwrap(), vec![Some("granted".to_string())]);
}

#[tokio::test]
async fn test_refresh_all_covers_every_scope() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    store_token(&config, &token_record("scope.a", "a", Some("refresh-a"), now() + 600));
    store_token(&config, &token_record("scope.b", "b", Some("refresh-b"), now() - 600));
    store_token(&config, &token_record("scope.c", "c", None, now() + 600));

    let mock = MockHttpClient::new();
    mock.set_response(TOKEN_URL, token_response("renewed", "refresh-next", 3600));
    let sessions = SessionManager::new(&config, Arc::new(mock.clone()), Box::new(ScriptedPrompt::default()));

    let outcomes = sessions.refresh_all().await.unwrap();

    let scopes: Vec<&str> = outcomes.iter().map(|o| o.scope.as_str()).collect();
    assert_eq!(scopes, vec!["scope.a", "scope.b", "scope.c"]);
    assert!(outcomes[0].result.is_ok());
    assert!(outcomes[1].result.is_ok());
    assert!(outcomes[2].result.is_err(), "no refresh token to use");
    assert_eq!(mock.request_count(TOKEN_URL), 2);

    let store = sessions.store();
    assert_eq!(store.get("scope.a").unwrap().unwrap().access_token, "renewed");
    assert_eq!(store.get("scope.b").unwrap().unwrap().access_token, "renewed");
    assert_eq!(store.get("scope.c").unwrap().unwrap().access_token, "c");
}
