//! Per-scope bearer sessions.
//!
//! A scope moves through `NoToken -> Valid -> Expired -> Refreshing|Granting
//! -> Valid`. [`SessionManager::acquire`] walks that lifecycle for one scope,
//! persisting every new token before handing the session out.

use std::fmt;
use std::sync::{Arc, Mutex};

use super::credentials::{CredentialStore, TokenRecord};
use super::flow;
use super::oauth_api::OAuthClient;
use crate::config::Config;
use crate::error::{AuthError, ClientError, ClientResult};
use crate::traits::{HttpClient, Prompt};

/// A usable bearer credential for one scope.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerSession {
    pub scope: String,
    pub access_token: String,
    pub expires_at: i64,
    /// The service may be asked to refresh this session if it rejects the
    /// access token.
    pub self_refresh: bool,
}

impl BearerSession {
    fn from_record(record: &TokenRecord) -> Self {
        Self {
            scope: record.scope.clone(),
            access_token: record.access_token.clone(),
            expires_at: record.expires_at,
            self_refresh: record.refresh_token.is_some(),
        }
    }

    /// Value of the `Authorization` header.
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for BearerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerSession")
            .field("scope", &self.scope)
            .field("access_token", &"*".repeat(self.access_token.len()))
            .field("expires_at", &self.expires_at)
            .field("self_refresh", &self.self_refresh)
            .finish()
    }
}

/// Result of refreshing one stored scope.
#[derive(Debug)]
pub struct RefreshOutcome {
    pub scope: String,
    pub result: ClientResult<i64>,
}

/// Obtains, refreshes and persists bearer sessions.
pub struct SessionManager {
    api: OAuthClient,
    store: CredentialStore,
    has_client: bool,
    prompt: Mutex<Box<dyn Prompt + Send>>,
}

impl SessionManager {
    /// Create a manager for the provider and token store in `config`.
    pub fn new(config: &Config, http: Arc<dyn HttpClient>, prompt: Box<dyn Prompt + Send>) -> Self {
        Self {
            api: OAuthClient::new(config, http),
            store: CredentialStore::new(config.tokens_file.clone()),
            has_client: config.has_client_credentials(),
            prompt: Mutex::new(prompt),
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Get a session for exactly `scope`.
    ///
    /// - no record: grant interactively, or return `None` when not `interactive`
    /// - valid record and no `force_refresh`: reuse it without any exchange
    /// - expired record or `force_refresh`: refresh and persist; a failed
    ///   refresh falls back to a grant when `interactive`, else `None`
    pub async fn acquire(
        &self,
        scope: &str,
        force_refresh: bool,
        interactive: bool,
    ) -> ClientResult<Option<BearerSession>> {
        let now = chrono::Utc::now().timestamp();

        let record = match self.store.get(scope)? {
            None => {
                tracing::debug!(scope, "no stored token");
                return self.grant_if(interactive, scope).await;
            }
            Some(record) => record,
        };

        if !force_refresh && !record.is_expired_at(now) {
            tracing::debug!(scope, expires_at = record.expires_at, "reusing stored token");
            return Ok(Some(BearerSession::from_record(&record)));
        }

        self.require_client()?;
        match self.refresh_record(record, now).await {
            Ok(session) => Ok(Some(session)),
            Err(err) => {
                tracing::warn!(scope, error = %err, "token refresh failed");
                self.grant_if(interactive, scope).await
            }
        }
    }

    /// Force a fresh interactive grant for `scope`.
    pub async fn authorise(&self, scope: &str) -> ClientResult<BearerSession> {
        self.grant(scope).await
    }

    /// Refresh every scope in the store, non-interactively.
    pub async fn refresh_all(&self) -> ClientResult<Vec<RefreshOutcome>> {
        let now = chrono::Utc::now().timestamp();
        let records = self.store.load()?;

        let mut outcomes = Vec::with_capacity(records.len());
        for (scope, record) in records {
            let result = self
                .refresh_record(record, now)
                .await
                .map(|session| session.expires_at);
            if let Err(err) = &result {
                tracing::warn!(scope = %scope, error = %err, "token refresh failed");
            }
            outcomes.push(RefreshOutcome { scope, result });
        }
        Ok(outcomes)
    }

    async fn refresh_record(&self, record: TokenRecord, now: i64) -> ClientResult<BearerSession> {
        self.require_client()?;
        let refresh_token = record.refresh_token.clone().ok_or_else(|| AuthError::NoRefreshToken {
            scope: record.scope.clone(),
        })?;

        tracing::debug!(scope = %record.scope, "refreshing token");
        let response = self.api.refresh(&refresh_token).await?;
        let updated = response.into_record(&record.scope, now, Some(refresh_token));
        self.store.save(&updated)?;

        Ok(BearerSession::from_record(&updated))
    }

    async fn grant_if(&self, interactive: bool, scope: &str) -> ClientResult<Option<BearerSession>> {
        if interactive {
            self.grant(scope).await.map(Some)
        } else {
            Ok(None)
        }
    }

    async fn grant(&self, scope: &str) -> ClientResult<BearerSession> {
        self.require_client()?;

        let code = {
            let mut prompt = self.prompt.lock().map_err(|_| AuthError::PromptFailed {
                message: "prompt unavailable".to_string(),
            })?;
            flow::read_authorization_code(&self.api, prompt.as_mut(), scope)?
        };

        let now = chrono::Utc::now().timestamp();
        let response = self.api.exchange_code(&code).await?;
        let record = response.into_record(scope, now, None);
        self.store.save(&record)?;

        tracing::info!(scope, expires_at = record.expires_at, "authorised new token");
        Ok(BearerSession::from_record(&record))
    }

    fn require_client(&self) -> Result<(), ClientError> {
        if self.has_client {
            Ok(())
        } else {
            Err(AuthError::MissingClientCredentials.into())
        }
    }
}
