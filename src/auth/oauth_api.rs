//! Client for the identity provider's OAuth2 endpoints.
//!
//! The service hosts its own provider under `{domain}o/`. This module
//! builds the authorization URL and performs the two token exchanges
//! (authorization code and refresh token) over an [`HttpClient`].

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};

use super::credentials::{scope_string, TokenRecord};
use crate::config::Config;
use crate::error::{classify_http_error, AuthError, ClientResult};
use crate::traits::{Headers, HttpClient};

/// Lifetime assumed when the token endpoint gives no expiry at all.
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Response from the token endpoint (grant and refresh).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<f64>,
    /// Scope the provider actually granted
    #[serde(default, deserialize_with = "scope_string")]
    pub scope: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenResponse {
    /// Absolute expiry: `expires_at` if given, else `now + expires_in`,
    /// else an hour from `now`.
    pub fn expires_at_from(&self, now: i64) -> i64 {
        match (self.expires_at, self.expires_in) {
            (Some(at), _) => at as i64,
            (None, Some(secs)) => now + secs,
            (None, None) => now + DEFAULT_TOKEN_LIFETIME_SECS,
        }
    }

    /// Build the record stored for `scope`. A response without a refresh
    /// token keeps `previous_refresh`.
    pub fn into_record(self, scope: &str, now: i64, previous_refresh: Option<String>) -> TokenRecord {
        let expires_at = self.expires_at_from(now);

        if !self.scope.is_empty() && self.scope != scope {
            tracing::debug!(requested = scope, granted = %self.scope, "provider granted a different scope string");
        }

        let mut raw_fields = self.extra;
        if let Some(secs) = self.expires_in {
            raw_fields.insert("expires_in".to_string(), Value::from(secs));
        }

        TokenRecord {
            scope: scope.to_string(),
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at,
            raw_fields,
        }
    }
}

/// Error payload of a rejected exchange (RFC 6749 section 5.2).
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Client for the provider's OAuth2 endpoints.
#[derive(Clone)]
pub struct OAuthClient {
    domain: String,
    client_id: String,
    client_secret: String,
    http: Arc<dyn HttpClient>,
}

impl OAuthClient {
    /// Create a client for the provider configured in `config`.
    pub fn new(config: &Config, http: Arc<dyn HttpClient>) -> Self {
        Self {
            domain: config.domain.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            http,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn authorize_url(&self) -> String {
        format!("{}o/authorize/", self.domain)
    }

    pub fn token_url(&self) -> String {
        format!("{}o/token/", self.domain)
    }

    pub fn redirect_uri(&self) -> String {
        format!("{}o/callback/", self.domain)
    }

    /// Exchange an authorization code for a token.
    pub async fn exchange_code(&self, code: &str) -> ClientResult<TokenResponse> {
        let redirect_uri = self.redirect_uri();
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
        ])
        .await
    }

    /// Exchange a refresh token for a new token.
    pub async fn refresh(&self, refresh_token: &str) -> ClientResult<TokenResponse> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> ClientResult<TokenResponse> {
        let url = self.token_url();

        let mut pairs = params.to_vec();
        pairs.push(("client_id", self.client_id.as_str()));
        pairs.push(("client_secret", self.client_secret.as_str()));
        let body = form_encode(&pairs);

        let mut headers = Headers::new();
        headers.insert(
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );
        headers.insert("Accept".to_string(), "application/json".to_string());
        headers.insert("User-Agent".to_string(), crate::user_agent());

        tracing::debug!(url = %url, grant_type = params[0].1, "token exchange");

        let response = self
            .http
            .post(&url, &body, &headers)
            .await
            .map_err(|e| classify_http_error(e, &url))?;

        if !response.is_success() {
            let message = match response.json::<ErrorResponse>() {
                Ok(err) => match err.error_description {
                    Some(description) => format!("{}: {}", err.error, description),
                    None => err.error,
                },
                Err(_) => response.text_lossy(),
            };
            return Err(AuthError::TokenEndpoint {
                status: response.status,
                message,
            }
            .into());
        }

        response.json::<TokenResponse>().map_err(|e| {
            AuthError::InvalidTokenResponse {
                message: e.to_string(),
            }
            .into()
        })
    }
}

/// Encode `pairs` as `application/x-www-form-urlencoded`.
pub fn form_encode(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}
