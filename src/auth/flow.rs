//! Interactive authorization-code grant.
//!
//! The operator opens the authorization URL in a browser, approves the
//! request and pastes the callback URL the browser lands on back into the
//! terminal.

use reqwest::Url;

use super::oauth_api::OAuthClient;
use crate::error::AuthError;
use crate::traits::Prompt;

/// Number of times the operator may paste a callback URL.
pub const MAX_PROMPT_ATTEMPTS: u32 = 3;

/// An authorization URL and the `state` it was issued with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

/// Build the authorization URL for exactly `scope`.
pub fn authorization_request(api: &OAuthClient, scope: &str) -> AuthorizationRequest {
    let state = uuid::Uuid::new_v4().simple().to_string();
    let redirect_uri = api.redirect_uri();
    let query = super::oauth_api::form_encode(&[
        ("response_type", "code"),
        ("client_id", api.client_id()),
        ("redirect_uri", redirect_uri.as_str()),
        ("scope", scope),
        ("state", state.as_str()),
        ("approval_prompt", "auto"),
    ]);

    AuthorizationRequest {
        url: format!("{}?{}", api.authorize_url(), query),
        state,
    }
}

/// Ask for the callback URL until one under `domain` is given.
pub fn prompt_for_callback(
    prompt: &mut dyn Prompt,
    domain: &str,
    authorization_url: &str,
) -> Result<String, AuthError> {
    prompt.show_authorization_url(authorization_url);

    for attempt in 1..=MAX_PROMPT_ATTEMPTS {
        let callback = prompt
            .read_callback()
            .map_err(|e| AuthError::PromptFailed {
                message: e.to_string(),
            })?;

        if callback.starts_with(domain) {
            return Ok(callback);
        }

        tracing::debug!(attempt, "callback URL rejected");
        prompt.reject(&format!(
            "Sorry, your callback URL must start with {}\nPlease try again.",
            domain
        ));
    }

    Err(AuthError::PromptExhausted {
        attempts: MAX_PROMPT_ATTEMPTS,
    })
}

/// Extract the authorization code from a callback URL issued for `state`.
pub fn parse_callback(callback: &str, state: &str) -> Result<String, AuthError> {
    let url = Url::parse(callback).map_err(|_| AuthError::MissingCode {
        callback: callback.to_string(),
    })?;

    let mut code = None;
    let mut returned_state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => returned_state = Some(value.into_owned()),
            _ => {}
        }
    }

    if returned_state.as_deref() != Some(state) {
        return Err(AuthError::StateMismatch);
    }

    code.filter(|c| !c.is_empty())
        .ok_or_else(|| AuthError::MissingCode {
            callback: callback.to_string(),
        })
}

/// Walk the operator through approving `scope` and return the code.
///
/// The token exchange is left to the caller so no prompt is held across it.
pub fn read_authorization_code(
    api: &OAuthClient,
    prompt: &mut dyn Prompt,
    scope: &str,
) -> Result<String, AuthError> {
    let request = authorization_request(api, scope);
    let callback = prompt_for_callback(prompt, api.domain(), &request.url)?;
    parse_callback(&callback, &request.state)
}
