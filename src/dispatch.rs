//! Request dispatch.
//!
//! [`Dispatcher::emit`] turns a registry endpoint and a payload into one
//! HTTP exchange under either the shared-secret or the bearer scheme, and
//! maps the outcome onto the error taxonomy. It never retries, except for
//! the single forced refresh a bearer session performs when the service
//! rejects its access token.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::auth::{BearerSession, SessionManager};
use crate::config::Config;
use crate::endpoints::{EndpointDescriptor, HttpMethod};
use crate::error::{classify_http_error, AuthError, ClientError, ClientResult, NetworkError, UsageError};
use crate::traits::{Headers, HttpClient, Prompt, Response};

/// A request payload: field name to JSON value.
pub type Payload = Map<String, Value>;

/// Placeholder sent in the `token` field when the credential travels in
/// the `Authorization` header.
pub const BEARER_PLACEHOLDER: &str = "OAUTH";

pub const CLIENT_NAME: &str = "ocarina";

const BANNER_WIDTH: usize = 80;

/// How requests are authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `MAJORA_TOKEN` in the request body
    SharedSecret,
    /// A per-scope session in the `Authorization` header
    Bearer,
}

/// Per-invocation state shared by every call.
#[derive(Debug, Clone)]
pub struct ClientContext {
    pub config: Config,
    pub scheme: AuthScheme,
    /// Whether a missing session may be granted interactively
    pub interactive: bool,
    /// User to act on behalf of
    pub sudo_as: Option<String>,
    /// Suppress request/response echoes on success
    pub quiet: bool,
    /// Scope of the last scoped endpoint, inherited by task endpoints
    pub active_scope: Option<String>,
}

impl ClientContext {
    pub fn new(config: Config, scheme: AuthScheme) -> Self {
        Self {
            config,
            scheme,
            interactive: true,
            sudo_as: None,
            quiet: false,
            active_scope: None,
        }
    }

    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn with_sudo_as(mut self, user: Option<String>) -> Self {
        self.sudo_as = user;
        self
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Start with `scope` active, as if a scoped endpoint had been called.
    pub fn with_active_scope(mut self, scope: Option<String>) -> Self {
        self.active_scope = scope;
        self
    }
}

/// Fields that steer the transport and are never sent as payload.
#[derive(Debug, Default)]
struct Controls {
    params: Option<Map<String, Value>>,
    quiet: bool,
    angry: bool,
}

impl Controls {
    fn extract(payload: &mut Payload) -> Self {
        payload.remove("env");
        Self {
            params: payload.remove("params").and_then(|p| match p {
                Value::Object(map) => Some(map),
                _ => None,
            }),
            quiet: payload.remove("quiet").map(|v| truthy(&v)).unwrap_or(false),
            angry: payload.remove("angry").map(|v| truthy(&v)).unwrap_or(false),
        }
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Null => false,
        _ => true,
    }
}

/// A fully prepared request.
struct Prepared {
    method: HttpMethod,
    url: String,
    body: String,
    headers: Headers,
}

/// Resolves endpoints into HTTP exchanges.
pub struct Dispatcher {
    ctx: ClientContext,
    http: Arc<dyn HttpClient>,
    sessions: SessionManager,
}

impl Dispatcher {
    /// Create a dispatcher. `prompt` is used if a bearer grant is needed.
    pub fn new(ctx: ClientContext, http: Arc<dyn HttpClient>, prompt: Box<dyn Prompt + Send>) -> Self {
        let sessions = SessionManager::new(&ctx.config, http.clone(), prompt);
        Self { ctx, http, sessions }
    }

    pub fn context(&self) -> &ClientContext {
        &self.ctx
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Send `payload` to `endpoint` and return the decoded response.
    ///
    /// A success response with `errors > 0` is returned unchanged unless
    /// the payload set `angry`.
    pub async fn emit(&mut self, endpoint: &EndpointDescriptor, mut payload: Payload) -> ClientResult<Value> {
        let controls = Controls::extract(&mut payload);
        self.stamp(&mut payload);

        if let Some(scope) = endpoint.access.scope() {
            self.ctx.active_scope = Some(scope.to_string());
        }
        if endpoint.access.requires_bearer() && self.ctx.scheme != AuthScheme::Bearer {
            return Err(UsageError::BearerRequired {
                endpoint: endpoint.name.to_string(),
            }
            .into());
        }

        let quiet = controls.quiet || self.ctx.quiet || self.ctx.config.quiet;

        let (response, payload) = match self.ctx.scheme {
            AuthScheme::SharedSecret => {
                payload.insert("token".to_string(), Value::String(self.ctx.config.token.clone()));
                let prepared = self.prepare(endpoint, HttpMethod::Post, &payload, None, None)?;
                (self.send(&prepared).await?, payload)
            }
            AuthScheme::Bearer => {
                payload.insert("token".to_string(), Value::String(BEARER_PLACEHOLDER.to_string()));
                let response = self.emit_bearer(endpoint, &payload, controls.params.as_ref()).await?;
                (response, payload)
            }
        };

        let (outcome, echo) = conclude(endpoint.name, &payload, &response, quiet, controls.angry);
        if let Some(text) = echo {
            eprint!("{}", text);
        }
        outcome
    }

    async fn emit_bearer(
        &self,
        endpoint: &EndpointDescriptor,
        payload: &Payload,
        params: Option<&Map<String, Value>>,
    ) -> ClientResult<Response> {
        let scope = self.ctx.active_scope.clone().ok_or_else(|| UsageError::NoActiveScope {
            endpoint: endpoint.name.to_string(),
        })?;

        let session = self.session(&scope, false).await?;
        let prepared = self.prepare(endpoint, endpoint.method, payload, params, Some(&session))?;
        let response = self.send(&prepared).await?;

        if response.status != 401 || !session.self_refresh {
            return Ok(response);
        }

        tracing::info!(scope = %scope, "access token rejected, refreshing session");
        let session = self.session(&scope, true).await?;
        let prepared = self.prepare(endpoint, endpoint.method, payload, params, Some(&session))?;
        self.send(&prepared).await
    }

    async fn session(&self, scope: &str, force_refresh: bool) -> ClientResult<BearerSession> {
        self.sessions
            .acquire(scope, force_refresh, self.ctx.interactive)
            .await?
            .ok_or_else(|| {
                AuthError::NoSession {
                    scope: scope.to_string(),
                }
                .into()
            })
    }

    fn stamp(&self, payload: &mut Payload) {
        payload.insert("client_name".to_string(), Value::String(CLIENT_NAME.to_string()));
        payload.insert(
            "client_version".to_string(),
            Value::String(crate::VERSION.to_string()),
        );
        if let Some(user) = &self.ctx.sudo_as {
            payload.insert("sudo_as".to_string(), Value::String(user.clone()));
        }
        payload.insert("username".to_string(), Value::String(self.ctx.config.user.clone()));
    }

    fn prepare(
        &self,
        endpoint: &EndpointDescriptor,
        method: HttpMethod,
        payload: &Payload,
        params: Option<&Map<String, Value>>,
        session: Option<&BearerSession>,
    ) -> ClientResult<Prepared> {
        let mut url = endpoint.url(&self.ctx.config.domain);

        let mut headers = Headers::new();
        headers.insert("charset".to_string(), "UTF-8".to_string());
        headers.insert("User-Agent".to_string(), crate::user_agent());
        if let Some(session) = session {
            headers.insert("Authorization".to_string(), session.authorization());
        }

        let body = match method {
            HttpMethod::Post => {
                headers.insert("Content-Type".to_string(), "application/json".to_string());
                Value::Object(payload.clone()).to_string()
            }
            HttpMethod::Get => {
                if let Some(params) = params {
                    url = query_url(&url, params)?;
                }
                String::new()
            }
        };

        Ok(Prepared {
            method,
            url,
            body,
            headers,
        })
    }

    async fn send(&self, prepared: &Prepared) -> ClientResult<Response> {
        tracing::debug!(method = %prepared.method, url = %prepared.url, "sending request");

        let result = match prepared.method {
            HttpMethod::Post => {
                self.http
                    .post(&prepared.url, &prepared.body, &prepared.headers)
                    .await
            }
            HttpMethod::Get => self.http.get(&prepared.url, &prepared.headers).await,
        };

        let response = result.map_err(|e| classify_http_error(e, &prepared.url))?;
        tracing::debug!(status = response.status, bytes = response.body.len(), "received response");
        Ok(response)
    }
}

/// Append `params` to `url` as a query string.
fn query_url(url: &str, params: &Map<String, Value>) -> ClientResult<String> {
    let pairs = params.iter().map(|(k, v)| {
        let value = match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        (k.as_str(), value)
    });

    reqwest::Url::parse_with_params(url, pairs)
        .map(String::from)
        .map_err(|e| {
            NetworkError::InvalidUrl {
                url: url.to_string(),
                message: e.to_string(),
            }
            .into()
        })
}

/// Decide the result of a completed exchange and whether it must be echoed.
///
/// Quiet mode only hides the echo of a successful exchange; every failure
/// carries the request and response text.
fn conclude(
    endpoint: &str,
    payload: &Payload,
    response: &Response,
    quiet: bool,
    angry: bool,
) -> (ClientResult<Value>, Option<String>) {
    let outcome = decode_response(endpoint, response, angry);
    let echo = (outcome.is_err() || !quiet).then(|| format_exchange(payload, response));
    (outcome, echo)
}

fn decode_response(endpoint: &str, response: &Response, angry: bool) -> ClientResult<Value> {
    if !response.is_success() {
        return Err(NetworkError::HttpStatus {
            status: response.status,
            body: response.text_lossy(),
        }
        .into());
    }

    let decoded: Value = response.json().map_err(|e| NetworkError::UndecodableBody {
        message: e.to_string(),
    })?;

    let errors = decoded.get("errors").and_then(Value::as_u64).unwrap_or(0);
    if errors > 0 {
        tracing::info!(endpoint, errors, "service reported errors");
        if angry {
            return Err(ClientError::Application { errors });
        }
    }

    Ok(decoded)
}

/// Render the request (token masked) and the raw response for stderr.
pub fn format_exchange(payload: &Payload, response: &Response) -> String {
    let mut redacted = payload.clone();
    if let Some(Value::String(token)) = redacted.get("token") {
        let masked = "*".repeat(token.len());
        redacted.insert("token".to_string(), Value::String(masked));
    }
    let request = serde_json::to_string_pretty(&Value::Object(redacted)).unwrap_or_default();

    let body = match response.json::<Value>() {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_default(),
        Err(_) => response.text_lossy(),
    };

    let mut out = banner("Request");
    out.push_str(&request);
    out.push('\n');
    out.push_str(&banner("Response"));
    if !response.is_success() {
        out.push_str(&format!("STATUS CODE {}\n", response.status));
    }
    out.push_str(&body);
    out.push('\n');
    out
}

fn banner(label: &str) -> String {
    format!("{}{}\n", label, "=".repeat(BANNER_WIDTH - "Request ".len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MockHttpClient, MockResponse, ScriptedPrompt};
    use crate::endpoints;
    use bytes::Bytes;
    use serde_json::json;

    const DOMAIN: &str = "https://majora.test/";

    fn dispatcher(mock: &MockHttpClient, scheme: AuthScheme) -> Dispatcher {
        let config = Config::new(DOMAIN)
            .with_user("sam")
            .with_token("shared-secret")
            .with_tokens_file(std::env::temp_dir().join("ocarina-dispatch-unused"));
        let ctx = ClientContext::new(config, scheme)
            .with_quiet(true)
            .with_interactive(false);
        Dispatcher::new(ctx, Arc::new(mock.clone()), Box::new(ScriptedPrompt::default()))
    }

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_controls_are_stripped() {
        let mut p = payload(json!({
            "params": {"task_id": "t"},
            "quiet": true,
            "env": 1,
            "angry": true,
            "name": "x",
        }));
        let controls = Controls::extract(&mut p);

        assert!(controls.quiet);
        assert!(controls.angry);
        assert_eq!(controls.params.unwrap()["task_id"], "t");
        assert_eq!(p.keys().collect::<Vec<_>>(), vec!["name"]);
    }

    #[test]
    fn test_query_url() {
        let params = payload(json!({"task_id": "a b", "limit": 5}));
        let url = query_url("https://majora.test/api/v2/majora/task/get/", &params).unwrap();
        assert_eq!(
            url,
            "https://majora.test/api/v2/majora/task/get/?limit=5&task_id=a+b"
        );
    }

    #[test]
    fn test_format_exchange_masks_token() {
        let p = payload(json!({"token": "shared-secret", "username": "sam"}));
        let response = Response::new(403, Bytes::from("denied"));

        let text = format_exchange(&p, &response);

        assert!(text.starts_with(&format!("Request{}\n", "=".repeat(72))));
        assert!(text.contains("\"*************\""));
        assert!(!text.contains("shared-secret"));
        assert!(text.contains("STATUS CODE 403"));
        assert!(text.contains("denied"));
    }

    #[test]
    fn test_quiet_still_echoes_undecodable_body() {
        let p = payload(json!({"token": "shared-secret", "username": "sam"}));
        let response = Response::new(200, Bytes::from("<html>oops</html>"));

        let (outcome, echo) = conclude("api.artifact.biosample.get", &p, &response, true, false);

        assert!(matches!(
            outcome,
            Err(ClientError::Network(NetworkError::UndecodableBody { .. }))
        ));
        let echo = echo.unwrap();
        assert!(echo.starts_with("Request="));
        assert!(echo.contains("<html>oops</html>"));
        assert!(!echo.contains("shared-secret"));
    }

    #[test]
    fn test_quiet_still_echoes_angry_abort() {
        let p = payload(json!({"token": "shared-secret"}));
        let response = Response::new(200, Bytes::from(r#"{"errors": 2}"#));

        let (outcome, echo) = conclude("api.artifact.biosample.get", &p, &response, true, true);

        assert!(matches!(outcome, Err(ClientError::Application { errors: 2 })));
        let echo = echo.unwrap();
        assert!(echo.contains("Response="));
        assert!(echo.contains("\"errors\": 2"));
    }

    #[test]
    fn test_quiet_hides_only_successful_exchanges() {
        let p = payload(json!({"token": "shared-secret"}));
        let ok = Response::new(200, Bytes::from(r#"{"errors": 1}"#));

        let (outcome, echo) = conclude("api.artifact.biosample.get", &p, &ok, true, false);
        assert_eq!(outcome.unwrap()["errors"], 1);
        assert!(echo.is_none());

        let (_, echo) = conclude("api.artifact.biosample.get", &p, &ok, false, false);
        assert!(echo.is_some());

        let failed = Response::new(500, Bytes::from("boom"));
        let (outcome, echo) = conclude("api.artifact.biosample.get", &p, &failed, true, false);
        assert!(outcome.is_err());
        assert!(echo.unwrap().contains("STATUS CODE 500"));
    }

    #[tokio::test]
    async fn test_shared_secret_post() {
        let mock = MockHttpClient::new();
        mock.set_default_response(MockResponse::json(200, json!({"errors": 0, "updated": []})));
        let mut d = dispatcher(&mock, AuthScheme::SharedSecret);
        let endpoint = endpoints::lookup("api.artifact.biosample.add").unwrap();

        let response = d
            .emit(endpoint, payload(json!({"biosamples": [], "params": {"x": 1}})))
            .await
            .unwrap();

        assert_eq!(response["errors"], 0);
        let requests = mock.get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].url, "https://majora.test/api/v2/artifact/biosample/add/");
        assert_eq!(
            requests[0].headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(
            requests[0].headers.get("User-Agent").map(String::as_str),
            Some(crate::user_agent().as_str())
        );

        let body = requests[0].json_body().unwrap();
        assert_eq!(body["token"], "shared-secret");
        assert_eq!(body["username"], "sam");
        assert_eq!(body["client_name"], "ocarina");
        assert_eq!(body["client_version"], crate::VERSION);
        assert!(body.get("params").is_none());
        assert!(body.get("sudo_as").is_none());
    }

    #[tokio::test]
    async fn test_sudo_as_is_stamped() {
        let mock = MockHttpClient::new();
        mock.set_default_response(MockResponse::json(200, json!({"errors": 0})));
        let mut d = dispatcher(&mock, AuthScheme::SharedSecret);
        d.ctx.sudo_as = Some("other".to_string());

        d.emit(endpoints::lookup("api.pag.accession.add").unwrap(), Payload::new())
            .await
            .unwrap();

        assert_eq!(mock.get_requests()[0].json_body().unwrap()["sudo_as"], "other");
    }

    #[tokio::test]
    async fn test_v3_without_bearer_is_usage_error() {
        let mock = MockHttpClient::new();
        let mut d = dispatcher(&mock, AuthScheme::SharedSecret);

        let err = d
            .emit(endpoints::lookup("api.v3.pag.qc.get").unwrap(), Payload::new())
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), crate::error::EX_USAGE);
        assert!(mock.get_requests().is_empty());
    }

    #[tokio::test]
    async fn test_http_status_taxonomy() {
        for (status, code) in [
            (400, crate::error::EX_NOPERM),
            (403, crate::error::EX_NOPERM),
            (500, crate::error::EX_UNAVAILABLE),
            (429, crate::error::EX_TEMPFAIL),
            (503, crate::error::EX_TEMPFAIL),
            (404, crate::error::EX_SOFTWARE),
        ] {
            let mock = MockHttpClient::new();
            mock.set_default_response(MockResponse::json(status, json!({"detail": "no"})));
            let mut d = dispatcher(&mock, AuthScheme::SharedSecret);

            let err = d
                .emit(endpoints::lookup("api.artifact.biosample.get").unwrap(), Payload::new())
                .await
                .unwrap_err();

            assert_eq!(err.exit_code(), code, "status {}", status);
            assert_eq!(mock.get_requests().len(), 1, "no retry for {}", status);
        }
    }

    #[tokio::test]
    async fn test_undecodable_success_body() {
        let mock = MockHttpClient::new();
        mock.set_default_response(MockResponse::Success(Response::new(200, Bytes::from("<html>"))));
        let mut d = dispatcher(&mock, AuthScheme::SharedSecret);

        let err = d
            .emit(endpoints::lookup("api.artifact.biosample.get").unwrap(), Payload::new())
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), crate::error::EX_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_application_errors_only_fatal_when_angry() {
        let mock = MockHttpClient::new();
        let body = json!({"errors": 1, "messages": ["bad sample"]});
        mock.set_default_response(MockResponse::json(200, body.clone()));
        let mut d = dispatcher(&mock, AuthScheme::SharedSecret);
        let endpoint = endpoints::lookup("api.artifact.biosample.add").unwrap();

        let response = d.emit(endpoint, Payload::new()).await.unwrap();
        assert_eq!(response, body);

        let err = d
            .emit(endpoint, payload(json!({"angry": true})))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Application { errors: 1 }));
        assert_eq!(err.exit_code(), crate::error::EX_GENERAL);
    }

    #[tokio::test]
    async fn test_scope_is_remembered_for_task_endpoints() {
        let mock = MockHttpClient::new();
        mock.set_default_response(MockResponse::json(200, json!({"errors": 0})));
        let mut d = dispatcher(&mock, AuthScheme::SharedSecret);

        d.emit(
            endpoints::lookup("api.artifact.biosample.query.validity").unwrap(),
            Payload::new(),
        )
        .await
        .unwrap();
        d.emit(endpoints::lookup(endpoints::TASK_GET).unwrap(), Payload::new())
            .await
            .unwrap();

        assert_eq!(
            d.context().active_scope.as_deref(),
            Some("majora2.view_biosampleartifact")
        );
    }

    #[tokio::test]
    async fn test_bearer_without_session_is_tempfail() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockHttpClient::new();
        let config = Config::new(DOMAIN)
            .with_user("sam")
            .with_client("cid", "secret")
            .with_tokens_file(dir.path().join("tokens"));
        let ctx = ClientContext::new(config, AuthScheme::Bearer).with_interactive(false);
        let mut d = Dispatcher::new(ctx, Arc::new(mock.clone()), Box::new(ScriptedPrompt::default()));

        let err = d
            .emit(endpoints::lookup("api.v3.pag.qc.get").unwrap(), Payload::new())
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), crate::error::EX_TEMPFAIL);
        assert!(mock.get_requests().is_empty());
    }

    #[tokio::test]
    async fn test_bearer_task_endpoint_without_active_scope() {
        let mock = MockHttpClient::new();
        let mut d = dispatcher(&mock, AuthScheme::Bearer);

        let err = d
            .emit(endpoints::lookup(endpoints::TASK_GET).unwrap(), Payload::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Usage(UsageError::NoActiveScope { .. })));
    }
}
