//! Primary client configuration.
//!
//! Configuration is read once per invocation, either from a JSON file
//! (`$OCARINA_CONF_FILE`, else `~/.ocarina`) or, with `--env`, from the
//! process environment. The resolved [`Config`] is immutable and travels
//! inside the dispatcher's context.
//!
//! # Example file
//!
//! ```json
//! {
//!     "MAJORA_DOMAIN": "https://majora.example.org/",
//!     "MAJORA_USER": "sam",
//!     "MAJORA_TOKEN": "...",
//!     "MAJORA_TOKENS_FILE": "~/.ocarina-tokens",
//!     "CLIENT_ID": "...",
//!     "CLIENT_SECRET": "...",
//!     "profiles": {
//!         "staging": {"MAJORA_DOMAIN": "https://staging.example.org/"}
//!     }
//! }
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::storage;

pub const KEY_DOMAIN: &str = "MAJORA_DOMAIN";
pub const KEY_USER: &str = "MAJORA_USER";
pub const KEY_TOKEN: &str = "MAJORA_TOKEN";
pub const KEY_TOKENS_FILE: &str = "MAJORA_TOKENS_FILE";
pub const KEY_CLIENT_ID: &str = "CLIENT_ID";
pub const KEY_CLIENT_SECRET: &str = "CLIENT_SECRET";
pub const KEY_NO_BANNER: &str = "OCARINA_NO_BANNER";
pub const KEY_QUIET: &str = "OCARINA_QUIET";

/// Overrides the configuration file location.
pub const CONF_FILE_ENV: &str = "OCARINA_CONF_FILE";

const DEFAULT_DOMAIN: &str = "https://example.org/";
const DEFAULT_TOKENS_FILE: &str = "~/.ocarina-tokens";
const DEFAULT_CONF_FILE: &str = ".ocarina";

/// Where the configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Environment,
    Defaults,
}

/// Resolved client configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the service, with a trailing slash
    pub domain: String,
    pub user: String,
    /// Static shared secret for legacy endpoints
    pub token: String,
    /// Path of the bearer token store, `~` already expanded
    pub tokens_file: PathBuf,
    pub client_id: String,
    pub client_secret: String,
    pub no_banner: bool,
    pub quiet: bool,
    pub source: ConfigSource,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            user: String::new(),
            token: String::new(),
            tokens_file: expand_tilde(DEFAULT_TOKENS_FILE, dirs::home_dir().as_deref()),
            client_id: String::new(),
            client_secret: String::new(),
            no_banner: false,
            quiet: false,
            source: ConfigSource::Defaults,
        }
    }
}

impl Config {
    /// Create a configuration for `domain` with every other key at its default.
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..Self::default()
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    pub fn with_tokens_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.tokens_file = path.into();
        self
    }

    /// Set the bearer client id/secret pair.
    pub fn with_client(mut self, id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.client_id = id.into();
        self.client_secret = secret.into();
        self
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Load configuration the way the CLI does.
    ///
    /// With `env` the process environment is used and `profile` is ignored
    /// with a warning.
    pub fn load(env: bool, profile: Option<&str>) -> Result<Self, ConfigError> {
        if env {
            if let Some(profile) = profile {
                tracing::warn!(profile, "cannot use --profile with --env, profile will be ignored");
            }
            return Self::from_env(|key| std::env::var(key).ok());
        }

        let path = config_path()?;
        Self::from_file(&path, profile)
    }

    /// Read configuration from a JSON file, applying `profile` if given.
    ///
    /// A missing file is replaced by an owner-only skeleton and reported as
    /// [`ConfigError::Initialised`].
    pub fn from_file(path: &Path, profile: Option<&str>) -> Result<Self, ConfigError> {
        if !path.exists() {
            write_skeleton(path)?;
            return Err(ConfigError::Initialised {
                path: path.to_path_buf(),
            });
        }

        storage::warn_if_exposed(path);
        tracing::debug!(path = %path.display(), profile = profile.unwrap_or("default"), "loading config");

        let text = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let root: Value = serde_json::from_str(&text).map_err(|e| ConfigError::InvalidJson {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let root = root.as_object().ok_or_else(|| ConfigError::InvalidJson {
            path: path.to_path_buf(),
            message: "expected a JSON object".to_string(),
        })?;

        let mut values = root.clone();
        values.remove("profiles");
        if let Some(name) = profile {
            let overrides = root
                .get("profiles")
                .and_then(|p| p.get(name))
                .and_then(Value::as_object)
                .ok_or_else(|| ConfigError::UnknownProfile {
                    profile: name.to_string(),
                })?;
            for (key, value) in overrides {
                values.insert(key.clone(), value.clone());
            }
        }

        let mut config = Self::from_map(&values)?;
        config.source = ConfigSource::File(path.to_path_buf());
        Ok(config)
    }

    /// Read configuration from environment lookups.
    ///
    /// `MAJORA_CLIENT_ID`/`MAJORA_CLIENT_SECRET` stand in for an unset
    /// `CLIENT_ID`/`CLIENT_SECRET`.
    pub fn from_env<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let mut values = Map::new();
        for key in [
            KEY_DOMAIN,
            KEY_USER,
            KEY_TOKEN,
            KEY_TOKENS_FILE,
            KEY_CLIENT_ID,
            KEY_CLIENT_SECRET,
            KEY_NO_BANNER,
            KEY_QUIET,
        ] {
            if let Some(value) = get(key) {
                values.insert(key.to_string(), Value::String(value));
            }
        }

        if !values.contains_key(KEY_CLIENT_ID) {
            if let Some(id) = get("MAJORA_CLIENT_ID") {
                values.insert(KEY_CLIENT_ID.to_string(), Value::String(id));
                if let Some(secret) = get("MAJORA_CLIENT_SECRET") {
                    values.insert(KEY_CLIENT_SECRET.to_string(), Value::String(secret));
                }
            }
        }

        let missing: Vec<&'static str> = [KEY_DOMAIN, KEY_USER, KEY_TOKEN]
            .into_iter()
            .filter(|key| !values.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingKeys { keys: missing });
        }

        let mut config = Self::from_map(&values)?;
        config.source = ConfigSource::Environment;
        Ok(config)
    }

    fn from_map(values: &Map<String, Value>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let home = dirs::home_dir();

        let tokens_file = match string_key(values, KEY_TOKENS_FILE)? {
            Some(raw) => expand_tilde(&raw, home.as_deref()),
            None => defaults.tokens_file,
        };

        Ok(Self {
            domain: string_key(values, KEY_DOMAIN)?.unwrap_or(defaults.domain),
            user: string_key(values, KEY_USER)?.unwrap_or_default(),
            token: string_key(values, KEY_TOKEN)?.unwrap_or_default(),
            tokens_file,
            client_id: string_key(values, KEY_CLIENT_ID)?.unwrap_or_default(),
            client_secret: string_key(values, KEY_CLIENT_SECRET)?.unwrap_or_default(),
            no_banner: int_key(values, KEY_NO_BANNER)? != 0,
            quiet: int_key(values, KEY_QUIET)? != 0,
            source: ConfigSource::Defaults,
        })
    }

    /// Whether a bearer client id/secret pair is configured.
    pub fn has_client_credentials(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    /// Key/value pairs safe to print: secrets masked, the client id cut to
    /// its last 4 characters.
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        vec![
            (KEY_DOMAIN, self.domain.clone()),
            (KEY_USER, self.user.clone()),
            (KEY_TOKEN, mask(&self.token, 0)),
            (KEY_TOKENS_FILE, self.tokens_file.display().to_string()),
            (KEY_CLIENT_ID, mask(&self.client_id, 4)),
            (KEY_CLIENT_SECRET, mask(&self.client_secret, 0)),
            (KEY_NO_BANNER, u8::from(self.no_banner).to_string()),
            (KEY_QUIET, u8::from(self.quiet).to_string()),
        ]
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Config");
        for (key, value) in self.summary() {
            s.field(key, &value);
        }
        s.field("source", &self.source).finish()
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            ConfigSource::File(path) => writeln!(f, "# {}", path.display())?,
            ConfigSource::Environment => writeln!(f, "# environment")?,
            ConfigSource::Defaults => writeln!(f, "# defaults")?,
        }
        for (key, value) in self.summary() {
            writeln!(f, "{:<20} {}", key, value)?;
        }
        Ok(())
    }
}

/// Location of the configuration file.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = std::env::var_os(CONF_FILE_ENV).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDirectory)?;
    Ok(home.join(DEFAULT_CONF_FILE))
}

/// Replace a leading `~` with `home`.
pub fn expand_tilde(raw: &str, home: Option<&Path>) -> PathBuf {
    match (raw.strip_prefix('~'), home) {
        (Some(rest), Some(home)) => home.join(rest.trim_start_matches('/')),
        _ => PathBuf::from(raw),
    }
}

fn write_skeleton(path: &Path) -> Result<(), ConfigError> {
    let skeleton = serde_json::json!({
        KEY_DOMAIN: DEFAULT_DOMAIN,
        KEY_USER: "",
        KEY_TOKEN: "",
        KEY_TOKENS_FILE: DEFAULT_TOKENS_FILE,
        KEY_CLIENT_ID: "",
        KEY_CLIENT_SECRET: "",
        KEY_NO_BANNER: 0,
        KEY_QUIET: 0,
    });
    let text = serde_json::to_string_pretty(&skeleton).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    storage::write_secret_file(path, text.as_bytes()).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn string_key(values: &Map<String, Value>, key: &str) -> Result<Option<String>, ConfigError> {
    match values.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a string, found {}", other),
        }),
    }
}

fn int_key(values: &Map<String, Value>, key: &str) -> Result<i64, ConfigError> {
    let invalid = |found: &Value| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected an integer, found {}", found),
    };
    let found = match values.get(key) {
        None | Some(Value::Null) => return Ok(0),
        Some(found) => found,
    };
    match found {
        Value::Number(n) => n.as_i64().ok_or_else(|| invalid(found)),
        Value::String(s) => s.trim().parse().map_err(|_| invalid(found)),
        Value::Bool(b) => Ok(i64::from(*b)),
        other => Err(invalid(other)),
    }
}

/// Mask `value`, keeping its last `visible` characters.
fn mask(value: &str, visible: usize) -> String {
    if value.is_empty() {
        return String::new();
    }
    let len = value.chars().count();
    let keep = visible.min(len);
    let tail: String = value.chars().skip(len - keep).collect();
    format!("{}{}", "*".repeat(len - keep), tail)
}
