//! Bearer token storage.
//!
//! Tokens live in a single JSON document (`MAJORA_TOKENS_FILE`, by default
//! `~/.ocarina-tokens`) mapping each scope string to its token record. The
//! scope string is used verbatim as the key: `"a b"` and `"b a"` are two
//! different entries.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::AuthError;
use crate::storage;

/// One stored bearer token.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TokenRecord {
    /// The exact scope string this token was requested for.
    #[serde(default, deserialize_with = "scope_string")]
    pub scope: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Expiration time as Unix timestamp (seconds since epoch).
    #[serde(deserialize_with = "epoch_seconds")]
    pub expires_at: i64,
    /// Everything else the token endpoint returned.
    #[serde(flatten)]
    pub raw_fields: Map<String, Value>,
}

impl TokenRecord {
    /// Check if the token is expired at `now`.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }

    /// Check if the token is expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now().timestamp())
    }
}

/// Accept a scope as a space-separated string or a list of permissions.
pub(crate) fn scope_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scope {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<Scope>::deserialize(deserializer)? {
        Some(Scope::One(s)) => s,
        Some(Scope::Many(parts)) => parts.join(" "),
        None => String::new(),
    })
}

/// Accept an expiry written as an integer or a float.
fn epoch_seconds<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Epoch {
        Whole(i64),
        Fractional(f64),
    }

    Ok(match Epoch::deserialize(deserializer)? {
        Epoch::Whole(secs) => secs,
        Epoch::Fractional(secs) => secs as i64,
    })
}

/// Manages the token store file.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Create a store backed by `path`. Nothing is read until [`Self::load`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the path to the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every record.
    ///
    /// Returns an empty map if the file doesn't exist. A file that is not a
    /// JSON object of token records is an error.
    pub fn load(&self) -> Result<BTreeMap<String, TokenRecord>, AuthError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        storage::warn_if_exposed(&self.path);

        let text = fs::read_to_string(&self.path).map_err(|e| self.malformed(e))?;
        let mut records: BTreeMap<String, TokenRecord> =
            serde_json::from_str(&text).map_err(|e| self.malformed(e))?;

        for (scope, record) in records.iter_mut() {
            if record.scope.is_empty() {
                record.scope = scope.clone();
            }
        }

        tracing::debug!(path = %self.path.display(), count = records.len(), "loaded tokens");
        Ok(records)
    }

    /// Get the record stored under exactly `scope`.
    pub fn get(&self, scope: &str) -> Result<Option<TokenRecord>, AuthError> {
        Ok(self.load()?.remove(scope))
    }

    /// Scopes with a stored record.
    pub fn scopes(&self) -> Result<Vec<String>, AuthError> {
        Ok(self.load()?.into_keys().collect())
    }

    /// Merge `record` into the store under its scope and rewrite the file.
    ///
    /// A newly created file is readable and writable by its owner only.
    pub fn save(&self, record: &TokenRecord) -> Result<(), AuthError> {
        let mut records = self.load()?;
        records.insert(record.scope.clone(), record.clone());

        let json = serde_json::to_string_pretty(&records).map_err(|e| self.save_failed(e))?;
        storage::write_secret_file(&self.path, json.as_bytes()).map_err(|e| self.save_failed(e))?;
        storage::warn_if_exposed(&self.path);

        tracing::debug!(scope = %record.scope, expires_at = record.expires_at, "saved token");
        Ok(())
    }

    fn malformed(&self, err: impl ToString) -> AuthError {
        AuthError::CredentialsMalformed {
            path: self.path.clone(),
            message: err.to_string(),
        }
    }

    fn save_failed(&self, err: impl ToString) -> AuthError {
        AuthError::CredentialsSaveFailed {
            path: self.path.clone(),
            message: err.to_string(),
        }
    }
}
