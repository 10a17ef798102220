//! [`ProxyInstance`]: a registered remote proxy (spec §3.1).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Opaque string→string credential map whose interpretation depends on the
/// instance's [`AuthKind`]. Backed by a `BTreeMap` so round-trip equality
/// checks in tests are deterministic regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials(BTreeMap<String, String>);

impl Credentials {
    /// Build credentials from an iterator of key/value pairs.
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self(entries.into_iter().collect())
    }

    /// Fetch a key, failing with [`Error::Validation`] naming the missing key.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.0
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| Error::Validation(format!("missing required credential key '{key}'")))
    }

    /// Fetch a key if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Insert or overwrite a credential.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Whether no credentials are stored.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Authentication scheme for a registered proxy's admin API (spec §3.1, §4.B).
///
/// Serialized as an internally-tagged enum so the `credentials` map on
/// [`ProxyInstance`] can be validated against the declared kind at the
/// repository boundary without a second lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthKind {
    /// No authentication; requests are sent unauthenticated.
    None,
    /// `Authorization: Bearer <token>` on every request. Requires a `token`
    /// credential.
    Bearer,
    /// Mutual TLS. Requires `cert_path` and `key_path` credentials; `ca_path`
    /// is optional.
    Mtls,
}

impl AuthKind {
    /// Validate that `credentials` carries the keys this auth kind requires.
    pub fn validate_credentials(&self, credentials: &Credentials) -> Result<()> {
        match self {
            AuthKind::None => Ok(()),
            AuthKind::Bearer => credentials.require("token").map(|_| ()),
            AuthKind::Mtls => {
                credentials.require("cert_path")?;
                credentials.require("key_path")?;
                Ok(())
            }
        }
    }
}

/// Derived runtime status of a registered instance (spec §3.1, §4.G state
/// machine). Only written by the Health Supervisor or by operations that
/// probe as a side effect — never by a configuration read/write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    /// No probe has completed yet (e.g. just registered).
    Unknown,
    /// The most recent probe succeeded.
    Online,
    /// The most recent probe completed but reported failure.
    Offline,
    /// Client construction or a transport-level failure prevented probing.
    Error,
}

impl Default for InstanceStatus {
    fn default() -> Self {
        InstanceStatus::Unknown
    }
}

/// A registered remote proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyInstance {
    pub id: Uuid,
    pub name: String,
    pub admin_url: String,
    pub auth: AuthKind,
    pub credentials: Credentials,
    pub status: InstanceStatus,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProxyInstance {
    /// Validate the invariants spec §3.1 requires of a would-be instance:
    /// `admin_url` is a syntactically valid absolute HTTP(S) URL, and the
    /// credential map carries whatever keys `auth` demands.
    pub fn validate(admin_url: &str, auth: &AuthKind, credentials: &Credentials) -> Result<()> {
        validate_admin_url(admin_url)?;
        auth.validate_credentials(credentials)
    }
}

/// Validate that `url` is an absolute `http://` or `https://` URL with a host.
pub fn validate_admin_url(url: &str) -> Result<()> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| Error::Validation(format!("invalid admin_url '{url}': {e}")))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(Error::Validation(format!(
            "admin_url '{url}' must use http or https"
        )));
    }
    if parsed.host_str().is_none() {
        return Err(Error::Validation(format!(
            "admin_url '{url}' has no host"
        )));
    }
    Ok(())
}

/// Fields required to register a new instance. `id`, `status`, `last_seen`,
/// `created_at`, and `updated_at` are assigned by the Repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProxyInstance {
    pub name: String,
    pub admin_url: String,
    pub auth: AuthKind,
    pub credentials: Credentials,
}

/// Fields that may be changed by an instance update. `status` and
/// `last_seen` are never part of an update payload — they are derived state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateProxyInstance {
    pub name: String,
    pub admin_url: String,
    pub auth: AuthKind,
    pub credentials: Credentials,
}
