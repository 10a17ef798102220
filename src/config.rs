//! Configuration management using Figment.
//!
//! Configuration is loaded from multiple sources with the following
//! precedence (highest to lowest):
//! 1. Environment variables (prefix: `PROXYFLEET_`)
//! 2. Current working directory: `./config.toml`
//! 3. Default values

use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Top-level configuration for an embedding application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Repository backend configuration (optional: absent means the caller
    /// is expected to construct its own `Repository`, e.g. `InMemoryRepository`).
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Defaults applied when constructing `AdminClient`s.
    #[serde(default)]
    pub admin_client: AdminClientConfig,

    /// Health Supervisor tick interval / shutdown behaviour.
    #[serde(default)]
    pub health_supervisor: SupervisorConfig,

    /// Audit trail behaviour.
    #[serde(default)]
    pub audit: AuditConfig,
}

/// PostgreSQL connection pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,

    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum idle connections.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection acquire timeout in seconds.
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Maximum retry attempts when establishing the pool.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between retry attempts in seconds (doubled per attempt).
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

/// Defaults applied when an `AdminClient` is constructed without
/// per-instance overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminClientConfig {
    /// Per-request timeout in seconds (spec §5 default: 10s).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// TCP connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl AdminClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for AdminClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Health Supervisor scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Interval between health probe rounds, in seconds.
    #[serde(default = "default_probe_interval")]
    pub interval_secs: u64,

    /// Grace period given to in-flight probes on shutdown, in seconds.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

impl SupervisorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_probe_interval(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

/// Audit trail configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Whether significant state changes are recorded via `AuditRepository`.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
        }
    }
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    2
}

fn default_connection_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_delay() -> u64 {
    2
}

fn default_request_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_probe_interval() -> u64 {
    30
}

fn default_shutdown_grace() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from all sources: `./config.toml` overridden by
    /// `PROXYFLEET_`-prefixed environment variables.
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    /// Load configuration from a specific file, bypassing the default
    /// search path. Useful for tests and non-standard deployments.
    pub fn load_from(path: &str) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("PROXYFLEET_").split("__"))
            .extract()?;

        Ok(config)
    }

    pub fn database_url(&self) -> Option<&str> {
        self.database.as_ref().map(|db| db.url.as_str())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: None,
            admin_client: AdminClientConfig::default(),
            health_supervisor: SupervisorConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_timeouts() {
        let config = Config::default();
        assert_eq!(config.admin_client.request_timeout_secs, 10);
        assert_eq!(config.health_supervisor.interval_secs, 30);
        assert!(config.audit.enabled);
        assert!(config.database.is_none());
    }

    #[test]
    fn admin_client_config_converts_to_durations() {
        let config = AdminClientConfig {
            request_timeout_secs: 7,
            connect_timeout_secs: 3,
        };
        assert_eq!(config.request_timeout(), Duration::from_secs(7));
        assert_eq!(config.connect_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn load_from_missing_file_falls_back_to_defaults() {
        let config = Config::load_from("does-not-exist.toml").unwrap();
        assert_eq!(config.admin_client.request_timeout_secs, 10);
    }
}
