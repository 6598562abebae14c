use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::trace;

use crate::events::bus::DEFAULT_SUBJECT;

/// Environment variable overriding the configured bind address
pub const BIND_ENV: &str = "SITE_MONITOR_BIND";

/// Target registry configuration
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory registry (no persistence)
    #[serde(rename = "none")]
    None,

    /// SQLite database (default)
    Sqlite {
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./monitoring.db")
}

/// Durable event bus configuration
#[derive(Debug, Clone, PartialEq, serde::Deserialize, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BusConfig {
    /// No bus; every event is fanned out directly
    #[default]
    None,

    /// In-process loopback bus
    Memory {
        #[serde(default = "default_subject")]
        subject: String,
    },

    Nats {
        #[serde(default = "default_nats_url")]
        url: String,
        #[serde(default = "default_subject")]
        subject: String,
        #[serde(default = "default_connect_timeout")]
        connect_timeout_secs: u64,
    },
}

fn default_subject() -> String {
    DEFAULT_SUBJECT.to_string()
}

fn default_nats_url() -> String {
    "nats://127.0.0.1:4222".to_string()
}

fn default_connect_timeout() -> u64 {
    2
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Bearer token required by the API when set
    pub auth_token: Option<String>,

    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// Log level for this crate (`trace`, `debug`, `info`, `warn`, `error`)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub bus: BusConfig,

    /// Start the recurring scheduler on startup
    #[serde(default = "default_true")]
    pub autostart: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            auth_token: None,
            enable_cors: true,
            log_level: default_log_level(),
            storage: StorageConfig::default(),
            bus: BusConfig::default(),
            autostart: true,
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "debug".to_string()
}

pub fn parse_config(content: &str) -> anyhow::Result<Config> {
    serde_json::from_str(content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
}

/// Read the configuration file, or use defaults when no path is given
///
/// `SITE_MONITOR_BIND` overrides the bind address in both cases.
pub fn read_config_file(path: Option<&str>) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(path) => parse_config(&std::fs::read_to_string(path)?)?,
        None => Config::default(),
    };

    if let Ok(bind) = std::env::var(BIND_ENV) {
        config.bind = bind
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {BIND_ENV} value {bind:?}: {e}"))?;
    }

    trace!("loaded config: {config:?}");
    Ok(config)
}
