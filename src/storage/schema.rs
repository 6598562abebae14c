//! Target and check-outcome rows
//!
//! ## Ownership
//!
//! - [`MonitoredTarget`] rows are owned by the registry. The monitoring core only reads them.
//! - [`CheckOutcome`] rows are written exclusively by the check cycle runner and are
//!   never updated afterwards.
//!
//! ## Timestamps
//!
//! All timestamps are UTC. The SQLite backend stores them as Unix milliseconds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default advisory check interval for new targets (seconds)
pub const DEFAULT_CHECK_INTERVAL_SECS: u32 = 60;

/// Protocol used to probe a target
///
/// `Ping` can be stored and listed but has no probe behind it; see
/// [`crate::monitoring::probe`] for how such targets are recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    #[default]
    Https,
    Tcp,
    Ping,
}

impl Protocol {
    /// Get the string representation (lowercase)
    ///
    /// This matches the serde serialization format and the stored column value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
            Protocol::Tcp => "tcp",
            Protocol::Ping => "ping",
        }
    }

    /// HTTP and HTTPS share one probe and report status codes
    pub fn is_http_family(&self) -> bool {
        matches!(self, Protocol::Http | Protocol::Https)
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            "tcp" => Ok(Protocol::Tcp),
            "ping" => Ok(Protocol::Ping),
            other => Err(format!("unknown protocol: {other}")),
        }
    }
}

/// A monitored endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredTarget {
    pub id: i64,

    /// Human readable name
    pub name: String,

    /// URL for HTTP-family targets, `[tcp://]host[:port]` for TCP targets
    pub address: String,

    pub protocol: Protocol,

    /// Advisory interval in seconds. The scheduler runs one global interval.
    pub check_interval: u32,

    pub is_active: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Fields for registering a new target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTarget {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default = "default_check_interval")]
    pub check_interval: u32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl NewTarget {
    pub fn new(name: impl Into<String>, address: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            protocol,
            check_interval: DEFAULT_CHECK_INTERVAL_SECS,
            is_active: true,
        }
    }

    /// Turn into a stored target with the given id
    pub fn into_target(self, id: i64, now: DateTime<Utc>) -> MonitoredTarget {
        MonitoredTarget {
            id,
            name: self.name,
            address: self.address,
            protocol: self.protocol,
            check_interval: self.check_interval,
            is_active: self.is_active,
            created_at: now,
            updated_at: now,
        }
    }
}

fn default_check_interval() -> u32 {
    DEFAULT_CHECK_INTERVAL_SECS
}

fn default_active() -> bool {
    true
}

/// Partial update of a target, only `Some` fields are applied
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub protocol: Option<Protocol>,
    pub check_interval: Option<u32>,
    pub is_active: Option<bool>,
}

impl TargetUpdate {
    /// Apply the provided fields and bump `updated_at`
    pub fn apply(self, target: &mut MonitoredTarget, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            target.name = name;
        }
        if let Some(address) = self.address {
            target.address = address;
        }
        if let Some(protocol) = self.protocol {
            target.protocol = protocol;
        }
        if let Some(check_interval) = self.check_interval {
            target.check_interval = check_interval;
        }
        if let Some(is_active) = self.is_active {
            target.is_active = is_active;
        }
        target.updated_at = now;
    }
}

/// Result of one probe attempt against one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    /// Assigned by the registry on insert
    pub id: Option<i64>,

    pub target_id: i64,

    pub is_up: bool,

    /// Present only for HTTP-family targets that produced a response
    pub status_code: Option<u16>,

    /// Wall-clock duration of the whole probe attempt
    pub latency_ms: Option<f64>,

    pub error: Option<String>,

    pub checked_at: DateTime<Utc>,
}
