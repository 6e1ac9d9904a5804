//! Admission control types

use crate::alerts::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Named limiter scopes composed by the admission controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimiterScope {
    /// General API reads
    Api,
    /// Write path: block and transaction submission
    Mining,
    /// New connection establishment
    Connection,
}

impl std::fmt::Display for LimiterScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimiterScope::Api => write!(f, "api"),
            LimiterScope::Mining => write!(f, "mining"),
            LimiterScope::Connection => write!(f, "connection"),
        }
    }
}

/// One blacklist entry. Logically absent once `blocked_until` has passed;
/// expiry is applied lazily on lookup and during cleanup sweeps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanEntry {
    /// Banned key (IP or node id)
    pub key: String,
    /// Why the ban was applied (alert category)
    pub reason: String,
    /// Severity of the triggering alert
    pub severity: Severity,
    /// When the ban was applied
    pub blocked_at: DateTime<Utc>,
    /// When the ban expires
    pub blocked_until: DateTime<Utc>,
}

impl BanEntry {
    /// Whether the entry is past its expiry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.blocked_until
    }
}
