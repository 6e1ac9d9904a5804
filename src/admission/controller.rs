//! Admission controller: named limiters plus blacklist/whitelist
//!
//! Decision order for every scope: whitelist short-circuits to allow, an
//! unexpired ban short-circuits to deny (expired entries are deleted on the
//! spot), otherwise the scope's limiter decides.

use super::limiter::SlidingWindowLimiter;
use super::types::{BanEntry, LimiterScope};
use crate::alerts::Severity;
use crate::config::AdmissionConfig;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info};

/// Blacklist and whitelist under one lock
#[derive(Debug, Default)]
struct AccessLists {
    blacklist: HashMap<String, BanEntry>,
    whitelist: HashSet<String>,
}

/// Allow/deny decisions for inbound keys
pub struct AdmissionController {
    api: SlidingWindowLimiter,
    mining: SlidingWindowLimiter,
    connection: SlidingWindowLimiter,
    lists: RwLock<AccessLists>,
}

impl AdmissionController {
    /// Create a controller with one limiter per scope.
    pub fn new(config: &AdmissionConfig) -> Self {
        Self {
            api: SlidingWindowLimiter::new(
                config.api_limit,
                Duration::from_secs(config.api_window_secs),
            ),
            mining: SlidingWindowLimiter::new(
                config.mining_limit,
                Duration::from_secs(config.mining_window_secs),
            ),
            connection: SlidingWindowLimiter::new(
                config.connection_limit,
                Duration::from_secs(config.connection_window_secs),
            ),
            lists: RwLock::new(AccessLists::default()),
        }
    }

    /// Admission decision for `key` in `scope`.
    pub fn allow(&self, scope: LimiterScope, key: &str) -> bool {
        if let Some(listed) = self.check_lists(key) {
            return listed;
        }
        self.limiter(scope).allow(key)
    }

    /// Admission decision on the general API path.
    pub fn allow_api(&self, key: &str) -> bool {
        self.allow(LimiterScope::Api, key)
    }

    /// Admission decision on the write path.
    pub fn allow_mining(&self, key: &str) -> bool {
        self.allow(LimiterScope::Mining, key)
    }

    /// Admission decision for a new connection.
    pub fn allow_connection(&self, key: &str) -> bool {
        self.allow(LimiterScope::Connection, key)
    }

    /// Remaining limiter capacity for `key` in `scope`. List state is not
    /// consulted; this is a pure limiter read.
    pub fn remaining(&self, scope: LimiterScope, key: &str) -> u32 {
        self.limiter(scope).remaining(key)
    }

    /// Insert or refresh a ban. Idempotent: re-banning overwrites the entry
    /// with a fresh expiry.
    pub fn ban(&self, key: &str, duration: Duration, reason: &str, severity: Severity) {
        let now = Utc::now();
        let until = now
            + chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::seconds(0));
        info!(key, reason, %severity, until = %until, "banning key");

        self.lists.write().blacklist.insert(
            key.to_string(),
            BanEntry {
                key: key.to_string(),
                reason: reason.to_string(),
                severity,
                blocked_at: now,
                blocked_until: until,
            },
        );
    }

    /// Remove a ban. Returns whether an entry existed.
    pub fn unban(&self, key: &str) -> bool {
        let removed = self.lists.write().blacklist.remove(key).is_some();
        if removed {
            info!(key, "unbanned key");
        }
        removed
    }

    /// Whitelist a key. Whitelisting always wins over an active ban.
    pub fn add_to_whitelist(&self, key: &str) {
        info!(key, "whitelisting key");
        self.lists.write().whitelist.insert(key.to_string());
    }

    /// Remove a key from the whitelist. Returns whether it was present.
    pub fn remove_from_whitelist(&self, key: &str) -> bool {
        self.lists.write().whitelist.remove(key)
    }

    /// Whether `key` currently has an unexpired, non-whitelisted ban.
    /// Expired entries found here are deleted.
    pub fn is_blocked(&self, key: &str) -> bool {
        matches!(self.check_lists(key), Some(false))
    }

    /// Purge expired bans and forward to every limiter's cleanup.
    pub fn cleanup(&self) {
        let now = Utc::now();
        {
            let mut lists = self.lists.write();
            let before = lists.blacklist.len();
            lists.blacklist.retain(|_, entry| !entry.is_expired(now));
            let purged = before - lists.blacklist.len();
            if purged > 0 {
                debug!(purged, "purged expired bans");
            }
        }
        self.api.cleanup();
        self.mining.cleanup();
        self.connection.cleanup();
    }

    /// Active (unexpired) bans, for snapshots and the operator surface.
    pub fn ban_snapshot(&self) -> Vec<BanEntry> {
        let now = Utc::now();
        self.lists
            .read()
            .blacklist
            .values()
            .filter(|entry| !entry.is_expired(now))
            .cloned()
            .collect()
    }

    /// Whitelisted keys, for snapshots and the operator surface.
    pub fn whitelist_snapshot(&self) -> Vec<String> {
        self.lists.read().whitelist.iter().cloned().collect()
    }

    /// Whitelist/blacklist verdict: `Some(true)` allow, `Some(false)` deny,
    /// `None` fall through to the limiter.
    fn check_lists(&self, key: &str) -> Option<bool> {
        {
            let lists = self.lists.read();
            if lists.whitelist.contains(key) {
                return Some(true);
            }
            match lists.blacklist.get(key) {
                Some(entry) if !entry.is_expired(Utc::now()) => return Some(false),
                Some(_) => {} // expired, delete below
                None => return None,
            }
        }

        // Lazy expiry: re-check under the write lock before deleting
        let mut lists = self.lists.write();
        if let Some(entry) = lists.blacklist.get(key) {
            if entry.is_expired(Utc::now()) {
                debug!(key, "removing expired ban");
                lists.blacklist.remove(key);
            } else {
                return Some(false);
            }
        }
        None
    }

    fn limiter(&self, scope: LimiterScope) -> &SlidingWindowLimiter {
        match scope {
            LimiterScope::Api => &self.api,
            LimiterScope::Mining => &self.mining,
            LimiterScope::Connection => &self.connection,
        }
    }
}
