//! Sliding-window rate limiter
//!
//! Per-key request timestamps over a rolling window. Pure data structure:
//! no I/O, one lock per limiter instance, per-key operations linearizable.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Per-key sliding-window counter
pub struct SlidingWindowLimiter {
    limit: u32,
    window: Duration,
    windows: RwLock<HashMap<String, Vec<Instant>>>,
}

impl SlidingWindowLimiter {
    /// Create a limiter allowing `limit` requests per `window` per key.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: RwLock::new(HashMap::new()),
        }
    }

    /// Purge expired timestamps for `key`, then admit and record the request
    /// if the remaining count is under the limit.
    ///
    /// Degenerate configurations: a zero limit always denies, a zero window
    /// always allows.
    pub fn allow(&self, key: &str) -> bool {
        if self.limit == 0 {
            return false;
        }
        if self.window.is_zero() {
            return true;
        }

        let now = Instant::now();
        let window_start = now - self.window;

        let mut windows = self.windows.write();
        let timestamps = windows.entry(key.to_string()).or_default();

        timestamps.retain(|&t| t > window_start);

        if timestamps.len() >= self.limit as usize {
            debug!(
                key,
                count = timestamps.len(),
                limit = self.limit,
                "rate limit exceeded"
            );
            return false;
        }

        timestamps.push(now);
        true
    }

    /// Remaining capacity for `key` without recording anything.
    pub fn remaining(&self, key: &str) -> u32 {
        if self.limit == 0 {
            return 0;
        }
        if self.window.is_zero() {
            return self.limit;
        }

        let window_start = Instant::now() - self.window;
        let windows = self.windows.read();
        let in_window = windows
            .get(key)
            .map(|timestamps| timestamps.iter().filter(|&&t| t > window_start).count())
            .unwrap_or(0);

        self.limit.saturating_sub(in_window as u32)
    }

    /// Maintenance sweep: drop keys with no in-window timestamps left.
    /// Bounds memory under key churn.
    pub fn cleanup(&self) {
        if self.window.is_zero() {
            self.windows.write().clear();
            return;
        }

        let window_start = Instant::now() - self.window;
        let mut windows = self.windows.write();
        windows.retain(|_, timestamps| {
            timestamps.retain(|&t| t > window_start);
            !timestamps.is_empty()
        });
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows.read().len()
    }
}
