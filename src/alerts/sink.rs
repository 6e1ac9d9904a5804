//! Notification sinks for emitted alerts
//!
//! The pipeline invokes the configured sink with every alert whose action is
//! `Alert` or `Block`. The default sink writes structured tracing events;
//! operators wire their own channel (webhook, pager) by implementing
//! [`NotificationSink`].

use super::types::SecurityAlert;
use tracing::warn;

/// Callback invoked with every emitted alert
pub trait NotificationSink: Send + Sync {
    /// Deliver one alert. Must not block for long; delivery failures are the
    /// sink's own concern and never propagate into the pipeline.
    fn notify(&self, alert: &SecurityAlert);
}

/// Default sink: structured warning via `tracing`
#[derive(Debug, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, alert: &SecurityAlert) {
        warn!(
            alert_id = %alert.id,
            category = %alert.category,
            severity = %alert.severity,
            key = %alert.key,
            action = ?alert.action,
            "{}",
            alert.description
        );
    }
}
