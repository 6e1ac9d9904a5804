//! Alert pipeline: bounded retention, dispatch, and threshold escalation

use super::bounded::BoundedPush;
use super::sink::NotificationSink;
use super::types::{
    AlertAction, PerformanceAverages, SecurityAlert, SecurityEvent, SecurityReport, Severity,
    SystemSample,
};
use crate::admission::AdmissionController;
use crate::config::AlertConfig;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Category of synthesized escalation events. Excluded from the active-alert
/// count so a storm can never re-trigger itself.
pub const STORM_CATEGORY: &str = "alert_storm";

/// Consolidated pipeline storage - single lock for related data
#[derive(Debug, Default)]
struct PipelineStorage {
    events: VecDeque<SecurityEvent>,
    alerts: VecDeque<SecurityAlert>,
    metrics: VecDeque<SystemSample>,
    total_events: u64,
    total_alerts: u64,
    events_by_severity: HashMap<String, u64>,
    events_by_category: HashMap<String, u64>,
}

/// Ingests alerts and events, retains them in bounded buffers, and applies
/// the declared response action.
pub struct AlertPipeline {
    config: AlertConfig,
    /// Ban duration applied on `Block` actions
    default_ban: Duration,
    controller: Arc<AdmissionController>,
    sink: Arc<dyn NotificationSink>,
    storage: RwLock<PipelineStorage>,
}

impl AlertPipeline {
    /// Create a pipeline bound to an admission controller and a sink.
    pub fn new(
        config: &AlertConfig,
        default_ban: Duration,
        controller: Arc<AdmissionController>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            config: config.clone(),
            default_ban,
            controller,
            sink,
            storage: RwLock::new(PipelineStorage::default()),
        }
    }

    /// Ingest one alert.
    ///
    /// `raw_key` is the unmasked originating key, needed only when the action
    /// is `Block`; the retained alert carries the masked form. The storage
    /// lock is released before any side effect so no two component locks are
    /// ever held together.
    pub fn ingest(&self, alert: SecurityAlert, raw_key: Option<&str>) {
        debug!(category = %alert.category, severity = %alert.severity, "ingesting alert");

        {
            let mut storage = self.storage.write();
            storage.total_events += 1;
            *storage
                .events_by_severity
                .entry(alert.severity.to_string())
                .or_insert(0) += 1;
            *storage
                .events_by_category
                .entry(alert.category.clone())
                .or_insert(0) += 1;

            let event = SecurityEvent::from_alert(&alert);
            let max_events = self.config.max_events;
            storage.events.push_bounded(event, max_events);

            if alert.severity >= Severity::Medium {
                storage.total_alerts += 1;
                let max_alerts = self.config.max_alerts;
                storage.alerts.push_bounded(alert.clone(), max_alerts);
            }
        }

        match alert.action {
            AlertAction::Log => {}
            AlertAction::Alert => self.sink.notify(&alert),
            AlertAction::Block => {
                if let Some(key) = raw_key {
                    // Idempotent: re-banning an already banned key just
                    // refreshes the expiry.
                    self.controller
                        .ban(key, self.default_ban, &alert.category, alert.severity);
                } else {
                    warn!(
                        category = %alert.category,
                        "block action without an originating key, retention only"
                    );
                }
                self.sink.notify(&alert);
            }
        }
    }

    /// Retain one performance sample.
    pub fn record_metric(&self, sample: SystemSample) {
        let mut storage = self.storage.write();
        let max_metrics = self.config.max_metrics;
        storage.metrics.push_bounded(sample, max_metrics);
    }

    /// Unresolved retained alerts, storm events excluded.
    pub fn active_alert_count(&self) -> usize {
        self.storage
            .read()
            .alerts
            .iter()
            .filter(|a| !a.resolved && a.category != STORM_CATEGORY)
            .count()
    }

    /// Threshold escalation check, run once per scheduler tick.
    ///
    /// Synthesizes at most one critical storm event per call, regardless of
    /// how far over the threshold the buffer is. Returns whether one fired.
    pub fn escalate_tick(&self) -> bool {
        let active = self.active_alert_count();
        if active <= self.config.escalation_threshold {
            return false;
        }

        warn!(
            active,
            threshold = self.config.escalation_threshold,
            "alert volume over threshold, escalating"
        );

        let storm = SecurityAlert::new(
            STORM_CATEGORY,
            Severity::Critical,
            "",
            "",
            format!(
                "{} active alerts exceed threshold {}",
                active, self.config.escalation_threshold
            ),
            serde_json::json!({
                "active_alerts": active,
                "threshold": self.config.escalation_threshold,
            }),
            AlertAction::Alert,
        );
        self.ingest(storm, None);
        true
    }

    /// Mark an alert resolved. Returns false when the id is unknown or has
    /// already been evicted.
    pub fn resolve(&self, alert_id: &str) -> bool {
        let mut storage = self.storage.write();
        match storage.alerts.iter_mut().find(|a| a.id == alert_id) {
            Some(alert) => {
                alert.resolved = true;
                true
            }
            None => false,
        }
    }

    /// Aggregate read-only snapshot.
    pub fn report(&self) -> SecurityReport {
        let storage = self.storage.read();
        let tail = self.config.report_tail;

        SecurityReport {
            generated_at: Utc::now(),
            total_events: storage.total_events,
            total_alerts: storage.total_alerts,
            active_alerts: storage.alerts.iter().filter(|a| !a.resolved).count(),
            events_by_severity: storage.events_by_severity.clone(),
            events_by_category: storage.events_by_category.clone(),
            performance: Self::averages(&storage.metrics),
            recent_events: storage.events.iter().rev().take(tail).cloned().collect(),
            recent_alerts: storage.alerts.iter().rev().take(tail).cloned().collect(),
        }
    }

    /// Currently retained events, oldest first. Used by the snapshot task.
    pub fn retained_events(&self) -> Vec<SecurityEvent> {
        self.storage.read().events.iter().cloned().collect()
    }

    /// Currently retained alerts, oldest first. Used by the snapshot task.
    pub fn retained_alerts(&self) -> Vec<SecurityAlert> {
        self.storage.read().alerts.iter().cloned().collect()
    }

    fn averages(metrics: &VecDeque<SystemSample>) -> PerformanceAverages {
        let count = metrics.len();
        if count == 0 {
            return PerformanceAverages::default();
        }
        let n = count as f64;
        PerformanceAverages {
            cpu_percent: metrics.iter().map(|m| m.cpu_percent).sum::<f64>() / n,
            memory_percent: metrics.iter().map(|m| m.memory_percent).sum::<f64>() / n,
            disk_percent: metrics.iter().map(|m| m.disk_percent).sum::<f64>() / n,
            error_rate: metrics.iter().map(|m| m.error_rate).sum::<f64>() / n,
            sample_count: count,
        }
    }
}
