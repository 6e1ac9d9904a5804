//! Alert and event types for the security pipeline

use crate::utils::mask::{mask_key, mask_user_agent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Alert severity levels, ordered from least to most severe
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Response action attached to an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertAction {
    /// Retain only
    Log,
    /// Retain and notify the sink
    Alert,
    /// Retain, notify, and ban the originating key
    Block,
}

/// A detected security condition.
///
/// Immutable once created; only `resolved` flips, through
/// [`AlertPipeline::resolve`](super::AlertPipeline::resolve).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityAlert {
    /// Alert id
    pub id: String,
    /// Creation timestamp
    pub timestamp: DateTime<Utc>,
    /// Category: signature name, "proxy_header", "alert_storm", ...
    pub category: String,
    /// Severity
    pub severity: Severity,
    /// Masked originating key
    pub key: String,
    /// Masked user-agent
    pub user_agent: String,
    /// Human description
    pub description: String,
    /// Structured details
    pub details: serde_json::Value,
    /// Response action
    pub action: AlertAction,
    /// Whether an operator has resolved this alert
    pub resolved: bool,
}

impl SecurityAlert {
    /// Build an alert, masking the key and user-agent on the way in.
    /// Callers that need the ban side effect hand the unmasked key to the
    /// pipeline separately; it is never stored.
    pub fn new(
        category: impl Into<String>,
        severity: Severity,
        key: &str,
        user_agent: &str,
        description: impl Into<String>,
        details: serde_json::Value,
        action: AlertAction,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            category: category.into(),
            severity,
            key: mask_key(key),
            user_agent: mask_user_agent(user_agent),
            description: description.into(),
            details,
            action,
            resolved: false,
        }
    }
}

/// An observation flowing through the pipeline: either an alert or a
/// lower-level event such as an admission denial or a metric breach.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// Event id
    pub id: String,
    /// Creation timestamp
    pub timestamp: DateTime<Utc>,
    /// Category
    pub category: String,
    /// Severity
    pub severity: Severity,
    /// Masked originating key, empty when not key-bound
    pub key: String,
    /// Description
    pub description: String,
    /// Response action
    pub action: AlertAction,
}

impl SecurityEvent {
    /// Event derived from an alert (same id, shares the alert's identity).
    pub fn from_alert(alert: &SecurityAlert) -> Self {
        Self {
            id: alert.id.clone(),
            timestamp: alert.timestamp,
            category: alert.category.clone(),
            severity: alert.severity,
            key: alert.key.clone(),
            description: alert.description.clone(),
            action: alert.action,
        }
    }
}

/// One sample from the metrics source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSample {
    /// Sample timestamp
    pub timestamp: DateTime<Utc>,
    /// CPU usage percentage
    pub cpu_percent: f64,
    /// Memory usage percentage
    pub memory_percent: f64,
    /// Disk usage percentage
    pub disk_percent: f64,
    /// Network bytes received since start
    pub network_bytes_in: u64,
    /// Network bytes sent since start
    pub network_bytes_out: u64,
    /// Active connections
    pub active_connections: u32,
    /// Errors per second
    pub error_rate: f64,
}

/// Rolling averages over the retained samples
#[derive(Debug, Clone, Default, Serialize)]
pub struct PerformanceAverages {
    /// Average CPU usage percentage
    pub cpu_percent: f64,
    /// Average memory usage percentage
    pub memory_percent: f64,
    /// Average disk usage percentage
    pub disk_percent: f64,
    /// Average error rate
    pub error_rate: f64,
    /// Number of samples the averages cover
    pub sample_count: usize,
}

/// Aggregate snapshot produced by `report()`
#[derive(Debug, Clone, Serialize)]
pub struct SecurityReport {
    /// Report timestamp
    pub generated_at: DateTime<Utc>,
    /// Total events ingested since start
    pub total_events: u64,
    /// Total alerts retained since start
    pub total_alerts: u64,
    /// Unresolved alerts currently retained
    pub active_alerts: usize,
    /// Event counts by severity
    pub events_by_severity: HashMap<String, u64>,
    /// Event counts by category
    pub events_by_category: HashMap<String, u64>,
    /// Rolling performance averages
    pub performance: PerformanceAverages,
    /// Most recent events, newest first
    pub recent_events: Vec<SecurityEvent>,
    /// Most recent alerts, newest first
    pub recent_alerts: Vec<SecurityAlert>,
}
