//! Control plane configuration
//!
//! Every component gets its own config section with serde defaults, composed
//! into [`SecurityConfig`]. Construction-time validation is fatal: a bad
//! pattern, path, or key means no partial initialization.

use crate::utils::{GuardError, Result};
use serde::{Deserialize, Serialize};

/// Top-level configuration for the security control plane
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Admission controller and rate limit settings
    #[serde(default)]
    pub admission: AdmissionConfig,
    /// Pattern detector settings
    #[serde(default)]
    pub detector: DetectorConfig,
    /// Alert pipeline settings
    #[serde(default)]
    pub alerts: AlertConfig,
    /// Audit trail settings
    #[serde(default)]
    pub audit: AuditConfig,
    /// Background scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl SecurityConfig {
    /// Validate the whole configuration. Called once at construction.
    pub fn validate(&self) -> Result<()> {
        self.alerts.validate()?;
        self.audit.validate()?;
        self.scheduler.validate()?;
        Ok(())
    }
}

/// Per-scope rate limits and ban behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Requests per window on the general API path
    #[serde(default = "default_api_limit")]
    pub api_limit: u32,
    /// API window length in seconds
    #[serde(default = "default_window_secs")]
    pub api_window_secs: u64,
    /// Requests per window on the write path (block/transaction submission)
    #[serde(default = "default_mining_limit")]
    pub mining_limit: u32,
    /// Write-path window length in seconds
    #[serde(default = "default_window_secs")]
    pub mining_window_secs: u64,
    /// New connections per window per key
    #[serde(default = "default_connection_limit")]
    pub connection_limit: u32,
    /// Connection window length in seconds
    #[serde(default = "default_window_secs")]
    pub connection_window_secs: u64,
    /// Ban duration applied when an alert's action is `Block`, in seconds
    #[serde(default = "default_ban_secs")]
    pub default_ban_secs: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            api_limit: default_api_limit(),
            api_window_secs: default_window_secs(),
            mining_limit: default_mining_limit(),
            mining_window_secs: default_window_secs(),
            connection_limit: default_connection_limit(),
            connection_window_secs: default_window_secs(),
            default_ban_secs: default_ban_secs(),
        }
    }
}

/// Pattern detector settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Alerts from one key within the pressure window that trigger a ban
    #[serde(default = "default_pressure_threshold")]
    pub pressure_threshold: usize,
    /// Trailing window for per-key alert pressure, in seconds
    #[serde(default = "default_pressure_window_secs")]
    pub pressure_window_secs: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            pressure_threshold: default_pressure_threshold(),
            pressure_window_secs: default_pressure_window_secs(),
        }
    }
}

/// Alert pipeline retention and escalation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Maximum retained security events
    #[serde(default = "default_max_events")]
    pub max_events: usize,
    /// Maximum retained alerts (severity >= medium)
    #[serde(default = "default_max_alerts")]
    pub max_alerts: usize,
    /// Maximum retained performance samples
    #[serde(default = "default_max_metrics")]
    pub max_metrics: usize,
    /// Active alert count above which a storm event is synthesized
    #[serde(default = "default_escalation_threshold")]
    pub escalation_threshold: usize,
    /// Number of recent events/alerts included in a report
    #[serde(default = "default_report_tail")]
    pub report_tail: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            max_events: default_max_events(),
            max_alerts: default_max_alerts(),
            max_metrics: default_max_metrics(),
            escalation_threshold: default_escalation_threshold(),
            report_tail: default_report_tail(),
        }
    }
}

impl AlertConfig {
    fn validate(&self) -> Result<()> {
        if self.max_events == 0 || self.max_alerts == 0 || self.max_metrics == 0 {
            return Err(GuardError::Config(
                "alert buffer capacities must be greater than zero".to_string(),
            ));
        }
        if self.report_tail == 0 {
            return Err(GuardError::Config(
                "report_tail must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Audit trail settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Path of the active audit log file
    #[serde(default = "default_audit_path")]
    pub path: String,
    /// Rotate once the active file exceeds this many bytes
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: u64,
    /// Rotate once the active file is older than this many seconds
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
    /// Hex-encoded 256-bit key for AES-GCM at-rest encryption.
    /// Supplied by the keystore collaborator; `None` disables encryption.
    #[serde(default, skip_serializing)]
    pub encryption_key: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: default_audit_path(),
            max_size_bytes: default_max_size_bytes(),
            max_age_secs: default_max_age_secs(),
            encryption_key: None,
        }
    }
}

impl AuditConfig {
    fn validate(&self) -> Result<()> {
        if self.path.is_empty() {
            return Err(GuardError::Config(
                "audit path must not be empty".to_string(),
            ));
        }
        if self.max_size_bytes == 0 {
            return Err(GuardError::Config(
                "audit max_size_bytes must be greater than zero".to_string(),
            ));
        }
        if let Some(key) = &self.encryption_key {
            let decoded = hex::decode(key)
                .map_err(|e| GuardError::Config(format!("audit encryption_key is not hex: {e}")))?;
            if decoded.len() != 32 {
                return Err(GuardError::Config(format!(
                    "audit encryption_key must be 32 bytes, got {}",
                    decoded.len()
                )));
            }
        }
        Ok(())
    }
}

/// Background scheduler intervals and high-water marks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Metric sampling interval in seconds
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,
    /// Alert escalation check interval in seconds
    #[serde(default = "default_escalation_interval")]
    pub escalation_interval_secs: u64,
    /// State snapshot interval in seconds
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval_secs: u64,
    /// Limiter/ban-list cleanup interval in seconds
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
    /// Directory where snapshots are written
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: String,
    /// Snapshot file name prefix
    #[serde(default = "default_snapshot_prefix")]
    pub snapshot_prefix: String,
    /// CPU usage percentage that raises a medium alert
    #[serde(default = "default_cpu_high_water")]
    pub cpu_high_water: f64,
    /// Memory usage percentage that raises a medium alert
    #[serde(default = "default_memory_high_water")]
    pub memory_high_water: f64,
    /// Disk usage percentage that raises a medium alert
    #[serde(default = "default_disk_high_water")]
    pub disk_high_water: f64,
    /// Error rate (errors per second) that raises a medium alert
    #[serde(default = "default_error_rate_high_water")]
    pub error_rate_high_water: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            metrics_interval_secs: default_metrics_interval(),
            escalation_interval_secs: default_escalation_interval(),
            snapshot_interval_secs: default_snapshot_interval(),
            cleanup_interval_secs: default_cleanup_interval(),
            snapshot_dir: default_snapshot_dir(),
            snapshot_prefix: default_snapshot_prefix(),
            cpu_high_water: default_cpu_high_water(),
            memory_high_water: default_memory_high_water(),
            disk_high_water: default_disk_high_water(),
            error_rate_high_water: default_error_rate_high_water(),
        }
    }
}

impl SchedulerConfig {
    fn validate(&self) -> Result<()> {
        if self.metrics_interval_secs == 0
            || self.escalation_interval_secs == 0
            || self.snapshot_interval_secs == 0
            || self.cleanup_interval_secs == 0
        {
            return Err(GuardError::Config(
                "scheduler intervals must be greater than zero".to_string(),
            ));
        }
        if self.snapshot_prefix.is_empty() {
            return Err(GuardError::Config(
                "snapshot_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_api_limit() -> u32 {
    100
}

fn default_mining_limit() -> u32 {
    10
}

fn default_connection_limit() -> u32 {
    30
}

fn default_window_secs() -> u64 {
    60
}

fn default_ban_secs() -> u64 {
    1800
}

fn default_pressure_threshold() -> usize {
    10
}

fn default_pressure_window_secs() -> u64 {
    300
}

fn default_max_events() -> usize {
    1000
}

fn default_max_alerts() -> usize {
    500
}

fn default_max_metrics() -> usize {
    500
}

fn default_escalation_threshold() -> usize {
    50
}

fn default_report_tail() -> usize {
    5
}

fn default_audit_path() -> String {
    "security_audit.log".to_string()
}

fn default_max_size_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_max_age_secs() -> u64 {
    86_400
}

fn default_metrics_interval() -> u64 {
    30
}

fn default_escalation_interval() -> u64 {
    60
}

fn default_snapshot_interval() -> u64 {
    300
}

fn default_cleanup_interval() -> u64 {
    60
}

fn default_snapshot_dir() -> String {
    ".".to_string()
}

fn default_snapshot_prefix() -> String {
    "nodeguard_state".to_string()
}

fn default_cpu_high_water() -> f64 {
    90.0
}

fn default_memory_high_water() -> f64 {
    90.0
}

fn default_disk_high_water() -> f64 {
    95.0
}

fn default_error_rate_high_water() -> f64 {
    5.0
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Default Tests ====================

    #[test]
    fn test_security_config_default_is_valid() {
        let config = SecurityConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_admission_config_defaults() {
        let config = AdmissionConfig::default();
        assert_eq!(config.api_limit, 100);
        assert_eq!(config.mining_limit, 10);
        assert_eq!(config.connection_limit, 30);
        assert_eq!(config.default_ban_secs, 1800);
    }

    #[test]
    fn test_alert_config_defaults() {
        let config = AlertConfig::default();
        assert_eq!(config.max_events, 1000);
        assert_eq!(config.max_alerts, 500);
        assert_eq!(config.escalation_threshold, 50);
        assert_eq!(config.report_tail, 5);
    }

    // ==================== Deserialization Tests ====================

    #[test]
    fn test_deserialization_fills_defaults() {
        let config: SecurityConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.admission.api_limit, 100);
        assert_eq!(config.audit.path, "security_audit.log");
        assert_eq!(config.scheduler.metrics_interval_secs, 30);
    }

    #[test]
    fn test_deserialization_partial_override() {
        let json = r#"{
            "admission": { "api_limit": 5, "default_ban_secs": 60 },
            "alerts": { "escalation_threshold": 3 }
        }"#;
        let config: SecurityConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.admission.api_limit, 5);
        assert_eq!(config.admission.default_ban_secs, 60);
        assert_eq!(config.admission.mining_limit, 10);
        assert_eq!(config.alerts.escalation_threshold, 3);
    }

    // ==================== Validation Tests ====================

    #[test]
    fn test_validate_rejects_empty_audit_path() {
        let mut config = SecurityConfig::default();
        config.audit.path = String::new();
        assert!(matches!(config.validate(), Err(GuardError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_caps() {
        let mut config = SecurityConfig::default();
        config.alerts.max_events = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        let mut config = SecurityConfig::default();
        config.scheduler.snapshot_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_encryption_key_length() {
        let mut config = SecurityConfig::default();
        config.audit.encryption_key = Some("deadbeef".to_string());
        assert!(config.validate().is_err());

        config.audit.encryption_key = Some("ab".repeat(32));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_encryption_key_not_hex() {
        let mut config = SecurityConfig::default();
        config.audit.encryption_key = Some("zz".repeat(32));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_encryption_key_never_serialized() {
        let mut config = SecurityConfig::default();
        config.audit.encryption_key = Some("ab".repeat(32));
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("encryption_key"));
        assert!(!json.contains(&"ab".repeat(32)));
    }
}
