//! Security plane facade
//!
//! One entry point wiring the admission controller, pattern detector, alert
//! pipeline, audit trail, and background scheduler together. The HTTP layer
//! talks to [`SecurityPlane`] only: one `inspect` call per request, plus the
//! operator surface for bans, whitelisting, and reports.

use crate::admission::{AdmissionController, BanEntry, LimiterScope};
use crate::alerts::{
    AlertAction, AlertPipeline, NotificationSink, SecurityAlert, SecurityReport, Severity,
    TracingSink,
};
use crate::audit::{AuditEvent, AuditStats, AuditTrail};
use crate::config::SecurityConfig;
use crate::detector::{Analysis, PatternDetector};
use crate::request::RequestDescriptor;
use crate::scheduler::{BackgroundScheduler, MetricsSource};
use crate::utils::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Combined verdict for one inspected request
#[derive(Debug)]
pub struct Inspection {
    /// Whether admission allowed the request
    pub admitted: bool,
    /// Detection outcome, always produced even for denied requests
    pub analysis: Analysis,
}

impl Inspection {
    /// Whether the request should be served: admitted and nothing fired.
    pub fn permitted(&self) -> bool {
        self.admitted && self.analysis.clean
    }
}

/// The assembled security control plane
pub struct SecurityPlane {
    config: SecurityConfig,
    controller: Arc<AdmissionController>,
    pipeline: Arc<AlertPipeline>,
    detector: Arc<PatternDetector>,
    trail: Arc<AuditTrail>,
    scheduler: BackgroundScheduler,
}

impl SecurityPlane {
    /// Assemble the plane with the default sink and metrics source.
    /// Validates the configuration and opens the audit trail; any failure
    /// aborts construction.
    pub fn new(config: SecurityConfig) -> Result<Self> {
        Self::with_collaborators(config, Arc::new(TracingSink), default_source())
    }

    /// Assemble the plane with injected collaborators. Used directly by
    /// embedders that route notifications elsewhere or supply their own
    /// metrics accounting.
    pub fn with_collaborators(
        config: SecurityConfig,
        sink: Arc<dyn NotificationSink>,
        source: Arc<dyn MetricsSource>,
    ) -> Result<Self> {
        config.validate()?;

        let controller = Arc::new(AdmissionController::new(&config.admission));
        let pipeline = Arc::new(AlertPipeline::new(
            &config.alerts,
            Duration::from_secs(config.admission.default_ban_secs),
            controller.clone(),
            sink,
        ));
        let detector = Arc::new(PatternDetector::new(
            &config.detector,
            controller.clone(),
            pipeline.clone(),
        )?);
        let trail = Arc::new(AuditTrail::open(&config.audit)?);
        let scheduler = BackgroundScheduler::new(
            &config,
            pipeline.clone(),
            controller.clone(),
            detector.clone(),
            source,
        );

        info!("security plane assembled");
        Ok(Self {
            config,
            controller,
            pipeline,
            detector,
            trail,
            scheduler,
        })
    }

    /// Start the background tasks. Call once after construction.
    pub fn start(&self) {
        self.scheduler.start();
    }

    /// Stop the background tasks and wait for them.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }

    /// Inspect one request: admission first, then detection, then audit.
    ///
    /// Detection runs even when admission denies, so a throttled attacker
    /// still accumulates pressure and signature hits. Audit failures are
    /// logged and never block the verdict.
    pub fn inspect(&self, scope: LimiterScope, descriptor: &RequestDescriptor) -> Inspection {
        let key = descriptor.remote_key.as_str();
        let admitted = self.controller.allow(scope, key);

        if !admitted {
            self.pipeline.ingest(
                SecurityAlert::new(
                    "admission_denied",
                    Severity::Low,
                    key,
                    &descriptor.user_agent,
                    format!("Request denied on the {scope} scope"),
                    serde_json::json!({ "scope": scope.to_string(), "path": descriptor.path }),
                    AlertAction::Log,
                ),
                None,
            );
        }

        let analysis = self.detector.analyze(descriptor);

        self.audit(
            AuditEvent::new(
                "admission",
                format!("inspect_{scope}"),
                key,
                key,
                descriptor.url(),
                if admitted { "allowed" } else { "denied" },
                if admitted { Severity::Low } else { Severity::Medium },
            )
            .with_details(serde_json::json!({ "method": descriptor.method })),
        );

        if !analysis.clean {
            let categories: Vec<&str> =
                analysis.alerts.iter().map(|a| a.category.as_str()).collect();
            self.audit(
                AuditEvent::new(
                    "detection",
                    "analyze",
                    key,
                    key,
                    descriptor.url(),
                    "detected",
                    analysis
                        .alerts
                        .iter()
                        .map(|a| a.severity)
                        .max()
                        .unwrap_or(Severity::Low),
                )
                .with_details(serde_json::json!({ "categories": categories })),
            );
        }

        Inspection { admitted, analysis }
    }

    /// Ban a key on the operator surface.
    pub fn ban(&self, key: &str, duration: Duration, reason: &str, severity: Severity) {
        self.controller.ban(key, duration, reason, severity);
        self.audit(
            AuditEvent::new("ban", "ban_key", "operator", key, key, "banned", severity)
                .with_details(serde_json::json!({
                    "reason": reason,
                    "duration_secs": duration.as_secs(),
                })),
        );
    }

    /// Lift a ban. Returns whether one existed.
    pub fn unban(&self, key: &str) -> bool {
        let removed = self.controller.unban(key);
        if removed {
            self.audit(AuditEvent::new(
                "ban",
                "unban_key",
                "operator",
                key,
                key,
                "unbanned",
                Severity::Low,
            ));
        }
        removed
    }

    /// Whitelist a key.
    pub fn add_to_whitelist(&self, key: &str) {
        self.controller.add_to_whitelist(key);
        self.audit(AuditEvent::new(
            "whitelist",
            "add_key",
            "operator",
            key,
            key,
            "whitelisted",
            Severity::Low,
        ));
    }

    /// Remove a key from the whitelist. Returns whether it was present.
    pub fn remove_from_whitelist(&self, key: &str) -> bool {
        self.controller.remove_from_whitelist(key)
    }

    /// Mark an alert resolved.
    pub fn resolve_alert(&self, alert_id: &str) -> bool {
        self.pipeline.resolve(alert_id)
    }

    /// Aggregate security report.
    pub fn report(&self) -> SecurityReport {
        self.pipeline.report()
    }

    /// Active bans.
    pub fn ban_snapshot(&self) -> Vec<BanEntry> {
        self.controller.ban_snapshot()
    }

    /// Signature hit counts.
    pub fn signature_hits(&self) -> HashMap<String, u64> {
        self.detector.signature_hits()
    }

    /// Audit trail counters.
    pub fn audit_stats(&self) -> AuditStats {
        self.trail.stats()
    }

    /// Verify the active audit file's hash chain. Returns the number of
    /// records checked.
    pub fn verify_audit(&self) -> Result<usize> {
        self.trail.verify()
    }

    /// Configuration in effect.
    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    /// Fail-open audit write: a trail error degrades auditing, never the
    /// data path.
    fn audit(&self, event: AuditEvent) {
        if let Err(e) = self.trail.record(event) {
            warn!(error = %e, "audit write failed");
        }
    }
}

#[cfg(feature = "metrics")]
fn default_source() -> Arc<dyn MetricsSource> {
    Arc::new(crate::scheduler::SysinfoSource)
}

#[cfg(not(feature = "metrics"))]
fn default_source() -> Arc<dyn MetricsSource> {
    use crate::alerts::SystemSample;
    use chrono::Utc;

    /// Zeroed samples when no real source is compiled in
    struct IdleSource;

    impl MetricsSource for IdleSource {
        fn sample(&self) -> SystemSample {
            SystemSample {
                timestamp: Utc::now(),
                cpu_percent: 0.0,
                memory_percent: 0.0,
                disk_percent: 0.0,
                network_bytes_in: 0,
                network_bytes_out: 0,
                active_connections: 0,
                error_rate: 0.0,
            }
        }
    }

    Arc::new(IdleSource)
}
