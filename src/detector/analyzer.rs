//! Request analysis against the signature catalog
//!
//! The detector inspects a descriptor in stages (block state, URL, headers,
//! user-agent, per-key alert pressure). Stages after the block check are
//! independent: one request can fire several alerts. The detector never
//! mutates block state itself; every alert is handed to the pipeline, which
//! owns the ban side effect.

use super::signatures::{SignatureCatalog, PROXY_SPOOF_HEADERS, SUSPICIOUS_AGENTS};
use crate::admission::AdmissionController;
use crate::alerts::{AlertAction, AlertPipeline, SecurityAlert, Severity};
use crate::config::DetectorConfig;
use crate::request::RequestDescriptor;
use crate::utils::Result;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Outcome of analyzing one descriptor
#[derive(Debug)]
pub struct Analysis {
    /// True when no signature fired
    pub clean: bool,
    /// Alerts produced, in stage order
    pub alerts: Vec<SecurityAlert>,
}

/// Matches request descriptors against the signature catalog
pub struct PatternDetector {
    catalog: SignatureCatalog,
    config: DetectorConfig,
    controller: Arc<AdmissionController>,
    pipeline: Arc<AlertPipeline>,
    /// Per-key timestamps of recently fired alerts
    pressure: RwLock<HashMap<String, VecDeque<Instant>>>,
}

impl PatternDetector {
    /// Build a detector with the default catalog. Fails if any signature
    /// pattern does not compile.
    pub fn new(
        config: &DetectorConfig,
        controller: Arc<AdmissionController>,
        pipeline: Arc<AlertPipeline>,
    ) -> Result<Self> {
        Ok(Self {
            catalog: SignatureCatalog::new()?,
            config: config.clone(),
            controller,
            pipeline,
            pressure: RwLock::new(HashMap::new()),
        })
    }

    /// Analyze one descriptor. Every produced alert is ingested into the
    /// pipeline before this returns.
    pub fn analyze(&self, descriptor: &RequestDescriptor) -> Analysis {
        let key = descriptor.remote_key.as_str();

        // A key that is already blocked short-circuits everything else.
        if self.controller.is_blocked(key) {
            let alert = SecurityAlert::new(
                "blocked_key_activity",
                Severity::High,
                key,
                &descriptor.user_agent,
                "Request from a currently blocked key",
                serde_json::json!({ "method": descriptor.method, "path": descriptor.path }),
                AlertAction::Alert,
            );
            self.pipeline.ingest(alert.clone(), Some(key));
            return Analysis {
                clean: false,
                alerts: vec![alert],
            };
        }

        let mut alerts = Vec::new();
        let url = descriptor.url();

        for signature in self.catalog.signatures() {
            if signature.pattern.is_match(&url) {
                signature.record_hit();
                debug!(signature = signature.name, key, "signature match");
                alerts.push(SecurityAlert::new(
                    signature.name,
                    signature.severity,
                    key,
                    &descriptor.user_agent,
                    signature.description,
                    serde_json::json!({ "url": url, "method": descriptor.method }),
                    signature.action,
                ));
            }
        }

        let spoof_headers: Vec<&str> = PROXY_SPOOF_HEADERS
            .iter()
            .copied()
            .filter(|h| descriptor.headers.contains_key(*h))
            .collect();
        if !spoof_headers.is_empty() {
            alerts.push(SecurityAlert::new(
                "proxy_header",
                Severity::Medium,
                key,
                &descriptor.user_agent,
                "Proxy-spoofing headers present",
                serde_json::json!({ "headers": spoof_headers }),
                AlertAction::Alert,
            ));
        }

        let agent_lower = descriptor.user_agent.to_lowercase();
        if let Some(tool) = SUSPICIOUS_AGENTS
            .iter()
            .find(|tool| agent_lower.contains(**tool))
        {
            alerts.push(SecurityAlert::new(
                "suspicious_agent",
                Severity::High,
                key,
                &descriptor.user_agent,
                "Known attack tool user-agent",
                serde_json::json!({ "tool": tool }),
                AlertAction::Block,
            ));
        }

        if self.record_pressure(key, alerts.len()) {
            alerts.push(SecurityAlert::new(
                "alert_pressure",
                Severity::Critical,
                key,
                &descriptor.user_agent,
                format!(
                    "Key exceeded {} alerts within the pressure window",
                    self.config.pressure_threshold
                ),
                serde_json::json!({ "threshold": self.config.pressure_threshold }),
                AlertAction::Block,
            ));
        }

        for alert in &alerts {
            self.pipeline.ingest(alert.clone(), Some(key));
        }

        Analysis {
            clean: alerts.is_empty(),
            alerts,
        }
    }

    /// Hit counts by signature name, for the operator surface.
    pub fn signature_hits(&self) -> HashMap<String, u64> {
        self.catalog.hit_counts()
    }

    /// Drop pressure entries for keys with nothing left in-window.
    pub fn cleanup(&self) {
        let window = Duration::from_secs(self.config.pressure_window_secs);
        let cutoff = Instant::now() - window;
        let mut pressure = self.pressure.write();
        pressure.retain(|_, timestamps| {
            timestamps.retain(|&t| t > cutoff);
            !timestamps.is_empty()
        });
    }

    /// Record `fired` new alerts for `key` and report whether the in-window
    /// count has reached the pressure threshold.
    fn record_pressure(&self, key: &str, fired: usize) -> bool {
        if fired == 0 || self.config.pressure_threshold == 0 {
            return false;
        }

        let now = Instant::now();
        let cutoff = now - Duration::from_secs(self.config.pressure_window_secs);

        let mut pressure = self.pressure.write();
        let timestamps = pressure.entry(key.to_string()).or_default();

        timestamps.retain(|&t| t > cutoff);
        for _ in 0..fired {
            timestamps.push_back(now);
        }

        timestamps.len() >= self.config.pressure_threshold
    }
}
