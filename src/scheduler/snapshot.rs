//! Periodic state snapshots
//!
//! Serializes the pipeline's buffers and the controller's access lists to a
//! timestamped JSON file. A failed snapshot is logged and skipped; the next
//! tick tries again with fresh state.

use crate::admission::{AdmissionController, BanEntry};
use crate::alerts::{AlertPipeline, SecurityAlert, SecurityEvent};
use crate::config::SecurityConfig;
use crate::utils::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Serialized control plane state
#[derive(Debug, Serialize)]
pub struct StateSnapshot {
    /// Snapshot timestamp
    pub taken_at: DateTime<Utc>,
    /// Retained security events, oldest first
    pub events: Vec<SecurityEvent>,
    /// Retained alerts, oldest first
    pub alerts: Vec<SecurityAlert>,
    /// Active bans
    pub bans: Vec<BanEntry>,
    /// Whitelisted keys
    pub whitelist: Vec<String>,
    /// Configuration in effect (encryption key elided by serde)
    pub config: SecurityConfig,
}

/// Capture current state and write `<dir>/<prefix>_<timestamp>.json`.
/// Returns the written path.
pub fn write_snapshot(
    dir: &str,
    prefix: &str,
    pipeline: &AlertPipeline,
    controller: &AdmissionController,
    config: &SecurityConfig,
) -> Result<PathBuf> {
    let snapshot = StateSnapshot {
        taken_at: Utc::now(),
        events: pipeline.retained_events(),
        alerts: pipeline.retained_alerts(),
        bans: controller.ban_snapshot(),
        whitelist: controller.whitelist_snapshot(),
        config: config.clone(),
    };

    let timestamp = snapshot.taken_at.format("%Y-%m-%d-%H-%M-%S");
    let path = PathBuf::from(dir).join(format!("{prefix}_{timestamp}.json"));

    std::fs::create_dir_all(dir)?;
    let json = serde_json::to_string_pretty(&snapshot)?;
    std::fs::write(&path, json)?;
    Ok(path)
}
