//! # NodeGuard
//!
//! Embeddable security control plane for a blockchain node's HTTP surface.
//! Admission control, attack pattern detection, alerting, and a
//! tamper-evident audit trail behind one facade.
//!
//! ## Components
//!
//! - **Admission**: per-scope sliding-window rate limits plus a blacklist
//!   and whitelist, evaluated in list-first order
//! - **Detector**: a signature catalog matched against the URL, headers,
//!   and user-agent of each request, with per-key alert pressure
//! - **Alerts**: bounded retention buffers, severity routing, threshold
//!   escalation, and the ban side effect
//! - **Audit**: hash-chained JSON-line trail with rotation and optional
//!   AES-256-GCM at-rest encryption
//! - **Scheduler**: background sampling, escalation, snapshot, and cleanup
//!   tasks on cancellable intervals
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nodeguard::{LimiterScope, RequestDescriptor, SecurityConfig, SecurityPlane};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let plane = SecurityPlane::new(SecurityConfig::default())?;
//!     plane.start();
//!
//!     let request = RequestDescriptor::new("GET", "/api/blocks", "203.0.113.7")
//!         .with_user_agent("curl/8.5.0");
//!     let inspection = plane.inspect(LimiterScope::Api, &request);
//!     if !inspection.permitted() {
//!         // reject the request
//!     }
//!
//!     plane.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod admission;
pub mod alerts;
pub mod audit;
pub mod config;
pub mod detector;
pub mod plane;
pub mod request;
pub mod scheduler;
pub mod utils;

pub use admission::{AdmissionController, BanEntry, LimiterScope, SlidingWindowLimiter};
pub use alerts::{
    AlertAction, AlertPipeline, NotificationSink, SecurityAlert, SecurityEvent, SecurityReport,
    Severity, SystemSample, TracingSink,
};
pub use audit::{verify_chain, AuditEvent, AuditRecord, AuditStats, AuditTrail};
pub use config::SecurityConfig;
pub use detector::{Analysis, PatternDetector};
pub use plane::{Inspection, SecurityPlane};
pub use request::RequestDescriptor;
pub use scheduler::{BackgroundScheduler, MetricsSource};
pub use utils::{GuardError, Result};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
