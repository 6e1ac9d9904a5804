//! Alert pipeline: ingestion, bounded retention, escalation, notification
//!
//! Alerts originate in the pattern detector, the metric sampler, and the
//! escalation check. The pipeline owns every retention buffer and is the only
//! component allowed to instruct the admission controller to ban a key.

mod bounded;
mod pipeline;
mod sink;
mod types;

pub use pipeline::{AlertPipeline, STORM_CATEGORY};
pub use sink::{NotificationSink, TracingSink};
pub use types::{
    AlertAction, PerformanceAverages, SecurityAlert, SecurityEvent, SecurityReport, Severity,
    SystemSample,
};

#[cfg(test)]
pub(crate) use sink::test_support;
