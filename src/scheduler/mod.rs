//! Background scheduler
//!
//! Owns the periodic tasks: metric sampling, alert escalation, state
//! snapshots, and the cleanup sweep. Every task runs on its own interval,
//! watches one stop signal, and is joined on shutdown. Tasks only touch the
//! public contracts of the other components, never their private state.

mod metrics;
mod snapshot;

pub use metrics::MetricsSource;
#[cfg(feature = "metrics")]
pub use metrics::SysinfoSource;
pub use snapshot::{write_snapshot, StateSnapshot};

use crate::admission::AdmissionController;
use crate::alerts::{AlertAction, AlertPipeline, SecurityAlert, Severity, SystemSample};
use crate::config::{SchedulerConfig, SecurityConfig};
use crate::detector::PatternDetector;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Runs the periodic maintenance tasks of the control plane
pub struct BackgroundScheduler {
    config: SecurityConfig,
    pipeline: Arc<AlertPipeline>,
    controller: Arc<AdmissionController>,
    detector: Arc<PatternDetector>,
    source: Arc<dyn MetricsSource>,
    stop_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl BackgroundScheduler {
    /// Create a scheduler. Nothing runs until [`start`](Self::start).
    pub fn new(
        config: &SecurityConfig,
        pipeline: Arc<AlertPipeline>,
        controller: Arc<AdmissionController>,
        detector: Arc<PatternDetector>,
        source: Arc<dyn MetricsSource>,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            config: config.clone(),
            pipeline,
            controller,
            detector,
            source,
            stop_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawn all periodic tasks. Idempotent only across a shutdown; calling
    /// twice without one doubles the tasks.
    pub fn start(&self) {
        info!("starting background scheduler");
        let cfg = &self.config.scheduler;

        let mut handles = self.handles.lock();
        handles.push(self.spawn_sampler(Duration::from_secs(cfg.metrics_interval_secs)));
        handles.push(self.spawn_escalator(Duration::from_secs(cfg.escalation_interval_secs)));
        handles.push(self.spawn_snapshotter(Duration::from_secs(cfg.snapshot_interval_secs)));
        handles.push(self.spawn_cleaner(Duration::from_secs(cfg.cleanup_interval_secs)));
    }

    /// Signal every task to stop and wait for them to finish.
    pub async fn shutdown(&self) {
        info!("stopping background scheduler");
        let _ = self.stop_tx.send(true);

        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task panicked");
            }
        }
    }

    fn spawn_sampler(&self, period: Duration) -> JoinHandle<()> {
        let pipeline = self.pipeline.clone();
        let source = self.source.clone();
        let config = self.config.scheduler.clone();
        let mut stop_rx = self.stop_tx.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let sample = source.sample();
                        for alert in high_water_alerts(&sample, &config) {
                            pipeline.ingest(alert, None);
                        }
                        pipeline.record_metric(sample);
                    }
                    _ = stop_rx.changed() => break,
                }
            }
            debug!("metric sampler stopped");
        })
    }

    fn spawn_escalator(&self, period: Duration) -> JoinHandle<()> {
        let pipeline = self.pipeline.clone();
        let mut stop_rx = self.stop_tx.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        pipeline.escalate_tick();
                    }
                    _ = stop_rx.changed() => break,
                }
            }
            debug!("alert escalator stopped");
        })
    }

    fn spawn_snapshotter(&self, period: Duration) -> JoinHandle<()> {
        let pipeline = self.pipeline.clone();
        let controller = self.controller.clone();
        let config = self.config.clone();
        let mut stop_rx = self.stop_tx.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so a snapshot of
            // empty state is not written at every start.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match write_snapshot(
                            &config.scheduler.snapshot_dir,
                            &config.scheduler.snapshot_prefix,
                            &pipeline,
                            &controller,
                            &config,
                        ) {
                            Ok(path) => debug!(path = %path.display(), "state snapshot written"),
                            Err(e) => warn!(error = %e, "state snapshot failed"),
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }
            debug!("snapshotter stopped");
        })
    }

    fn spawn_cleaner(&self, period: Duration) -> JoinHandle<()> {
        let controller = self.controller.clone();
        let detector = self.detector.clone();
        let mut stop_rx = self.stop_tx.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        controller.cleanup();
                        detector.cleanup();
                    }
                    _ = stop_rx.changed() => break,
                }
            }
            debug!("cleanup sweep stopped");
        })
    }
}

/// Medium alerts for every dimension over its high-water mark.
fn high_water_alerts(sample: &SystemSample, config: &SchedulerConfig) -> Vec<SecurityAlert> {
    let breaches: &[(&str, f64, f64)] = &[
        ("cpu_percent", sample.cpu_percent, config.cpu_high_water),
        (
            "memory_percent",
            sample.memory_percent,
            config.memory_high_water,
        ),
        ("disk_percent", sample.disk_percent, config.disk_high_water),
        (
            "error_rate",
            sample.error_rate,
            config.error_rate_high_water,
        ),
    ];

    breaches
        .iter()
        .copied()
        .filter(|(_, value, limit)| value > limit)
        .map(|(dimension, value, limit)| {
            SecurityAlert::new(
                "resource_pressure",
                Severity::Medium,
                "",
                "",
                format!("{dimension} at {value:.1} over high-water mark {limit:.1}"),
                serde_json::json!({ "dimension": dimension, "value": value, "limit": limit }),
                AlertAction::Alert,
            )
        })
        .collect()
}
