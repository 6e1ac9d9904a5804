//! Metrics source abstraction
//!
//! The sampler task pulls one [`SystemSample`] per tick from whatever source
//! is injected. The shipped implementation reads real values through
//! `sysinfo` (behind the `metrics` feature); tests inject deterministic
//! sources.

use crate::alerts::SystemSample;
use chrono::Utc;

/// Supplier of system health samples
pub trait MetricsSource: Send + Sync {
    /// Take one sample. Called from the sampler task, never concurrently
    /// with itself.
    fn sample(&self) -> SystemSample;
}

#[cfg(feature = "metrics")]
mod sysinfo_source {
    use super::*;
    use once_cell::sync::Lazy;
    use parking_lot::Mutex;
    use sysinfo::{Disks, Networks, System};

    static SYSTEM: Lazy<Mutex<System>> = Lazy::new(|| Mutex::new(System::new_all()));

    static NETWORKS: Lazy<Mutex<Networks>> =
        Lazy::new(|| Mutex::new(Networks::new_with_refreshed_list()));

    static DISKS: Lazy<Mutex<Disks>> = Lazy::new(|| Mutex::new(Disks::new_with_refreshed_list()));

    /// Real measurements via `sysinfo`
    #[derive(Debug, Default)]
    pub struct SysinfoSource;

    impl MetricsSource for SysinfoSource {
        fn sample(&self) -> SystemSample {
            let cpu_percent = {
                let mut sys = SYSTEM.lock();
                sys.refresh_cpu_usage();
                sys.global_cpu_usage() as f64
            };
            let memory_percent = {
                let mut sys = SYSTEM.lock();
                sys.refresh_memory();
                let total = sys.total_memory();
                if total == 0 {
                    0.0
                } else {
                    sys.used_memory() as f64 / total as f64 * 100.0
                }
            };
            let disk_percent = {
                let mut disks = DISKS.lock();
                disks.refresh_list();
                let (used, total) = disks.iter().fold((0u64, 0u64), |(used, total), d| {
                    (
                        used + (d.total_space() - d.available_space()),
                        total + d.total_space(),
                    )
                });
                if total == 0 {
                    0.0
                } else {
                    used as f64 / total as f64 * 100.0
                }
            };
            let (network_bytes_in, network_bytes_out) = {
                let mut networks = NETWORKS.lock();
                networks.refresh();
                networks.values().fold((0u64, 0u64), |(rx, tx), data| {
                    (rx + data.total_received(), tx + data.total_transmitted())
                })
            };

            SystemSample {
                timestamp: Utc::now(),
                cpu_percent,
                memory_percent,
                disk_percent,
                network_bytes_in,
                network_bytes_out,
                // Connection count and error rate come from the node's own
                // accounting, which this source cannot see.
                active_connections: 0,
                error_rate: 0.0,
            }
        }
    }
}

#[cfg(feature = "metrics")]
pub use sysinfo_source::SysinfoSource;

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use parking_lot::Mutex;

    /// Test source replaying queued samples, then a zeroed default
    pub struct QueuedSource {
        samples: Mutex<Vec<SystemSample>>,
    }

    impl QueuedSource {
        pub fn new(mut samples: Vec<SystemSample>) -> Self {
            samples.reverse();
            Self {
                samples: Mutex::new(samples),
            }
        }
    }

    impl MetricsSource for QueuedSource {
        fn sample(&self) -> SystemSample {
            self.samples.lock().pop().unwrap_or(SystemSample {
                timestamp: Utc::now(),
                cpu_percent: 0.0,
                memory_percent: 0.0,
                disk_percent: 0.0,
                network_bytes_in: 0,
                network_bytes_out: 0,
                active_connections: 0,
                error_rate: 0.0,
            })
        }
    }
}
