//! Admission control: sliding-window rate limits, blacklist, whitelist

mod controller;
mod limiter;
mod types;

pub use controller::AdmissionController;
pub use limiter::SlidingWindowLimiter;
pub use types::{BanEntry, LimiterScope};
