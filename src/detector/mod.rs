//! Pattern detection: signature matching over request descriptors

mod analyzer;
mod signatures;

pub use analyzer::{Analysis, PatternDetector};
pub use signatures::{Signature, SignatureCatalog, PROXY_SPOOF_HEADERS, SUSPICIOUS_AGENTS};
