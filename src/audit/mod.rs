//! Tamper-evident audit trail
//!
//! Every admission decision, detection, and ban lands here as one JSON line
//! with a SHA-256 hash chained to its predecessor. Files rotate by size or
//! age; each rotated file carries its own complete chain. At-rest encryption
//! with AES-256-GCM is optional and keyed from configuration.

mod record;
mod trail;

pub use record::{verify_chain, AuditEvent, AuditRecord};
pub use trail::{AuditStats, AuditTrail};
