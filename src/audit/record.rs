//! Audit record type and hash chain helpers

use crate::alerts::Severity;
use crate::utils::{GuardError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Input to [`AuditTrail::record`](super::AuditTrail::record).
///
/// `actor` and `ip` arrive unmasked; the trail masks them before anything is
/// serialized.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// Event type, e.g. "admission", "detection", "ban"
    pub event_type: String,
    /// What was done
    pub action: String,
    /// Who did it (unmasked, masked on write)
    pub actor: String,
    /// Originating address (unmasked, masked on write)
    pub ip: String,
    /// What it was done to
    pub resource: String,
    /// Outcome, e.g. "allowed", "denied", "detected"
    pub result: String,
    /// Severity of the action
    pub severity: Severity,
    /// Structured details
    pub details: serde_json::Value,
}

impl AuditEvent {
    /// Convenience constructor with empty details.
    pub fn new(
        event_type: impl Into<String>,
        action: impl Into<String>,
        actor: impl Into<String>,
        ip: impl Into<String>,
        resource: impl Into<String>,
        result: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            action: action.into(),
            actor: actor.into(),
            ip: ip.into(),
            resource: resource.into(),
            result: result.into(),
            severity,
            details: serde_json::Value::Null,
        }
    }

    /// Attach structured details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// One line of the audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Write timestamp
    pub timestamp: DateTime<Utc>,
    /// Record id
    pub event_id: String,
    /// Event type
    pub event_type: String,
    /// Masked actor
    pub actor: String,
    /// Masked originating address
    pub ip: String,
    /// Action
    pub action: String,
    /// Resource
    pub resource: String,
    /// Outcome
    pub result: String,
    /// Severity
    pub severity: Severity,
    /// Structured details
    pub details: serde_json::Value,
    /// SHA-256 over every field except this one, hex-encoded
    pub hash: String,
    /// Hash of the immediately preceding record, empty for the first
    pub previous_hash: String,
}

impl AuditRecord {
    /// Content hash over every field except `hash` itself. Covers
    /// `previous_hash`, so each link commits to the whole prefix.
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.timestamp.to_rfc3339().as_bytes());
        hasher.update(self.event_id.as_bytes());
        hasher.update(self.event_type.as_bytes());
        hasher.update(self.actor.as_bytes());
        hasher.update(self.ip.as_bytes());
        hasher.update(self.action.as_bytes());
        hasher.update(self.resource.as_bytes());
        hasher.update(self.result.as_bytes());
        hasher.update(self.severity.to_string().as_bytes());
        hasher.update(self.details.to_string().as_bytes());
        hasher.update(self.previous_hash.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Verify the chain invariant over records from one file, oldest first.
///
/// Checks that the first record's `previous_hash` is empty, every stored
/// hash matches its recomputation, and every link points at its predecessor.
pub fn verify_chain(records: &[AuditRecord]) -> Result<()> {
    let mut expected_previous = String::new();
    for (index, record) in records.iter().enumerate() {
        if record.previous_hash != expected_previous {
            return Err(GuardError::Audit(format!(
                "record {index}: previous_hash does not match predecessor"
            )));
        }
        let recomputed = record.compute_hash();
        if record.hash != recomputed {
            return Err(GuardError::Audit(format!(
                "record {index}: stored hash does not match content"
            )));
        }
        expected_previous = record.hash.clone();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(previous_hash: &str) -> AuditRecord {
        let mut record = AuditRecord {
            timestamp: Utc::now(),
            event_id: uuid::Uuid::new_v4().to_string(),
            event_type: "admission".to_string(),
            actor: "node-1***".to_string(),
            ip: "10.0.0.***".to_string(),
            action: "allow_api".to_string(),
            resource: "/api/blocks".to_string(),
            result: "allowed".to_string(),
            severity: Severity::Low,
            details: serde_json::Value::Null,
            hash: String::new(),
            previous_hash: previous_hash.to_string(),
        };
        record.hash = record.compute_hash();
        record
    }

    #[test]
    fn test_hash_is_deterministic() {
        let r = record("");
        assert_eq!(r.compute_hash(), r.compute_hash());
        assert_eq!(r.hash.len(), 64);
    }

    #[test]
    fn test_hash_covers_content() {
        let r = record("");
        let mut tampered = r.clone();
        tampered.result = "denied".to_string();
        assert_ne!(r.compute_hash(), tampered.compute_hash());
    }

    #[test]
    fn test_hash_covers_previous_hash() {
        let a = record("");
        let b = record(&a.hash);
        let mut unlinked = b.clone();
        unlinked.previous_hash = String::new();
        assert_ne!(b.compute_hash(), unlinked.compute_hash());
    }

    #[test]
    fn test_verify_chain_accepts_valid() {
        let a = record("");
        let b = record(&a.hash);
        let c = record(&b.hash);
        assert!(verify_chain(&[a, b, c]).is_ok());
    }

    #[test]
    fn test_verify_chain_rejects_tampering() {
        let a = record("");
        let mut b = record(&a.hash);
        b.result = "tampered".to_string();
        assert!(verify_chain(&[a, b]).is_err());
    }

    #[test]
    fn test_verify_chain_rejects_nonempty_first_previous() {
        let a = record("deadbeef");
        assert!(verify_chain(&[a]).is_err());
    }

    #[test]
    fn test_verify_chain_empty_is_ok() {
        assert!(verify_chain(&[]).is_ok());
    }
}
