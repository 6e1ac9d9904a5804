//! Append-only, hash-chained audit trail with rotation
//!
//! One JSON object per line, each record carrying the hash of its
//! predecessor. Writes are durably flushed before `record` returns; rotation
//! renames the active file with a timestamp suffix and restarts the chain.
//! With an encryption key configured, every line is AES-256-GCM encrypted
//! (random nonce prepended) and base64-wrapped.

use super::record::{verify_chain, AuditEvent, AuditRecord};
use crate::config::AuditConfig;
use crate::utils::mask::mask_key;
use crate::utils::{GuardError, Result};
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// AES-GCM nonce length in bytes
const NONCE_LEN: usize = 12;

/// Mutable trail state under one lock
struct TrailState {
    file: File,
    size: u64,
    opened_at: Instant,
    previous_hash: String,
    records_written: u64,
    rotations: u64,
}

/// Read-only trail counters
#[derive(Debug, Clone, Serialize)]
pub struct AuditStats {
    /// Records written since this instance opened
    pub records_written: u64,
    /// Rotations performed since this instance opened
    pub rotations: u64,
    /// Size of the active file in bytes
    pub active_file_size: u64,
    /// Hash of the last written record, empty when the chain is fresh
    pub last_hash: String,
}

/// Tamper-evident security action log
pub struct AuditTrail {
    path: PathBuf,
    config: AuditConfig,
    cipher: Option<Aes256Gcm>,
    state: Mutex<TrailState>,
}

impl AuditTrail {
    /// Open (or create) the trail at the configured path.
    ///
    /// If the active file already holds records, the chain resumes from its
    /// last line, so a process restart does not break the invariant. An
    /// unreadable tail is logged and the chain restarts.
    pub fn open(config: &AuditConfig) -> Result<Self> {
        let path = PathBuf::from(&config.path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let cipher = match &config.encryption_key {
            Some(key_hex) => {
                let key_bytes = hex::decode(key_hex)
                    .map_err(|e| GuardError::Config(format!("encryption_key is not hex: {e}")))?;
                if key_bytes.len() != 32 {
                    return Err(GuardError::Config(format!(
                        "encryption_key must be 32 bytes, got {}",
                        key_bytes.len()
                    )));
                }
                Some(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes)))
            }
            None => None,
        };

        let (previous_hash, first_timestamp) = Self::reload_tail(&path, cipher.as_ref());

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let size = file.metadata()?.len();

        info!(path = %path.display(), size, resumed = !previous_hash.is_empty(), "audit trail open");

        Ok(Self {
            path,
            config: config.clone(),
            cipher,
            state: Mutex::new(TrailState {
                file,
                size,
                opened_at: Self::backdated_open(first_timestamp),
                previous_hash,
                records_written: 0,
                rotations: 0,
            }),
        })
    }

    /// Append one record and durably flush it.
    ///
    /// Blocks the calling path until the bytes are synced. Errors are
    /// returned, never swallowed; the caller decides whether to proceed
    /// (the control plane is fail-open by policy).
    pub fn record(&self, event: AuditEvent) -> Result<()> {
        let mut state = self.state.lock();

        self.rotate_if_needed(&mut state)?;

        let mut record = AuditRecord {
            timestamp: Utc::now(),
            event_id: uuid::Uuid::new_v4().to_string(),
            event_type: event.event_type,
            actor: mask_key(&event.actor),
            ip: mask_key(&event.ip),
            action: event.action,
            resource: event.resource,
            result: event.result,
            severity: event.severity,
            details: event.details,
            hash: String::new(),
            previous_hash: state.previous_hash.clone(),
        };
        record.hash = record.compute_hash();

        let line = self.encode_line(&record)?;
        state.file.write_all(line.as_bytes())?;
        state.file.write_all(b"\n")?;
        state.file.sync_all()?;

        state.size += line.len() as u64 + 1;
        state.previous_hash = record.hash;
        state.records_written += 1;
        Ok(())
    }

    /// Walk the active file and check the chain invariant.
    /// Returns the number of records verified.
    pub fn verify(&self) -> Result<usize> {
        // Hold the lock so a concurrent write cannot tear the tail line.
        let _state = self.state.lock();
        let records = Self::read_records(&self.path, self.cipher.as_ref())?;
        verify_chain(&records)?;
        Ok(records.len())
    }

    /// Read-only counters.
    pub fn stats(&self) -> AuditStats {
        let state = self.state.lock();
        AuditStats {
            records_written: state.records_written,
            rotations: state.rotations,
            active_file_size: state.size,
            last_hash: state.previous_hash.clone(),
        }
    }

    /// Rotate when the active file is over the size or age threshold.
    /// The renamed file keeps its chain; the fresh file starts a new one.
    fn rotate_if_needed(&self, state: &mut TrailState) -> Result<()> {
        let over_size = state.size >= self.config.max_size_bytes;
        let over_age = state.opened_at.elapsed().as_secs() >= self.config.max_age_secs;
        if !(over_size || over_age) || state.size == 0 {
            return Ok(());
        }

        state.file.sync_all()?;

        let suffix = Utc::now().format("%Y-%m-%d-%H-%M-%S");
        let rotated = PathBuf::from(format!("{}.{suffix}", self.path.display()));
        std::fs::rename(&self.path, &rotated)?;
        info!(rotated = %rotated.display(), size = state.size, "rotated audit log");

        state.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        state.size = 0;
        state.opened_at = Instant::now();
        state.previous_hash.clear();
        state.rotations += 1;
        Ok(())
    }

    fn encode_line(&self, record: &AuditRecord) -> Result<String> {
        let plain = serde_json::to_string(record)?;
        match &self.cipher {
            None => Ok(plain),
            Some(cipher) => {
                let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
                let ciphertext = cipher
                    .encrypt(&nonce, plain.as_bytes())
                    .map_err(|_| GuardError::Crypto("record encryption failed".to_string()))?;
                let mut framed = nonce.to_vec();
                framed.extend_from_slice(&ciphertext);
                Ok(BASE64.encode(framed))
            }
        }
    }

    fn decode_line(line: &str, cipher: Option<&Aes256Gcm>) -> Result<AuditRecord> {
        let plain = match cipher {
            None => line.to_string(),
            Some(cipher) => {
                let framed = BASE64
                    .decode(line.trim())
                    .map_err(|e| GuardError::Crypto(format!("bad base64 frame: {e}")))?;
                if framed.len() < NONCE_LEN {
                    return Err(GuardError::Crypto("frame shorter than nonce".to_string()));
                }
                let (nonce, ciphertext) = framed.split_at(NONCE_LEN);
                let plain = cipher
                    .decrypt(Nonce::from_slice(nonce), ciphertext)
                    .map_err(|_| GuardError::Crypto("record decryption failed".to_string()))?;
                String::from_utf8(plain)
                    .map_err(|e| GuardError::Crypto(format!("decrypted record not utf-8: {e}")))?
            }
        };
        Ok(serde_json::from_str(&plain)?)
    }

    fn read_records(path: &Path, cipher: Option<&Aes256Gcm>) -> Result<Vec<AuditRecord>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(path)?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| Self::decode_line(line, cipher))
            .collect()
    }

    /// Last record's hash and first record's timestamp from the on-disk
    /// active file. The hash resumes the chain; the timestamp backdates the
    /// age clock. Both degrade to fresh-file defaults when the file is
    /// missing, empty, or unreadable.
    fn reload_tail(path: &Path, cipher: Option<&Aes256Gcm>) -> (String, Option<DateTime<Utc>>) {
        if !path.exists() {
            return (String::new(), None);
        }
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read audit tail, chain restarts");
                return (String::new(), None);
            }
        };
        let mut lines = content.lines().filter(|l| !l.trim().is_empty());
        let Some(first_line) = lines.next() else {
            return (String::new(), None);
        };
        let last_line = lines.last().unwrap_or(first_line);

        let first_timestamp = Self::decode_line(first_line, cipher)
            .ok()
            .map(|record| record.timestamp);
        match Self::decode_line(last_line, cipher) {
            Ok(record) => (record.hash, first_timestamp),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "audit tail unreadable, chain restarts");
                (String::new(), first_timestamp)
            }
        }
    }

    /// Age clock for a reopened file: anchored at its first record, so a file
    /// already over the age threshold rotates on the next write instead of
    /// getting a fresh clock every restart.
    fn backdated_open(first_timestamp: Option<DateTime<Utc>>) -> Instant {
        first_timestamp
            .and_then(|ts| (Utc::now() - ts).to_std().ok())
            .and_then(|age| Instant::now().checked_sub(age))
            .unwrap_or_else(Instant::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::Severity;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> AuditConfig {
        AuditConfig {
            path: dir
                .path()
                .join("audit.log")
                .to_string_lossy()
                .into_owned(),
            ..AuditConfig::default()
        }
    }

    fn event(n: u32) -> AuditEvent {
        AuditEvent::new(
            "admission",
            format!("allow_api_{n}"),
            "node-operator-1",
            "192.168.14.77",
            "/api/blocks",
            "allowed",
            Severity::Low,
        )
    }

    // ==================== Chain Tests ====================

    #[test]
    fn test_chain_links_consecutive_records() {
        let dir = TempDir::new().unwrap();
        let trail = AuditTrail::open(&config(&dir)).unwrap();

        for n in 0..5 {
            trail.record(event(n)).unwrap();
        }

        let records = AuditTrail::read_records(Path::new(&config(&dir).path), None).unwrap();
        assert_eq!(records.len(), 5);
        assert!(records[0].previous_hash.is_empty());
        for window in records.windows(2) {
            assert_eq!(window[1].previous_hash, window[0].compute_hash());
        }
        assert_eq!(trail.verify().unwrap(), 5);
    }

    #[test]
    fn test_masking_applied_before_serialization() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        let trail = AuditTrail::open(&cfg).unwrap();
        trail.record(event(0)).unwrap();

        let content = std::fs::read_to_string(&cfg.path).unwrap();
        assert!(!content.contains("192.168.14.77"));
        assert!(!content.contains("node-operator-1"));
        assert!(content.contains("192.168.***"));
    }

    #[test]
    fn test_verify_detects_tampering() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        let trail = AuditTrail::open(&cfg).unwrap();
        for n in 0..3 {
            trail.record(event(n)).unwrap();
        }
        drop(trail);

        let tampered = std::fs::read_to_string(&cfg.path)
            .unwrap()
            .replace("allowed", "denied");
        std::fs::write(&cfg.path, tampered).unwrap();

        let trail = AuditTrail::open(&cfg).unwrap();
        assert!(trail.verify().is_err());
    }

    // ==================== Rotation Tests ====================

    #[test]
    fn test_size_rotation_restarts_chain() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.max_size_bytes = 1; // every write after the first rotates

        let trail = AuditTrail::open(&cfg).unwrap();
        trail.record(event(0)).unwrap();
        trail.record(event(1)).unwrap();

        assert_eq!(trail.stats().rotations, 1);

        // Fresh file holds exactly the second record with an empty previous
        let records = AuditTrail::read_records(Path::new(&cfg.path), None).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].previous_hash.is_empty());

        // The rotated file is present alongside
        let rotated = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("audit.log."))
            .count();
        assert_eq!(rotated, 1);
    }

    #[test]
    fn test_over_age_file_rotates_after_reopen() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.max_age_secs = 3600;

        // Seed an active file whose first record is two hours old
        let mut stale = AuditRecord {
            timestamp: Utc::now() - chrono::Duration::hours(2),
            event_id: uuid::Uuid::new_v4().to_string(),
            event_type: "admission".to_string(),
            actor: "node-ope***".to_string(),
            ip: "192.168.***".to_string(),
            action: "allow_api".to_string(),
            resource: "/api/blocks".to_string(),
            result: "allowed".to_string(),
            severity: Severity::Low,
            details: serde_json::Value::Null,
            hash: String::new(),
            previous_hash: String::new(),
        };
        stale.hash = stale.compute_hash();
        let line = serde_json::to_string(&stale).unwrap();
        std::fs::write(&cfg.path, format!("{line}\n")).unwrap();

        // The reopened trail inherits the file's age, so the first write
        // rotates instead of appending to an over-age file.
        let trail = AuditTrail::open(&cfg).unwrap();
        trail.record(event(0)).unwrap();

        assert_eq!(trail.stats().rotations, 1);
        let records = AuditTrail::read_records(Path::new(&cfg.path), None).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].previous_hash.is_empty());
    }

    // ==================== Restart Tests ====================

    #[test]
    fn test_reopen_resumes_chain_from_tail() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);

        {
            let trail = AuditTrail::open(&cfg).unwrap();
            trail.record(event(0)).unwrap();
            trail.record(event(1)).unwrap();
        }

        let trail = AuditTrail::open(&cfg).unwrap();
        trail.record(event(2)).unwrap();

        // One unbroken chain across the restart
        assert_eq!(trail.verify().unwrap(), 3);
    }

    // ==================== Encryption Tests ====================

    #[test]
    fn test_encrypted_trail_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.encryption_key = Some("a1".repeat(32));

        let trail = AuditTrail::open(&cfg).unwrap();
        for n in 0..3 {
            trail.record(event(n)).unwrap();
        }
        assert_eq!(trail.verify().unwrap(), 3);

        // On-disk lines are opaque
        let content = std::fs::read_to_string(&cfg.path).unwrap();
        assert!(!content.contains("event_id"));
        assert!(!content.contains("allowed"));
    }

    #[test]
    fn test_encrypted_reopen_resumes_chain() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.encryption_key = Some("b2".repeat(32));

        {
            let trail = AuditTrail::open(&cfg).unwrap();
            trail.record(event(0)).unwrap();
        }
        let trail = AuditTrail::open(&cfg).unwrap();
        trail.record(event(1)).unwrap();
        assert_eq!(trail.verify().unwrap(), 2);
    }

    #[test]
    fn test_wrong_key_fails_verification() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.encryption_key = Some("c3".repeat(32));
        {
            let trail = AuditTrail::open(&cfg).unwrap();
            trail.record(event(0)).unwrap();
        }

        cfg.encryption_key = Some("d4".repeat(32));
        let trail = AuditTrail::open(&cfg).unwrap();
        assert!(trail.verify().is_err());
    }

    // ==================== Stats Tests ====================

    #[test]
    fn test_stats_track_writes() {
        let dir = TempDir::new().unwrap();
        let trail = AuditTrail::open(&config(&dir)).unwrap();
        trail.record(event(0)).unwrap();
        trail.record(event(1)).unwrap();

        let stats = trail.stats();
        assert_eq!(stats.records_written, 2);
        assert_eq!(stats.rotations, 0);
        assert!(stats.active_file_size > 0);
        assert_eq!(stats.last_hash.len(), 64);
    }
}
