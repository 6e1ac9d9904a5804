//! Suspicious request signatures
//!
//! The catalog is fixed at construction: every pattern is compiled up front
//! and a bad pattern fails the whole build (configuration error class, no
//! partial initialization). Matching is case-insensitive throughout.

use crate::alerts::{AlertAction, Severity};
use crate::utils::{GuardError, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// One compiled signature
pub struct Signature {
    /// Stable signature name, used as the alert category
    pub name: &'static str,
    /// Compiled case-insensitive pattern
    pub pattern: Regex,
    /// Severity of a match
    pub severity: Severity,
    /// Human description
    pub description: &'static str,
    /// Response action on match
    pub action: AlertAction,
    /// Matches since start
    hits: AtomicU64,
}

impl Signature {
    fn compile(
        name: &'static str,
        pattern: &str,
        severity: Severity,
        description: &'static str,
        action: AlertAction,
    ) -> Result<Self> {
        let pattern = Regex::new(&format!("(?i){pattern}")).map_err(|source| {
            GuardError::Pattern {
                name: name.to_string(),
                source,
            }
        })?;
        Ok(Self {
            name,
            pattern,
            severity,
            description,
            action,
            hits: AtomicU64::new(0),
        })
    }

    /// Record one match.
    pub(super) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Matches since start.
    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }
}

/// Ordered catalog of URL signatures plus the header and user-agent lists
pub struct SignatureCatalog {
    signatures: Vec<Signature>,
}

/// Headers whose mere presence suggests proxy spoofing. Values are
/// irrelevant; a forged chain header is flagged regardless of content.
pub const PROXY_SPOOF_HEADERS: &[&str] = &[
    "x-forwarded-for",
    "x-forwarded-host",
    "x-original-url",
    "x-rewrite-url",
    "x-originating-ip",
    "x-remote-ip",
    "x-remote-addr",
    "x-client-ip",
    "x-real-ip",
];

/// Substrings identifying attack and reconnaissance tooling in user-agents
pub const SUSPICIOUS_AGENTS: &[&str] = &[
    "sqlmap",
    "nikto",
    "nmap",
    "masscan",
    "metasploit",
    "dirbuster",
    "gobuster",
    "wfuzz",
    "hydra",
    "burpsuite",
    "acunetix",
    "netsparker",
    "zgrab",
];

impl SignatureCatalog {
    /// Compile the default catalog. Fails on the first invalid pattern.
    pub fn new() -> Result<Self> {
        let signatures = vec![
            Signature::compile(
                "sql_injection",
                r"union\s+select|select\s+.*\s+from|insert\s+into|drop\s+table|;\s*--|'\s*or\s+'?1'?\s*=\s*'?1",
                Severity::High,
                "SQL injection attempt in URL",
                AlertAction::Block,
            )?,
            Signature::compile(
                "xss_probe",
                r"<script|javascript:|onerror\s*=|onload\s*=|%3cscript",
                Severity::High,
                "Cross-site scripting probe in URL",
                AlertAction::Block,
            )?,
            Signature::compile(
                "path_traversal",
                r"\.\./|\.\.\\|%2e%2e%2f|%252e",
                Severity::High,
                "Path traversal attempt in URL",
                AlertAction::Block,
            )?,
            Signature::compile(
                "command_injection",
                r"[;&|]\s*(?:cat|ls|rm|wget|curl|sh|bash)\b|\$\(|`",
                Severity::High,
                "Command injection attempt in URL",
                AlertAction::Block,
            )?,
            Signature::compile(
                "config_probe",
                r"/\.env\b|/\.git\b|/wp-admin\b|/phpmyadmin\b|/\.aws\b",
                Severity::Medium,
                "Probe for configuration or admin endpoints",
                AlertAction::Alert,
            )?,
            Signature::compile(
                "wallet_probe",
                r"/wallet/.*(?:dump|export|seed|private)|privatekey|private_key|mnemonic",
                Severity::Critical,
                "Probe for wallet key material",
                AlertAction::Block,
            )?,
        ];
        Ok(Self { signatures })
    }

    /// Signatures in catalog order.
    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// Hit counts by signature name.
    pub fn hit_counts(&self) -> HashMap<String, u64> {
        self.signatures
            .iter()
            .map(|s| (s.name.to_string(), s.hit_count()))
            .collect()
    }
}
