//! Error handling for the control plane
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for the control plane
pub type Result<T> = std::result::Result<T, GuardError>;

/// Main error type for the control plane
#[derive(Error, Debug)]
pub enum GuardError {
    /// Configuration errors - fatal at construction time
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors (audit log writes, rotation, snapshots)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Signature compilation errors
    #[error("Invalid signature pattern '{name}': {source}")]
    Pattern {
        /// Signature name
        name: String,
        /// Underlying regex error
        source: regex::Error,
    },

    /// Crypto errors (audit record encryption/decryption)
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Audit trail errors (chain verification, tail recovery)
    #[error("Audit error: {0}")]
    Audit(String),
}
