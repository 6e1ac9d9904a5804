//! Shared utilities: error handling, logging setup, identifier masking

pub mod error;
pub mod logging;
pub mod mask;

pub use error::{GuardError, Result};
