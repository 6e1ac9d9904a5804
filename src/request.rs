//! Request descriptor consumed from the HTTP layer
//!
//! The control plane never mutates a descriptor; it is a read-only view of an
//! inbound request handed over by the routing collaborator.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Read-only view of an inbound request
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// HTTP method
    pub method: String,
    /// Request path
    pub path: String,
    /// Raw query string, empty when absent
    pub query: String,
    /// Header map, lowercase names
    pub headers: HashMap<String, String>,
    /// Remote key: client IP or node id
    pub remote_key: String,
    /// User-agent header value, empty when absent
    pub user_agent: String,
    /// Arrival timestamp
    pub timestamp: DateTime<Utc>,
}

impl RequestDescriptor {
    /// Build a descriptor with the current timestamp.
    pub fn new(method: impl Into<String>, path: impl Into<String>, remote_key: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            query: String::new(),
            headers: HashMap::new(),
            remote_key: remote_key.into(),
            user_agent: String::new(),
            timestamp: Utc::now(),
        }
    }

    /// Attach a raw query string.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// Attach a header. Names are lowercased to match the HTTP layer's map.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Attach a user-agent.
    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Path and query joined the way they appear on the wire.
    pub fn url(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query)
        }
    }
}
