//! Irreversible masking of identifiers before they are logged or persisted
//!
//! Actor ids, network addresses, and user-agents are truncated to a short
//! prefix. This is a logging contract: nothing downstream of these helpers
//! ever sees the full value.

/// Prefix length retained for actor ids and network addresses
const KEY_PREFIX_LEN: usize = 8;

/// Prefix length retained for user-agent strings
const AGENT_PREFIX_LEN: usize = 24;

/// Mask an actor id or network address, keeping a short prefix.
pub fn mask_key(key: &str) -> String {
    truncate_masked(key, KEY_PREFIX_LEN)
}

/// Mask a user-agent string, keeping a slightly longer prefix so the tool
/// family remains recognizable in reports.
pub fn mask_user_agent(agent: &str) -> String {
    truncate_masked(agent, AGENT_PREFIX_LEN)
}

fn truncate_masked(value: &str, prefix_len: usize) -> String {
    if value.is_empty() {
        return String::new();
    }
    // char_indices keeps the cut on a UTF-8 boundary
    match value.char_indices().nth(prefix_len) {
        Some((idx, _)) => format!("{}***", &value[..idx]),
        None => format!("{value}***"),
    }
}
