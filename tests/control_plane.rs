//! End-to-end tests exercising the assembled security plane through its
//! public facade only.

use nodeguard::{
    LimiterScope, RequestDescriptor, SecurityConfig, SecurityPlane, Severity,
};
use std::time::Duration;
use tempfile::TempDir;

fn config_in(dir: &TempDir) -> SecurityConfig {
    let mut config = SecurityConfig::default();
    config.audit.path = dir
        .path()
        .join("audit.log")
        .to_string_lossy()
        .into_owned();
    config.scheduler.snapshot_dir = dir.path().to_string_lossy().into_owned();
    config
}

// ==================== Attack Flow Tests ====================

#[test]
fn test_injection_attack_blocks_key_end_to_end() {
    let dir = TempDir::new().unwrap();
    let plane = SecurityPlane::new(config_in(&dir)).unwrap();

    let attack = RequestDescriptor::new("GET", "/api/wallets", "198.51.100.10")
        .with_query("id=1 union select balance from wallets");
    let inspection = plane.inspect(LimiterScope::Api, &attack);
    assert!(!inspection.permitted());
    assert!(!inspection.analysis.clean);

    // The ban applied by the pipeline denies the very next request
    let followup = RequestDescriptor::new("GET", "/health", "198.51.100.10");
    let inspection = plane.inspect(LimiterScope::Api, &followup);
    assert!(!inspection.admitted);
    assert!(inspection
        .analysis
        .alerts
        .iter()
        .any(|a| a.category == "blocked_key_activity"));

    let bans = plane.ban_snapshot();
    assert_eq!(bans.len(), 1);
    assert_eq!(bans[0].key, "198.51.100.10");
}

#[test]
fn test_scanner_user_agent_banned_and_masked() {
    let dir = TempDir::new().unwrap();
    let plane = SecurityPlane::new(config_in(&dir)).unwrap();

    let probe = RequestDescriptor::new("GET", "/api/blocks", "198.51.100.20")
        .with_user_agent("sqlmap/1.7.2#stable (http://sqlmap.org)");
    let inspection = plane.inspect(LimiterScope::Api, &probe);
    assert!(!inspection.permitted());

    // Retained alerts never carry the full key or agent
    let report = plane.report();
    let alert = report
        .recent_alerts
        .iter()
        .find(|a| a.category == "suspicious_agent")
        .unwrap();
    assert!(alert.key.ends_with("***"));
    assert!(!alert.key.contains("100.20"));
    assert!(alert.user_agent.ends_with("***"));
}

#[test]
fn test_clean_traffic_stays_clean() {
    let dir = TempDir::new().unwrap();
    let plane = SecurityPlane::new(config_in(&dir)).unwrap();

    for path in ["/health", "/api/blocks", "/api/peers"] {
        let desc = RequestDescriptor::new("GET", path, "198.51.100.30")
            .with_user_agent("Mozilla/5.0 (X11; Linux x86_64) Firefox/121.0");
        assert!(plane.inspect(LimiterScope::Api, &desc).permitted());
    }
    assert!(plane.ban_snapshot().is_empty());
    assert_eq!(plane.report().total_alerts, 0);
}

// ==================== Rate Limit Tests ====================

#[test]
fn test_window_refills_after_expiry() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.admission.api_limit = 2;
    config.admission.api_window_secs = 1;
    let plane = SecurityPlane::new(config).unwrap();

    let desc = RequestDescriptor::new("GET", "/api/blocks", "198.51.100.40");
    assert!(plane.inspect(LimiterScope::Api, &desc).admitted);
    assert!(plane.inspect(LimiterScope::Api, &desc).admitted);
    assert!(!plane.inspect(LimiterScope::Api, &desc).admitted);

    std::thread::sleep(Duration::from_millis(1100));
    assert!(plane.inspect(LimiterScope::Api, &desc).admitted);
}

#[test]
fn test_scopes_throttle_independently() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.admission.mining_limit = 1;
    let plane = SecurityPlane::new(config).unwrap();

    let desc = RequestDescriptor::new("POST", "/api/mine", "198.51.100.50");
    assert!(plane.inspect(LimiterScope::Mining, &desc).admitted);
    assert!(!plane.inspect(LimiterScope::Mining, &desc).admitted);
    // The API scope is untouched by mining exhaustion
    assert!(plane.inspect(LimiterScope::Api, &desc).admitted);
}

// ==================== Whitelist Tests ====================

#[test]
fn test_whitelist_overrides_ban_and_limits() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.admission.api_limit = 1;
    let plane = SecurityPlane::new(config).unwrap();

    plane.ban(
        "198.51.100.60",
        Duration::from_secs(600),
        "manual",
        Severity::High,
    );
    plane.add_to_whitelist("198.51.100.60");

    let desc = RequestDescriptor::new("GET", "/api/blocks", "198.51.100.60");
    for _ in 0..5 {
        assert!(plane.inspect(LimiterScope::Api, &desc).admitted);
    }
}

// ==================== Audit Tests ====================

#[test]
fn test_audit_chain_verifies_after_mixed_activity() {
    let dir = TempDir::new().unwrap();
    let plane = SecurityPlane::new(config_in(&dir)).unwrap();

    plane.inspect(
        LimiterScope::Api,
        &RequestDescriptor::new("GET", "/health", "198.51.100.70"),
    );
    plane.inspect(
        LimiterScope::Api,
        &RequestDescriptor::new("GET", "/f", "198.51.100.71").with_query("p=../../etc/passwd"),
    );
    plane.ban(
        "198.51.100.72",
        Duration::from_secs(60),
        "manual",
        Severity::Medium,
    );
    plane.unban("198.51.100.72");

    let checked = plane.verify_audit().unwrap();
    assert_eq!(checked as u64, plane.audit_stats().records_written);
    assert!(checked >= 5);
}

#[test]
fn test_encrypted_audit_round_trip() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.audit.encryption_key = Some("ab".repeat(32));
    let plane = SecurityPlane::new(config).unwrap();

    plane.inspect(
        LimiterScope::Api,
        &RequestDescriptor::new("GET", "/api", "198.51.100.80").with_query("q=union select 1"),
    );

    // Ciphertext on disk, no plaintext fields
    let raw = std::fs::read_to_string(dir.path().join("audit.log")).unwrap();
    assert!(!raw.contains("admission"));
    assert!(!raw.contains("198.51.100"));

    assert!(plane.verify_audit().unwrap() >= 2);
}

#[test]
fn test_audit_records_mask_actor() {
    let dir = TempDir::new().unwrap();
    let plane = SecurityPlane::new(config_in(&dir)).unwrap();

    plane.inspect(
        LimiterScope::Api,
        &RequestDescriptor::new("GET", "/health", "192.168.100.250"),
    );

    let raw = std::fs::read_to_string(dir.path().join("audit.log")).unwrap();
    assert!(!raw.contains("192.168.100.250"));
    assert!(raw.contains("192.168."));
}

// ==================== Escalation Tests ====================

#[tokio::test(start_paused = true)]
async fn test_alert_storm_escalates_through_scheduler() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.alerts.escalation_threshold = 3;
    config.scheduler.escalation_interval_secs = 1;
    let plane = SecurityPlane::new(config).unwrap();

    // Distinct keys so per-key bans do not collapse the volume
    for i in 0..5 {
        let desc = RequestDescriptor::new("GET", "/f", format!("198.51.100.{}", 90 + i))
            .with_query("p=../../etc/passwd");
        plane.inspect(LimiterScope::Api, &desc);
    }

    plane.start();
    // Let the escalator reach its interval (first tick fires immediately)
    // before the stop signal can race it.
    tokio::task::yield_now().await;
    tokio::time::advance(Duration::from_millis(1100)).await;
    tokio::task::yield_now().await;
    plane.shutdown().await;

    let report = plane.report();
    assert!(report.events_by_category.contains_key("alert_storm"));
}

// ==================== Report Tests ====================

#[test]
fn test_report_aggregates_by_severity_and_category() {
    let dir = TempDir::new().unwrap();
    let plane = SecurityPlane::new(config_in(&dir)).unwrap();

    plane.inspect(
        LimiterScope::Api,
        &RequestDescriptor::new("GET", "/api", "198.51.100.100").with_query("q=union select 1"),
    );
    plane.inspect(
        LimiterScope::Api,
        &RequestDescriptor::new("GET", "/api", "198.51.100.101")
            .with_header("X-Forwarded-For", "1.2.3.4"),
    );

    let report = plane.report();
    assert_eq!(report.events_by_category["sql_injection"], 1);
    assert_eq!(report.events_by_category["proxy_header"], 1);
    assert!(report.events_by_severity.contains_key("high"));
    assert!(report.events_by_severity.contains_key("medium"));
    assert_eq!(plane.signature_hits()["sql_injection"], 1);
}

#[test]
fn test_resolve_alert_through_facade() {
    let dir = TempDir::new().unwrap();
    let plane = SecurityPlane::new(config_in(&dir)).unwrap();

    plane.inspect(
        LimiterScope::Api,
        &RequestDescriptor::new("GET", "/api", "198.51.100.110").with_query("q=union select 1"),
    );

    let report = plane.report();
    assert_eq!(report.active_alerts, 1);
    let id = report.recent_alerts[0].id.clone();
    assert!(plane.resolve_alert(&id));
    assert_eq!(plane.report().active_alerts, 0);
    assert!(!plane.resolve_alert("no-such-id"));
}
