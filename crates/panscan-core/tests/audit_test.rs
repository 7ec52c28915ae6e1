//! Audit log integration tests.
//!
//! The audit log is append-only newline-delimited JSON; every entry
//! carries timestamp/event_type/process_id/thread_id, paths are
//! sanitized, and credential values are redacted.

use std::fs;
use std::path::PathBuf;

use panscan_core::audit::{assess_finding_risk, AuditLogger};
use panscan_core::config::AgentConfig;
use panscan_core::types::{CardBrand, PanMatch};
use serde_json::Value;

fn config_with_log(path: &std::path::Path, detailed: bool) -> AgentConfig {
    let yaml = format!(
        r#"
agent:
  scan_roots: ["/tmp"]
detection: {{}}
privacy:
  enable_detailed_logging: {detailed}
reporting: {{}}
audit:
  log_file: "{}"
"#,
        path.display()
    );
    AgentConfig::from_yaml(&yaml).unwrap()
}

fn read_entries(path: &std::path::Path) -> Vec<Value> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

fn sample_match() -> PanMatch {
    PanMatch {
        file_path: "/Users/alice/data/cards.txt".to_string(),
        line_number: 3,
        column_start: 10,
        column_end: 26,
        card_brand: CardBrand::Visa,
        luhn_valid: true,
        confidence: 0.9,
        is_masked: false,
        context_before: "card: ".to_string(),
        context_after: String::new(),
        masked_rendering: "************0366".to_string(),
        raw_digits: String::new(),
        pan_hash: None,
    }
}

#[test]
fn fresh_log_starts_with_initialized_event() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("audit.log");
    let _logger = AuditLogger::new(&config_with_log(&log_path, true)).unwrap();

    let entries = read_entries(&log_path);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["event_type"], "audit_log_initialized");
    assert!(entries[0]["timestamp"].is_string());
    assert!(entries[0]["process_id"].is_number());
    assert!(entries[0]["thread_id"].is_string());
}

#[test]
fn reopening_does_not_reinitialize() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("audit.log");
    let config = config_with_log(&log_path, true);
    drop(AuditLogger::new(&config).unwrap());
    drop(AuditLogger::new(&config).unwrap());

    let entries = read_entries(&log_path);
    assert_eq!(entries.len(), 1, "init event should only be written once");
}

#[test]
fn scan_lifecycle_entries_carry_mandatory_fields() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("audit.log");
    let logger = AuditLogger::new(&config_with_log(&log_path, true)).unwrap();

    logger.log_scan_started(
        "scan-1",
        "auditor",
        &[PathBuf::from("/var/www")],
        "abcd1234abcd1234",
    );
    logger.log_scan_completed("scan-1", 2, 100, 0);

    let entries = read_entries(&log_path);
    let started = &entries[1];
    assert_eq!(started["event_type"], "scan_started");
    assert_eq!(started["scan_id"], "scan-1");
    assert_eq!(started["operator"], "auditor");
    assert_eq!(started["directories_count"], 1);
    assert_eq!(started["directories"][0], "/var/www");
    assert_eq!(started["config_hash"], "abcd1234abcd1234");

    let completed = &entries[2];
    assert_eq!(completed["event_type"], "scan_completed");
    assert_eq!(completed["matches_found"], 2);
    assert_eq!(completed["files_scanned"], 100);
    assert_eq!(completed["status"], "success");
}

#[test]
fn directories_redacted_without_detailed_logging() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("audit.log");
    let logger = AuditLogger::new(&config_with_log(&log_path, false)).unwrap();

    logger.log_scan_started("scan-1", "auditor", &[PathBuf::from("/secret/place")], "h");

    let entries = read_entries(&log_path);
    let started = &entries[1];
    assert_eq!(started["directories"][0], "<redacted>");
    assert_eq!(started["directories_count"], 1);
}

#[test]
fn pan_detected_sanitizes_path_and_grades_risk() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("audit.log");
    let logger = AuditLogger::new(&config_with_log(&log_path, true)).unwrap();

    logger.log_pan_detected("scan-1", &sample_match());

    let entries = read_entries(&log_path);
    let detected = &entries[1];
    assert_eq!(detected["event_type"], "pan_detected");
    assert_eq!(detected["file_path"], "/Users/<user>/data/cards.txt");
    assert_eq!(detected["card_type"], "visa");
    assert_eq!(detected["risk_level"], "critical");
    assert_eq!(detected["action_taken"], "reported");
    // No digit material of PAN length anywhere in the entry.
    let serialized = detected.to_string();
    assert!(!serialized.contains("4532015112830366"));
}

#[test]
fn config_change_redacts_credential_values() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("audit.log");
    let logger = AuditLogger::new(&config_with_log(&log_path, true)).unwrap();

    logger.log_config_changed("auditor", "reporting.api_token", Some("old-secret"), Some("new-secret"));
    logger.log_config_changed("auditor", "agent.concurrency", Some("4"), Some("8"));

    let entries = read_entries(&log_path);
    assert_eq!(entries[1]["old_value"], "<redacted>");
    assert_eq!(entries[1]["new_value"], "<redacted>");
    assert_eq!(entries[2]["old_value"], "4");
    assert_eq!(entries[2]["new_value"], "8");
}

#[test]
fn file_access_respects_detailed_logging_flag() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("audit.log");

    let logger = AuditLogger::new(&config_with_log(&log_path, false)).unwrap();
    logger.log_file_access("scan-1", "/etc/passwd", "read", "skipped");
    assert_eq!(read_entries(&log_path).len(), 1, "only the init event");

    let detailed_path = dir.path().join("audit2.log");
    let logger = AuditLogger::new(&config_with_log(&detailed_path, true)).unwrap();
    logger.log_file_access("scan-1", "/etc/passwd", "read", "skipped");
    assert_eq!(read_entries(&detailed_path).len(), 2);
}

#[test]
fn summary_counts_events_by_type() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("audit.log");
    let logger = AuditLogger::new(&config_with_log(&log_path, true)).unwrap();

    logger.log_scan_started("s", "op", &[PathBuf::from("/tmp")], "h");
    logger.log_scan_completed("s", 5, 10, 0);
    logger.log_pan_detected("s", &sample_match());
    logger.log_report_sent("s", "2026-08-01T00:00:00Z");
    logger.log_security_event("full_pan_retention", "high", "retention enabled");

    let summary = logger.summary().unwrap();
    assert_eq!(summary.scans_started, 1);
    assert_eq!(summary.scans_completed, 1);
    assert_eq!(summary.total_findings, 5);
    assert_eq!(summary.high_risk_findings, 1);
    assert_eq!(summary.reports_sent, 1);
    assert_eq!(summary.security_events, 1);
}

#[test]
fn export_filters_by_event_type() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("audit.log");
    let logger = AuditLogger::new(&config_with_log(&log_path, true)).unwrap();

    logger.log_scan_started("s", "op", &[PathBuf::from("/tmp")], "h");
    logger.log_scan_completed("s", 0, 10, 0);

    let out = dir.path().join("export.jsonl");
    let count = logger.export(&out, Some(&["scan_completed"])).unwrap();
    assert_eq!(count, 1);
    let exported = read_entries(&out);
    assert_eq!(exported[0]["event_type"], "scan_completed");
}

#[test]
fn risk_grading_matrix() {
    assert_eq!(assess_finding_risk(true, false, 0.9), "critical");
    assert_eq!(assess_finding_risk(true, false, 0.7), "high");
    assert_eq!(assess_finding_risk(true, true, 0.9), "medium");
    assert_eq!(assess_finding_risk(false, false, 0.9), "low");
}
