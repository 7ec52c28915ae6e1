//! Append-only audit log.
//!
//! One JSON object per line, UTF-8, flushed after every entry. Writes
//! are serialized by a global mutex; entries are never mutated or
//! deleted by the agent. Logging is best-effort: a failed write goes to
//! stderr via `tracing` and the scan continues.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use crate::config::AgentConfig;
use crate::errors::AuditError;
use crate::sanitize::{is_sensitive_key, sanitize_path};
use crate::types::PanMatch;

/// Risk grade of a single finding, mirrored from the report builder's
/// priority scoring.
pub fn assess_finding_risk(luhn_valid: bool, is_masked: bool, confidence: f64) -> &'static str {
    if luhn_valid && !is_masked && confidence > 0.8 {
        "critical"
    } else if luhn_valid && !is_masked {
        "high"
    } else if luhn_valid && is_masked {
        "medium"
    } else {
        "low"
    }
}

/// Thread-safe append-only audit logger.
pub struct AuditLogger {
    path: PathBuf,
    detailed: bool,
    file: Mutex<File>,
}

impl AuditLogger {
    /// Open (or create) the audit log configured in the `audit` section.
    ///
    /// Relative paths resolve against the installation directory (the
    /// directory containing the running executable). The parent
    /// directory is created if absent; a fresh file gets an
    /// `audit_log_initialized` entry.
    pub fn new(config: &AgentConfig) -> Result<Self, AuditError> {
        let path = resolve_log_path(config.audit.effective_log_file());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| AuditError::CreateDir {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let existed = path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| AuditError::Open {
                path: path.display().to_string(),
                source,
            })?;

        let logger = Self {
            path,
            detailed: config.privacy.effective_detailed_logging(),
            file: Mutex::new(file),
        };

        if !existed {
            logger.write(logger.base_entry(
                "audit_log_initialized",
                json!({
                    "message": "PCI compliance agent audit logging started",
                    "version": env!("CARGO_PKG_VERSION"),
                }),
            ));
        }

        Ok(logger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log_scan_started(
        &self,
        scan_id: &str,
        operator: &str,
        directories: &[PathBuf],
        config_hash: &str,
    ) {
        let dirs: Vec<String> = if self.detailed {
            directories
                .iter()
                .map(|d| sanitize_path(&d.display().to_string()))
                .collect()
        } else {
            vec!["<redacted>".to_string()]
        };
        self.write(self.base_entry(
            "scan_started",
            json!({
                "scan_id": scan_id,
                "operator": operator,
                "directories_count": directories.len(),
                "directories": dirs,
                "config_hash": config_hash,
            }),
        ));
    }

    pub fn log_scan_completed(
        &self,
        scan_id: &str,
        matches_found: u64,
        files_scanned: u64,
        errors: u64,
    ) {
        self.write(self.base_entry(
            "scan_completed",
            json!({
                "scan_id": scan_id,
                "matches_found": matches_found,
                "files_scanned": files_scanned,
                "errors": errors,
                "status": "success",
            }),
        ));
    }

    pub fn log_scan_error(&self, scan_id: &str, error_message: &str) {
        self.write(self.base_entry(
            "scan_error",
            json!({
                "scan_id": scan_id,
                "error_message": error_message,
                "status": "error",
            }),
        ));
    }

    /// Record a detection. Only classification attributes are logged —
    /// never digits, masked or otherwise.
    pub fn log_pan_detected(&self, scan_id: &str, m: &PanMatch) {
        let risk = assess_finding_risk(m.luhn_valid, m.is_masked, m.confidence);
        self.write(self.base_entry(
            "pan_detected",
            json!({
                "scan_id": scan_id,
                "file_path": sanitize_path(&m.file_path),
                "line_number": m.line_number,
                "card_type": m.card_brand.as_str(),
                "luhn_valid": m.luhn_valid,
                "confidence_score": m.confidence,
                "is_masked": m.is_masked,
                "action_taken": "reported",
                "risk_level": risk,
            }),
        ));
        if m.luhn_valid && !m.is_masked {
            tracing::warn!(
                file = %sanitize_path(&m.file_path),
                line = m.line_number,
                "high risk PAN detected"
            );
        }
    }

    pub fn log_report_generated(&self, scan_id: &str, report_hash: &str, findings_count: usize) {
        self.write(self.base_entry(
            "report_generated",
            json!({
                "scan_id": scan_id,
                "report_hash": report_hash,
                "findings_count": findings_count,
            }),
        ));
    }

    pub fn log_report_sent(&self, scan_id: &str, sent_timestamp: &str) {
        self.write(self.base_entry(
            "report_sent",
            json!({
                "scan_id": scan_id,
                "sent_timestamp": sent_timestamp,
                "status": "success",
            }),
        ));
    }

    pub fn log_report_send_failed(&self, scan_id: &str, error_message: &str) {
        self.write(self.base_entry(
            "report_send_failed",
            json!({
                "scan_id": scan_id,
                "error_message": error_message,
                "status": "failed",
            }),
        ));
    }

    /// Record a configuration change. Values of credential-bearing keys
    /// are replaced with `<redacted>`.
    pub fn log_config_changed(
        &self,
        operator: &str,
        setting: &str,
        old_value: Option<&str>,
        new_value: Option<&str>,
    ) {
        let (old_value, new_value) = if is_sensitive_key(setting) {
            (
                old_value.map(|_| "<redacted>"),
                new_value.map(|_| "<redacted>"),
            )
        } else {
            (old_value, new_value)
        };
        self.write(self.base_entry(
            "config_changed",
            json!({
                "operator": operator,
                "setting": setting,
                "old_value": old_value,
                "new_value": new_value,
            }),
        ));
    }

    pub fn log_user_action(&self, operator: &str, action: &str, details: Value) {
        self.write(self.base_entry(
            "user_action",
            json!({
                "operator": operator,
                "action": action,
                "details": details,
            }),
        ));
    }

    pub fn log_security_event(&self, event_type: &str, severity: &str, message: &str) {
        self.write(self.base_entry(
            "security_event",
            json!({
                "security_event_type": event_type,
                "severity": severity,
                "message": message,
            }),
        ));
        if matches!(severity, "high" | "critical") {
            tracing::warn!(event_type, severity, message, "security event");
        }
    }

    /// Record a file access attempt. Emitted only when detailed logging
    /// is enabled.
    pub fn log_file_access(&self, scan_id: &str, file_path: &str, access_type: &str, status: &str) {
        if !self.detailed {
            return;
        }
        self.write(self.base_entry(
            "file_access",
            json!({
                "scan_id": scan_id,
                "file_path": sanitize_path(file_path),
                "access_type": access_type,
                "status": status,
            }),
        ));
    }

    /// Count audit events by type over the whole log file.
    pub fn summary(&self) -> Result<AuditSummary, AuditError> {
        let file = File::open(&self.path).map_err(|source| AuditError::Open {
            path: self.path.display().to_string(),
            source,
        })?;
        let mut summary = AuditSummary::default();
        for line in BufReader::new(file).lines() {
            let line = line?;
            let Ok(entry) = serde_json::from_str::<Value>(&line) else {
                continue;
            };
            match entry.get("event_type").and_then(Value::as_str) {
                Some("scan_started") => summary.scans_started += 1,
                Some("scan_completed") => {
                    summary.scans_completed += 1;
                    summary.total_findings += entry
                        .get("matches_found")
                        .and_then(Value::as_u64)
                        .unwrap_or(0);
                }
                Some("scan_error") => summary.scans_failed += 1,
                Some("pan_detected") => {
                    if matches!(
                        entry.get("risk_level").and_then(Value::as_str),
                        Some("high") | Some("critical")
                    ) {
                        summary.high_risk_findings += 1;
                    }
                }
                Some("report_sent") => summary.reports_sent += 1,
                Some("report_send_failed") => summary.reports_failed += 1,
                Some("config_changed") => summary.config_changes += 1,
                Some("security_event") => summary.security_events += 1,
                _ => {}
            }
        }
        Ok(summary)
    }

    /// Export entries matching the given event types to another file.
    /// Returns the number of entries written.
    pub fn export(&self, output: &Path, event_types: Option<&[&str]>) -> Result<usize, AuditError> {
        let input = File::open(&self.path).map_err(|source| AuditError::Open {
            path: self.path.display().to_string(),
            source,
        })?;
        let mut out = File::create(output)?;
        let mut exported = 0;
        for line in BufReader::new(input).lines() {
            let line = line?;
            let Ok(entry) = serde_json::from_str::<Value>(&line) else {
                continue;
            };
            if let Some(types) = event_types {
                let event_type = entry.get("event_type").and_then(Value::as_str).unwrap_or("");
                if !types.contains(&event_type) {
                    continue;
                }
            }
            writeln!(out, "{line}")?;
            exported += 1;
        }
        Ok(exported)
    }

    fn base_entry(&self, event_type: &str, fields: Value) -> Value {
        let mut entry = Map::new();
        entry.insert(
            "timestamp".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        entry.insert("event_type".to_string(), Value::String(event_type.to_string()));
        entry.insert("process_id".to_string(), json!(std::process::id()));
        entry.insert(
            "thread_id".to_string(),
            Value::String(format!("{:?}", std::thread::current().id())),
        );
        if let Value::Object(fields) = fields {
            entry.extend(fields);
        }
        Value::Object(entry)
    }

    fn write(&self, entry: Value) {
        let result = (|| -> std::io::Result<()> {
            let line = serde_json::to_string(&entry).map_err(std::io::Error::other)?;
            let mut file = self
                .file
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            file.write_all(line.as_bytes())?;
            file.write_all(b"\n")?;
            file.flush()
        })();
        if let Err(e) = result {
            tracing::error!(error = %e, "failed to write audit entry");
        }
    }
}

/// Aggregated counts over the audit log.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AuditSummary {
    pub scans_started: u64,
    pub scans_completed: u64,
    pub scans_failed: u64,
    pub total_findings: u64,
    pub high_risk_findings: u64,
    pub reports_sent: u64,
    pub reports_failed: u64,
    pub config_changes: u64,
    pub security_events: u64,
}

fn resolve_log_path(configured: &str) -> PathBuf {
    let path = PathBuf::from(configured);
    if path.is_absolute() {
        return path;
    }
    let install_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    install_dir.join(path)
}
