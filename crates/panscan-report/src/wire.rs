//! Wire projection and the pre-transmission sensitive-data gate.

use std::sync::OnceLock;

use panscan_core::errors::ReportError;
use panscan_core::types::luhn_valid;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::{ComplianceNotes, Finding, FindingsByType, PrivacySettings, Report, RiskAssessment};

/// The flat report shape accepted by `POST /api/reports`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireReport {
    pub agent_id: String,
    pub operator: String,
    /// `YYYY-MM-DD`.
    pub scan_date: String,
    pub directories_scanned: Vec<String>,
    pub total_files_scanned: u64,
    pub findings: Vec<Finding>,
    pub scan_configuration: WireScanConfiguration,
    pub scan_results_summary: WireSummary,
    pub metadata: WireMetadata,
    pub compliance_notes: ComplianceNotes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireScanConfiguration {
    pub exclude_patterns_count: usize,
    pub action_policy: String,
    pub max_file_size_bytes: u64,
    pub concurrency: usize,
    pub privacy_settings: PrivacySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireSummary {
    pub total_files_skipped: u64,
    pub total_directories_scanned: u64,
    pub total_matches_found: u64,
    pub errors_encountered: u64,
    pub scan_duration_seconds: f64,
    pub findings_by_type: FindingsByType,
    pub risk_assessment: RiskAssessment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMetadata {
    pub scan_id: String,
    pub timestamp: String,
    pub report_version: String,
    pub report_hash: String,
}

/// Derive the wire shape from the canonical report.
///
/// `directories` are the validated roots of the session; the internal
/// report only carries their count.
pub fn to_wire(report: &Report, directories: &[String]) -> WireReport {
    let metadata = &report.metadata;
    let params = &report.scan_parameters;
    let results = &report.scan_results;

    let scan_date = metadata
        .timestamp
        .split('T')
        .next()
        .unwrap_or(&metadata.timestamp)
        .to_string();

    WireReport {
        agent_id: metadata.agent_id.clone(),
        operator: metadata.operator.clone(),
        scan_date,
        directories_scanned: directories.to_vec(),
        total_files_scanned: results.summary.total_files_scanned,
        findings: results.findings.clone(),
        scan_configuration: WireScanConfiguration {
            exclude_patterns_count: params.exclude_patterns_count,
            action_policy: params.action_policy.clone(),
            max_file_size_bytes: params.max_file_size_bytes,
            concurrency: params.concurrency,
            privacy_settings: params.privacy_settings.clone(),
        },
        scan_results_summary: WireSummary {
            total_files_skipped: results.summary.total_files_skipped,
            total_directories_scanned: results.summary.total_directories_scanned,
            total_matches_found: results.summary.total_matches_found,
            errors_encountered: results.summary.errors_encountered,
            scan_duration_seconds: results.summary.scan_duration_seconds,
            findings_by_type: results.findings_by_type.clone(),
            risk_assessment: results.risk_assessment.clone(),
        },
        metadata: WireMetadata {
            scan_id: metadata.scan_id.clone(),
            timestamp: metadata.timestamp.clone(),
            report_version: metadata.report_version.clone(),
            report_hash: metadata.report_hash.clone(),
        },
        compliance_notes: report.compliance_notes.clone(),
    }
}

fn digit_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[0-9]{13,19}\b").unwrap())
}

/// Scan serialized output for Luhn-valid digit runs of PAN length.
///
/// The structural privacy controls should make this a no-op; it exists
/// as defense in depth before anything leaves the host. Applies to both
/// the wire JSON and the CSV export. The error carries only a masked
/// sample of the offending run.
pub fn check_for_leaks(serialized: &str) -> Result<(), ReportError> {
    for hit in digit_run().find_iter(serialized) {
        let digits = hit.as_str();
        if luhn_valid(digits) {
            let masked_sample = format!(
                "{}****{}",
                &digits[..4],
                &digits[digits.len() - 4..]
            );
            tracing::error!(sample = %masked_sample, "sensitive data leak blocked before transmission");
            return Err(ReportError::SensitiveDataLeak { masked_sample });
        }
    }
    Ok(())
}

/// Serialize the wire report and run the sensitive-data gate over the
/// exact bytes that would be transmitted.
pub fn serialize_checked(wire: &WireReport) -> Result<String, ReportError> {
    let serialized = serde_json::to_string(wire)?;
    check_for_leaks(&serialized)?;
    Ok(serialized)
}
