//! The canonical report shape.
//!
//! One typed `Report` is the hashable source of truth; the wire shape in
//! [`crate::wire`] is a projection of it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Complete scan report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub scan_parameters: ScanParameters,
    pub scan_results: ScanResults,
    pub compliance_notes: ComplianceNotes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub report_version: String,
    pub agent_id: String,
    pub scan_id: String,
    /// RFC3339 UTC.
    pub timestamp: String,
    pub operator: String,
    /// SHA-256 over the canonical JSON of the report with this field
    /// cleared. Filled in after construction.
    pub report_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanParameters {
    pub directories_scanned: usize,
    pub exclude_patterns_count: usize,
    pub action_policy: String,
    pub max_file_size_bytes: u64,
    pub concurrency: usize,
    pub privacy_settings: PrivacySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivacySettings {
    pub redact_pan: bool,
    pub show_last4_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResults {
    pub summary: ScanSummary,
    pub findings_by_type: FindingsByType,
    pub findings: Vec<Finding>,
    pub risk_assessment: RiskAssessment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    pub total_files_scanned: u64,
    pub total_files_skipped: u64,
    pub total_directories_scanned: u64,
    pub total_matches_found: u64,
    pub errors_encountered: u64,
    pub scan_duration_seconds: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindingsByType {
    pub by_card_type: BTreeMap<String, u64>,
    pub by_validation_status: ValidationCounts,
    pub by_confidence: ConfidenceCounts,
    pub by_masking_status: MaskingCounts,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationCounts {
    pub luhn_valid: u64,
    pub luhn_invalid: u64,
}

/// Confidence buckets at thresholds 0.8 and 0.5.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfidenceCounts {
    pub high: u64,
    pub medium: u64,
    pub low: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaskingCounts {
    pub masked: u64,
    pub unmasked: u64,
}

/// A single projected finding with privacy controls applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub file_path: String,
    pub line_number: u32,
    pub column_range: [usize; 2],
    pub card_type: String,
    pub luhn_valid: bool,
    /// Rounded to 3 decimals.
    pub confidence_score: f64,
    pub is_masked: bool,
    pub context: FindingContext,
    pub remediation_priority: String,
    pub remediation_suggestions: Vec<String>,
    pub pan_data: PanData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindingContext {
    pub before: String,
    pub after: String,
}

/// The only place card number material appears in a report.
/// `full_number` requires explicit retention authorization with
/// redaction disabled; `hash` exists only when the digits were available
/// to hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanData {
    pub masked_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub overall_risk: String,
    pub risk_factors: Vec<String>,
    pub compliance_status: String,
    pub total_high_risk_findings: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceNotes {
    pub data_handling: String,
    pub retention_policy: String,
    pub audit_trail: String,
    pub recommendations: Vec<String>,
}
