//! Report construction: aggregation, per-finding projection, risk
//! assessment, and the integrity hash.

use chrono::{SecondsFormat, Utc};
use panscan_core::config::AgentConfig;
use panscan_core::errors::ReportError;
use panscan_core::sanitize::{redact_context, sanitize_path};
use panscan_core::types::{PanMatch, ScanSession, ScanStats};
use sha2::{Digest, Sha256};

use crate::model::*;

/// Remediation priority of a single finding.
///
/// Score: +3 Luhn-valid, +2 unmasked, +2 confidence > 0.8, +1 major
/// brand; >= 5 critical, >= 3 high, >= 1 medium, else low.
pub fn remediation_priority(m: &PanMatch) -> &'static str {
    let mut score = 0;
    if m.luhn_valid {
        score += 3;
    }
    if !m.is_masked {
        score += 2;
    }
    if m.confidence > 0.8 {
        score += 2;
    }
    if m.card_brand.is_major() {
        score += 1;
    }
    match score {
        s if s >= 5 => "critical",
        s if s >= 3 => "high",
        s if s >= 1 => "medium",
        _ => "low",
    }
}

/// Builds canonical reports under the configured privacy rules.
pub struct ReportBuilder {
    allow_full_pan: bool,
    redact_pan: bool,
}

impl ReportBuilder {
    pub fn new(config: &AgentConfig) -> Self {
        let privacy = &config.privacy;
        Self {
            allow_full_pan: privacy.effective_allow_full_pan_retention(),
            redact_pan: privacy.effective_redact_pan(),
        }
    }

    /// Assemble the report and embed its integrity hash.
    pub fn build(
        &self,
        agent_id: &str,
        session: &ScanSession,
        matches: &[PanMatch],
        stats: &ScanStats,
        config: &AgentConfig,
    ) -> Result<Report, ReportError> {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

        let mut report = Report {
            metadata: ReportMetadata {
                report_version: "1.0".to_string(),
                agent_id: agent_id.to_string(),
                scan_id: session.scan_id.to_string(),
                timestamp,
                operator: session.operator.clone(),
                report_hash: String::new(),
            },
            scan_parameters: ScanParameters {
                directories_scanned: session.roots.len(),
                exclude_patterns_count: config.agent.exclude_globs.len(),
                action_policy: "report_only".to_string(),
                max_file_size_bytes: config.agent.effective_max_file_size(),
                concurrency: config.agent.effective_concurrency(),
                privacy_settings: PrivacySettings {
                    redact_pan: self.redact_pan,
                    show_last4_only: config.privacy.effective_show_last4_only(),
                },
            },
            scan_results: ScanResults {
                summary: ScanSummary {
                    total_files_scanned: stats.files_scanned,
                    total_files_skipped: stats.files_skipped,
                    total_directories_scanned: stats.directories_scanned,
                    total_matches_found: matches.len() as u64,
                    errors_encountered: stats.errors,
                    scan_duration_seconds: stats.duration_seconds,
                },
                findings_by_type: categorize(matches),
                findings: matches.iter().map(|m| self.project(m)).collect(),
                risk_assessment: assess_risk(matches),
            },
            compliance_notes: compliance_notes(session, matches),
        };

        report.metadata.report_hash = compute_report_hash(&report)?;

        tracing::info!(
            scan_id = %session.scan_id,
            findings = matches.len(),
            "report generated"
        );
        Ok(report)
    }

    /// Project a match into a finding with privacy controls applied.
    fn project(&self, m: &PanMatch) -> Finding {
        // Raw digits only leave the match when retention is authorized
        // AND redaction is off; the hash travels whenever the digits
        // were available to compute it.
        let full_number = if self.allow_full_pan && !self.redact_pan && !m.raw_digits.is_empty() {
            tracing::warn!(
                file = %sanitize_path(&m.file_path),
                line = m.line_number,
                "including full PAN in report"
            );
            Some(m.raw_digits.clone())
        } else {
            None
        };

        Finding {
            file_path: sanitize_path(&m.file_path),
            line_number: m.line_number,
            column_range: [m.column_start, m.column_end],
            card_type: m.card_brand.as_str().to_string(),
            luhn_valid: m.luhn_valid,
            confidence_score: (m.confidence * 1000.0).round() / 1000.0,
            is_masked: m.is_masked,
            context: FindingContext {
                before: redact_context(&m.context_before),
                after: redact_context(&m.context_after),
            },
            remediation_priority: remediation_priority(m).to_string(),
            remediation_suggestions: remediation_suggestions(m),
            pan_data: PanData {
                masked_number: m.masked_rendering.clone(),
                hash: m.pan_hash.clone(),
                full_number,
            },
        }
    }
}

/// Recompute the integrity hash: SHA-256 over the canonical JSON of the
/// report with `report_hash` cleared. Canonical JSON means sorted keys,
/// which `serde_json::Value` provides through its BTreeMap-backed
/// object representation.
pub fn compute_report_hash(report: &Report) -> Result<String, ReportError> {
    let mut cleared = report.clone();
    cleared.metadata.report_hash = String::new();
    let canonical = serde_json::to_string(&serde_json::to_value(&cleared)?)?;
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}

fn categorize(matches: &[PanMatch]) -> FindingsByType {
    let mut categories = FindingsByType::default();
    for m in matches {
        *categories
            .by_card_type
            .entry(m.card_brand.as_str().to_string())
            .or_insert(0) += 1;

        if m.luhn_valid {
            categories.by_validation_status.luhn_valid += 1;
        } else {
            categories.by_validation_status.luhn_invalid += 1;
        }

        if m.confidence > 0.8 {
            categories.by_confidence.high += 1;
        } else if m.confidence > 0.5 {
            categories.by_confidence.medium += 1;
        } else {
            categories.by_confidence.low += 1;
        }

        if m.is_masked {
            categories.by_masking_status.masked += 1;
        } else {
            categories.by_masking_status.unmasked += 1;
        }
    }
    categories
}

fn assess_risk(matches: &[PanMatch]) -> RiskAssessment {
    let mut risk_factors = Vec::new();
    let mut high_risk_count = 0u64;
    for m in matches {
        if m.luhn_valid && !m.is_masked {
            high_risk_count += 1;
            if risk_factors.len() < 10 {
                risk_factors.push(format!(
                    "Unmasked valid PAN in {}",
                    sanitize_path(&m.file_path)
                ));
            }
        }
    }

    let (overall_risk, compliance_status) = if high_risk_count > 0 {
        ("critical", "non-compliant")
    } else if matches.len() > 10 {
        ("high", "review-required")
    } else if !matches.is_empty() {
        ("medium", "review-required")
    } else {
        ("low", "compliant")
    };

    RiskAssessment {
        overall_risk: overall_risk.to_string(),
        risk_factors,
        compliance_status: compliance_status.to_string(),
        total_high_risk_findings: high_risk_count,
    }
}

fn remediation_suggestions(m: &PanMatch) -> Vec<String> {
    let mut suggestions = Vec::new();
    if !m.is_masked && m.luhn_valid {
        suggestions.push("URGENT: Unmasked valid PAN detected - secure immediately".to_string());
    }
    if m.luhn_valid {
        suggestions.push("Implement PAN masking or tokenization".to_string());
        suggestions.push("Review data retention policies".to_string());
    }
    if m.confidence > 0.7 {
        suggestions.push("High confidence match - verify and remediate".to_string());
    }
    suggestions.push("Consider data encryption at rest".to_string());
    suggestions
}

fn compliance_notes(session: &ScanSession, matches: &[PanMatch]) -> ComplianceNotes {
    let mut recommendations = vec![
        "Implement regular PCI compliance scanning".to_string(),
        "Establish data retention and disposal policies".to_string(),
        "Enable comprehensive audit logging".to_string(),
    ];
    if matches.iter().any(|m| m.luhn_valid && !m.is_masked) {
        recommendations.insert(0, "CRITICAL: Secure unmasked PANs immediately".to_string());
    }
    if matches.len() > 5 {
        recommendations.push("Consider automated PAN discovery and classification".to_string());
    }

    ComplianceNotes {
        data_handling: "This report follows PCI-DSS data minimization principles".to_string(),
        retention_policy: "Sensitive data is masked unless explicitly authorized".to_string(),
        audit_trail: format!("Full audit log available for scan {}", session.scan_id),
        recommendations,
    }
}
