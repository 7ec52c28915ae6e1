//! CSV export of findings.

use std::path::Path;

use panscan_core::errors::ReportError;
use panscan_core::sanitize::sanitize_path;
use panscan_core::types::PanMatch;

use crate::builder::remediation_priority;
use crate::wire::check_for_leaks;

/// Write findings to a CSV file.
///
/// The CSV is rendered in memory first and run through the same
/// sensitive-data gate as the wire JSON; a hit aborts the export and
/// nothing is written.
pub fn write_csv(matches: &[PanMatch], path: &Path) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "file_path",
        "line_number",
        "card_type",
        "masked_number",
        "luhn_valid",
        "confidence_score",
        "is_masked",
        "priority",
    ])?;

    for m in matches {
        writer.write_record([
            sanitize_path(&m.file_path),
            m.line_number.to_string(),
            m.card_brand.as_str().to_string(),
            m.masked_rendering.clone(),
            m.luhn_valid.to_string(),
            format!("{:.3}", m.confidence),
            m.is_masked.to_string(),
            remediation_priority(m).to_string(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ReportError::Write {
            path: path.display().to_string(),
            source: std::io::Error::other(e),
        })?;
    let rendered = String::from_utf8_lossy(&bytes);
    check_for_leaks(&rendered)?;

    std::fs::write(path, bytes).map_err(|source| ReportError::Write {
        path: path.display().to_string(),
        source,
    })?;
    tracing::info!(count = matches.len(), path = %path.display(), "findings exported to CSV");
    Ok(())
}
