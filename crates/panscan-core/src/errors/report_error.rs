//! Report construction and export errors.

use super::ErrorCode;

/// Errors raised while building, hashing, or exporting a report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Report serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Cannot write report to {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),

    /// The serialized report contains a Luhn-valid digit run of PAN
    /// length. Transmission and export are refused; only the masked
    /// sample is carried in the error.
    #[error("Sensitive data leak detected in serialized report: {masked_sample}")]
    SensitiveDataLeak { masked_sample: String },
}

impl ErrorCode for ReportError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Serialize(_) => "REPORT_SERIALIZE_FAILED",
            Self::Write { .. } => "REPORT_WRITE_FAILED",
            Self::Csv(_) => "REPORT_CSV_FAILED",
            Self::SensitiveDataLeak { .. } => "SENSITIVE_DATA_LEAK",
        }
    }
}
