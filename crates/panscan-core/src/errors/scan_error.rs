//! Scan pipeline errors.
//!
//! Per-file conditions (unreadable, oversized, undecodable) are skips
//! counted in `ScanStats`, not errors — only conditions that abort the
//! whole scan surface here.

use super::ErrorCode;

/// Errors that abort a scan session.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// A brand pattern failed to compile. Fatal at detector construction.
    #[error("Card pattern for {brand} failed to compile: {source}")]
    PatternCompile {
        brand: &'static str,
        #[source]
        source: regex::Error,
    },

    /// An exclusion glob in the configuration is malformed.
    #[error("Exclusion pattern {pattern:?} is invalid: {source}")]
    InvalidExcludeGlob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("No valid scan roots after validation")]
    NoValidRoots,
}

impl ErrorCode for ScanError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::PatternCompile { .. } => "SCAN_PATTERN_COMPILE",
            Self::InvalidExcludeGlob { .. } => "SCAN_INVALID_EXCLUDE_GLOB",
            Self::NoValidRoots => "SCAN_NO_VALID_ROOTS",
        }
    }
}
