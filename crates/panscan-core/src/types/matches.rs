//! The unit of detection and per-scan counters.

use serde::{Deserialize, Serialize};

use super::card::CardBrand;

/// A single PAN candidate located in file content.
///
/// `raw_digits` is populated only when full-PAN retention is explicitly
/// authorized; everywhere else it stays empty so the match can be stored,
/// serialized, or transmitted without carrying cardholder data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanMatch {
    pub file_path: String,
    /// 1-based, LF-delimited.
    pub line_number: u32,
    /// Byte offsets of the match within its line.
    pub column_start: usize,
    pub column_end: usize,
    pub card_brand: CardBrand,
    pub luhn_valid: bool,
    /// Clamped to [0,1].
    pub confidence: f64,
    /// Whether the surrounding window looks like an already-masked number.
    pub is_masked: bool,
    /// Up to 50 chars each side, taken from the line.
    pub context_before: String,
    pub context_after: String,
    /// Always present; never exposes more than the last four digits.
    pub masked_rendering: String,
    /// Digit-only candidate. Empty unless `allow_full_pan_retention`.
    pub raw_digits: String,
    /// SHA-256 of the digits, carried only while the digits themselves
    /// were available to hash.
    pub pan_hash: Option<String>,
}

/// Per-scan counters. Monotonically non-decreasing within a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanStats {
    pub files_scanned: u64,
    pub files_skipped: u64,
    pub directories_scanned: u64,
    pub matches_found: u64,
    pub errors: u64,
    /// Wall-clock from scan start to aggregation complete.
    pub duration_seconds: f64,
}
