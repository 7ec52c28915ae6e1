//! PAN detection engine.
//!
//! Regex candidate extraction per card brand, Luhn validation, masking
//! discrimination, and additive confidence scoring. All patterns are
//! compiled once at construction; a compile failure there is fatal for
//! the session, and nothing in the content path can make the detector
//! fail afterwards.

use panscan_core::config::{DetectionSection, PrivacySection};
use panscan_core::errors::ScanError;
use panscan_core::types::{hash_pan, luhn_valid, mask_pan, CardBrand, PanMatch};
use regex::Regex;

/// A brand recognition pattern over digit-only strings.
#[derive(Debug, Clone, Copy)]
pub struct BrandPattern {
    pub brand: CardBrand,
    pub pattern: &'static str,
}

/// Recognition patterns for the major card brands.
pub static BRAND_PATTERNS: &[BrandPattern] = &[
    BrandPattern { brand: CardBrand::Visa, pattern: r"4[0-9]{12}(?:[0-9]{3})?" },
    BrandPattern { brand: CardBrand::Mastercard, pattern: r"5[1-5][0-9]{14}|2(?:2(?:2[1-9]|[3-9][0-9])|[3-6][0-9]{2}|7(?:[01][0-9]|20))[0-9]{12}" },
    BrandPattern { brand: CardBrand::Amex, pattern: r"3[47][0-9]{13}" },
    BrandPattern { brand: CardBrand::Discover, pattern: r"6(?:011|5[0-9]{2})[0-9]{12}" },
    BrandPattern { brand: CardBrand::Diners, pattern: r"3(?:0[0-5]|[68][0-9])[0-9]{11}" },
    BrandPattern { brand: CardBrand::Jcb, pattern: r"(?:2131|1800|35\d{3})\d{11}" },
];

/// Textures that indicate an already-masked or redacted number.
static MASKED_PATTERNS: &[&str] = &[
    r"\*{4,}",
    r"X{4,}",
    r"#{4,}",
    r"\*+\d{4}",
    r"X+\d{4}",
    r"#+\d{4}",
    r"\d{4}[\*X#]{4,}",
    r"\d{4}-\*{4}-\*{4}-\d{4}",
];

/// Payment-related keywords that raise confidence when found near a
/// candidate.
const PAYMENT_KEYWORDS: &[&str] = &[
    "card", "credit", "debit", "payment", "visa", "mastercard", "amex",
    "discover", "pan", "account", "number", "cvv", "expiry", "expire",
];

/// Summary of the compiled pattern set.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionStats {
    pub card_patterns: usize,
    pub masked_patterns: usize,
    pub min_confidence: f64,
    pub luhn_required: bool,
}

/// Pre-compiled PAN detector. Construct once, reuse across all files.
pub struct PanDetector {
    compiled: Vec<(CardBrand, Regex)>,
    masked: Vec<Regex>,
    require_luhn: bool,
    min_confidence: f64,
    context_window: usize,
    exclude_masked: bool,
    retain_raw: bool,
    show_last4: bool,
}

impl PanDetector {
    /// Compile all brand and mask patterns. Word-boundary anchors are
    /// added around each brand pattern so candidates embedded in longer
    /// digit runs do not match.
    pub fn new(detection: &DetectionSection, privacy: &PrivacySection) -> Result<Self, ScanError> {
        let mut compiled = Vec::with_capacity(BRAND_PATTERNS.len());
        for bp in BRAND_PATTERNS {
            let anchored = format!(r"\b(?:{})\b", bp.pattern);
            let re = Regex::new(&anchored).map_err(|source| ScanError::PatternCompile {
                brand: bp.brand.as_str(),
                source,
            })?;
            compiled.push((bp.brand, re));
        }

        let mut masked = Vec::with_capacity(MASKED_PATTERNS.len());
        for pattern in MASKED_PATTERNS {
            let re = Regex::new(pattern).map_err(|source| ScanError::PatternCompile {
                brand: "masked",
                source,
            })?;
            masked.push(re);
        }

        tracing::debug!(
            card_patterns = compiled.len(),
            masked_patterns = masked.len(),
            "compiled detector patterns"
        );

        Ok(Self {
            compiled,
            masked,
            require_luhn: detection.effective_require_luhn(),
            min_confidence: detection.effective_min_confidence(),
            context_window: detection.effective_context_window(),
            exclude_masked: detection.effective_exclude_masked(),
            retain_raw: privacy.effective_allow_full_pan_retention(),
            show_last4: privacy.effective_show_last4_only(),
        })
    }

    /// Whether the text looks like a masked card number.
    pub fn is_masked_text(&self, text: &str) -> bool {
        self.masked.iter().any(|re| re.is_match(text))
    }

    /// Determine the card brand of a digit-only candidate.
    pub fn detect_card_type(&self, digits: &str) -> CardBrand {
        for (brand, re) in &self.compiled {
            if re.find(digits).is_some_and(|m| m.start() == 0) {
                return *brand;
            }
        }
        CardBrand::Unknown
    }

    /// Scan a text buffer for PAN candidates.
    ///
    /// Lines are LF-delimited and numbered from 1. Matches within a line
    /// are returned in ascending column order. `file_path` is a label
    /// only; it is copied onto every emitted match.
    pub fn scan_text(&self, text: &str, file_path: &str) -> Vec<PanMatch> {
        let mut matches = Vec::new();

        for (index, line) in text.split('\n').enumerate() {
            let line_number = (index + 1) as u32;

            // Lines that consist of masked renderings carry no risk.
            if self.exclude_masked && self.is_masked_text(line) {
                tracing::trace!(file = file_path, line = line_number, "skipping masked line");
                continue;
            }

            let mut line_matches = Vec::new();
            for (brand, re) in &self.compiled {
                for hit in re.find_iter(line) {
                    let candidate = hit.as_str();
                    let digits: String =
                        candidate.chars().filter(char::is_ascii_digit).collect();
                    if digits.len() < 13 || digits.len() > 19 {
                        continue;
                    }

                    let is_luhn_valid = luhn_valid(&digits);
                    if self.require_luhn && !is_luhn_valid {
                        continue;
                    }

                    let before_wide = tail_chars(&line[..hit.start()], self.context_window);
                    let after_wide = head_chars(&line[hit.end()..], self.context_window);
                    let window = format!("{before_wide}{candidate}{after_wide}");
                    let is_masked = self.is_masked_text(&window);

                    let confidence =
                        self.confidence(*brand, is_luhn_valid, &window, is_masked);
                    if confidence < self.min_confidence {
                        continue;
                    }

                    let (raw_digits, pan_hash) = if self.retain_raw {
                        (digits.clone(), Some(hash_pan(&digits)))
                    } else {
                        (String::new(), None)
                    };

                    line_matches.push(PanMatch {
                        file_path: file_path.to_string(),
                        line_number,
                        column_start: hit.start(),
                        column_end: hit.end(),
                        card_brand: *brand,
                        luhn_valid: is_luhn_valid,
                        confidence,
                        is_masked,
                        context_before: tail_chars(before_wide, 50).to_string(),
                        context_after: head_chars(after_wide, 50).to_string(),
                        masked_rendering: mask_pan(&digits, self.show_last4),
                        raw_digits,
                        pan_hash,
                    });
                }
            }

            // Brand patterns are tried in table order; restore source
            // order within the line. The sort is stable so equal spans
            // keep table order.
            line_matches.sort_by_key(|m| m.column_start);
            matches.extend(line_matches);
        }

        matches
    }

    /// Additive confidence score, clamped to [0,1].
    fn confidence(
        &self,
        brand: CardBrand,
        is_luhn_valid: bool,
        window: &str,
        is_masked: bool,
    ) -> f64 {
        let mut confidence = 0.3;

        if is_luhn_valid {
            confidence += 0.4;
        }

        let window_lower = window.to_lowercase();
        let keyword_hits = PAYMENT_KEYWORDS
            .iter()
            .filter(|k| window_lower.contains(*k))
            .count();
        confidence += (keyword_hits as f64 * 0.05).min(0.2);

        if is_masked {
            confidence -= 0.2;
        }

        if brand.is_major() {
            confidence += 0.1;
        }

        confidence.clamp(0.0, 1.0)
    }

    pub fn detection_stats(&self) -> DetectionStats {
        DetectionStats {
            card_patterns: self.compiled.len(),
            masked_patterns: self.masked.len(),
            min_confidence: self.min_confidence,
            luhn_required: self.require_luhn,
        }
    }
}

/// Last `n` chars of `s`, respecting char boundaries.
fn tail_chars(s: &str, n: usize) -> &str {
    let count = s.chars().count();
    if count <= n {
        return s;
    }
    match s.char_indices().nth(count - n) {
        Some((i, _)) => &s[i..],
        None => s,
    }
}

/// First `n` chars of `s`, respecting char boundaries.
fn head_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
