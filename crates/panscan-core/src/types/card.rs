//! Card brands, Luhn validation, and safe PAN renderings.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Payment card brand, recognized from the digit-only candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardBrand {
    Visa,
    Mastercard,
    Amex,
    Discover,
    Diners,
    Jcb,
    Unknown,
}

impl CardBrand {
    /// Stable lowercase name used in reports and audit entries.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Visa => "visa",
            Self::Mastercard => "mastercard",
            Self::Amex => "amex",
            Self::Discover => "discover",
            Self::Diners => "diners",
            Self::Jcb => "jcb",
            Self::Unknown => "unknown",
        }
    }

    /// Major brands carry a confidence bonus and weigh into remediation
    /// priority.
    pub fn is_major(&self) -> bool {
        matches!(self, Self::Visa | Self::Mastercard | Self::Amex)
    }
}

impl std::fmt::Display for CardBrand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Luhn mod-10 check over a candidate.
///
/// Non-digit characters are stripped first, so the result is invariant
/// under whitespace/dash formatting. Candidates outside the PAN length
/// range [13,19] are invalid.
pub fn luhn_valid(candidate: &str) -> bool {
    let digits: Vec<u32> = candidate.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() < 13 || digits.len() > 19 {
        return false;
    }

    let parity = digits.len() % 2;
    let mut checksum = 0;
    for (i, &d) in digits.iter().enumerate() {
        let mut d = d;
        if i % 2 == parity {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        checksum += d;
    }
    checksum % 10 == 0
}

/// Mask a PAN for safe display.
///
/// With `show_last4` the last four digits survive; otherwise every digit
/// is replaced. Inputs shorter than four characters are fully masked.
pub fn mask_pan(pan: &str, show_last4: bool) -> String {
    let n = pan.chars().count();
    if n < 4 || !show_last4 {
        return "*".repeat(n);
    }
    let last4: String = pan.chars().skip(n - 4).collect();
    format!("{}{}", "*".repeat(n - 4), last4)
}

/// SHA-256 hex digest of a PAN, used as a cross-reference without
/// carrying the digits themselves.
pub fn hash_pan(pan: &str) -> String {
    hex::encode(Sha256::digest(pan.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luhn_accepts_known_good_pans() {
        assert!(luhn_valid("4532015112830366"));
        assert!(luhn_valid("5555555555554444"));
        assert!(luhn_valid("378282246310005"));
    }

    #[test]
    fn luhn_rejects_single_digit_error() {
        assert!(!luhn_valid("4532015112830367"));
    }

    #[test]
    fn luhn_ignores_separators() {
        assert_eq!(
            luhn_valid("4532-0151-1283-0366"),
            luhn_valid("4532015112830366")
        );
        assert!(luhn_valid("4532 0151 1283 0366"));
    }

    #[test]
    fn luhn_rejects_out_of_range_lengths() {
        assert!(!luhn_valid(""));
        assert!(!luhn_valid("411111111111"));
        assert!(!luhn_valid("41111111111111111111"));
    }

    #[test]
    fn mask_keeps_last_four() {
        assert_eq!(mask_pan("4532015112830366", true), "************0366");
        assert_eq!(mask_pan("4532015112830366", false), "****************");
        assert_eq!(mask_pan("123", true), "***");
    }

    #[test]
    fn hash_is_stable_sha256_hex() {
        let h = hash_pan("4532015112830366");
        assert_eq!(h.len(), 64);
        assert_eq!(h, hash_pan("4532015112830366"));
        assert_ne!(h, hash_pan("4532015112830367"));
    }
}
