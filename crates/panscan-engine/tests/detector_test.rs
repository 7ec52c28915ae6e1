//! Detection engine tests: brand recognition, Luhn gating, masking
//! discrimination, context extraction, confidence scoring, and the
//! privacy rules for raw digit retention.

use panscan_core::config::{DetectionSection, PrivacySection};
use panscan_core::types::CardBrand;
use panscan_engine::detector::PanDetector;

fn default_detector() -> PanDetector {
    PanDetector::new(&DetectionSection::default(), &PrivacySection::default()).unwrap()
}

fn detector_with(
    detection: DetectionSection,
    privacy: PrivacySection,
) -> PanDetector {
    PanDetector::new(&detection, &privacy).unwrap()
}

// ---- Brand recognition ----

#[test]
fn detects_major_brands() {
    let detector = default_detector();
    assert_eq!(detector.detect_card_type("4532015112830366"), CardBrand::Visa);
    assert_eq!(detector.detect_card_type("5555555555554444"), CardBrand::Mastercard);
    assert_eq!(detector.detect_card_type("378282246310005"), CardBrand::Amex);
    assert_eq!(detector.detect_card_type("6011111111111117"), CardBrand::Discover);
    assert_eq!(detector.detect_card_type("30569309025904"), CardBrand::Diners);
    assert_eq!(detector.detect_card_type("3530111333300000"), CardBrand::Jcb);
}

#[test]
fn unknown_prefix_is_unknown_brand() {
    let detector = default_detector();
    assert_eq!(detector.detect_card_type("1234567890123456"), CardBrand::Unknown);
}

// ---- Scanning: single valid PAN ----

#[test]
fn scan_finds_valid_visa_with_high_confidence() {
    let detector = default_detector();
    let matches = detector.scan_text("Credit card number: 4532015112830366", "test.txt");

    assert_eq!(matches.len(), 1);
    let m = &matches[0];
    assert_eq!(m.card_brand, CardBrand::Visa);
    assert!(m.luhn_valid);
    assert_eq!(m.line_number, 1);
    assert!(m.confidence > 0.7, "confidence was {}", m.confidence);
    assert_eq!(m.masked_rendering, "************0366");
    assert_eq!(m.file_path, "test.txt");
}

#[test]
fn luhn_failure_is_discarded_by_default() {
    let detector = default_detector();
    let matches = detector.scan_text("Invalid card: 4532015112830367", "test.txt");
    assert!(matches.is_empty());
}

#[test]
fn luhn_failure_survives_when_not_required() {
    let detection = DetectionSection {
        require_luhn: Some(false),
        min_confidence: Some(0.3),
        ..Default::default()
    };
    let detector = detector_with(detection, PrivacySection::default());
    let matches = detector.scan_text("Invalid card: 4532015112830367", "test.txt");
    assert_eq!(matches.len(), 1);
    assert!(!matches[0].luhn_valid);
}

// ---- Masking ----

#[test]
fn masked_line_is_skipped_by_default() {
    let detector = default_detector();
    assert!(detector.scan_text("Credit card: ****1234", "test.txt").is_empty());
    assert!(detector.scan_text("Card: XXXX1234", "test.txt").is_empty());
    assert!(detector.scan_text("Card: 4532-****-****-0366", "test.txt").is_empty());
}

#[test]
fn masked_text_recognition() {
    let detector = default_detector();
    assert!(detector.is_masked_text("****1234"));
    assert!(detector.is_masked_text("####1234"));
    assert!(detector.is_masked_text("1234********"));
    assert!(!detector.is_masked_text("4532015112830366"));
}

#[test]
fn per_match_masking_is_recorded_with_penalty() {
    // Allow masked lines through and lower the bar so the penalized
    // match is still emitted.
    let detection = DetectionSection {
        exclude_masked: Some(false),
        min_confidence: Some(0.5),
        ..Default::default()
    };
    let detector = detector_with(detection, PrivacySection::default());
    let matches = detector.scan_text("4532015112830366 ref ****9999", "test.txt");
    assert_eq!(matches.len(), 1);
    assert!(matches[0].is_masked);
    // base 0.3 + luhn 0.4 + major 0.1 - masked 0.2 = 0.6
    assert!((matches[0].confidence - 0.6).abs() < 1e-9);
}

// ---- Multiple matches ----

#[test]
fn finds_all_three_major_brands() {
    let detector = default_detector();
    let text = "Visa card: 4532015112830366\nMasterCard: 5555555555554444\nAmex card: 378282246310005";
    let matches = detector.scan_text(text, "test.txt");

    assert_eq!(matches.len(), 3);
    let brands: Vec<CardBrand> = matches.iter().map(|m| m.card_brand).collect();
    assert!(brands.contains(&CardBrand::Visa));
    assert!(brands.contains(&CardBrand::Mastercard));
    assert!(brands.contains(&CardBrand::Amex));
    assert!(matches.iter().all(|m| m.luhn_valid));
    assert_eq!(
        matches.iter().map(|m| m.line_number).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

#[test]
fn matches_within_a_line_are_in_column_order() {
    let detector = default_detector();
    // Amex first in the line, Visa second; the brand table tries Visa
    // first, so this exercises the re-sort.
    let text = "card 378282246310005 and card 4532015112830366";
    let matches = detector.scan_text(text, "test.txt");
    assert_eq!(matches.len(), 2);
    assert!(matches[0].column_start < matches[1].column_start);
    assert_eq!(matches[0].card_brand, CardBrand::Amex);
    assert_eq!(matches[1].card_brand, CardBrand::Visa);
}

#[test]
fn embedded_digit_runs_do_not_match() {
    let detector = default_detector();
    // 20 digits: the word boundary anchors reject the embedded PAN.
    let matches = detector.scan_text("id 45320151128303669999 end", "test.txt");
    assert!(matches.is_empty());
}

// ---- Context ----

#[test]
fn context_is_extracted_and_capped_at_50_chars() {
    let detector = default_detector();
    let before = "b".repeat(80);
    let after = "a".repeat(80);
    let text = format!("{before} credit card 4532015112830366 {after}");
    let matches = detector.scan_text(&text, "test.txt");

    assert_eq!(matches.len(), 1);
    let m = &matches[0];
    assert!(m.context_before.chars().count() <= 50);
    assert!(m.context_after.chars().count() <= 50);
    assert!(m.context_before.contains("credit card"));
    assert!(m.context_after.starts_with(' '));
}

#[test]
fn context_keywords_raise_confidence() {
    let detection = DetectionSection {
        min_confidence: Some(0.0),
        ..Default::default()
    };
    let detector = detector_with(detection, PrivacySection::default());

    let bare = detector.scan_text("x 4532015112830366 x", "t");
    let keyworded =
        detector.scan_text("credit card payment cvv expiry: 4532015112830366", "t");
    assert!(keyworded[0].confidence > bare[0].confidence);
    // Keyword bonus caps at +0.2: base 0.3 + luhn 0.4 + major 0.1 + 0.2
    assert!((keyworded[0].confidence - 1.0).abs() < 1e-9);
}

// ---- Confidence threshold ----

#[test]
fn tie_at_min_confidence_is_emitted() {
    // Visa, Luhn valid, no keywords, unmasked: 0.3 + 0.4 + 0.1 = 0.8.
    let detection = DetectionSection {
        min_confidence: Some(0.8),
        ..Default::default()
    };
    let detector = detector_with(detection, PrivacySection::default());
    let matches = detector.scan_text("x 4532015112830366 x", "t");
    assert_eq!(matches.len(), 1);
    assert!((matches[0].confidence - 0.8).abs() < 1e-9);
}

#[test]
fn below_min_confidence_is_discarded() {
    let detection = DetectionSection {
        min_confidence: Some(0.81),
        ..Default::default()
    };
    let detector = detector_with(detection, PrivacySection::default());
    assert!(detector.scan_text("x 4532015112830366 x", "t").is_empty());
}

// ---- Privacy ----

#[test]
fn raw_digits_empty_without_retention() {
    let detector = default_detector();
    let matches = detector.scan_text("Credit card: 4532015112830366", "t");
    assert_eq!(matches.len(), 1);
    assert!(matches[0].raw_digits.is_empty());
    assert!(matches[0].pan_hash.is_none());
    // The serialized match must not contain the input digits.
    let serialized = serde_json::to_string(&matches[0]).unwrap();
    assert!(!serialized.contains("4532015112830366"));
}

#[test]
fn raw_digits_and_hash_present_with_retention() {
    let privacy = PrivacySection {
        allow_full_pan_retention: Some(true),
        ..Default::default()
    };
    let detector = detector_with(DetectionSection::default(), privacy);
    let matches = detector.scan_text("Credit card: 4532015112830366", "t");
    assert_eq!(matches[0].raw_digits, "4532015112830366");
    assert_eq!(
        matches[0].pan_hash.as_deref(),
        Some(panscan_core::types::hash_pan("4532015112830366").as_str())
    );
}

#[test]
fn full_masking_without_show_last4() {
    let privacy = PrivacySection {
        show_last4_only: Some(false),
        ..Default::default()
    };
    let detector = detector_with(DetectionSection::default(), privacy);
    let matches = detector.scan_text("Credit card: 4532015112830366", "t");
    assert_eq!(matches[0].masked_rendering, "****************");
}

#[test]
fn masked_rendering_never_exposes_more_than_last4() {
    let detector = default_detector();
    let matches = detector.scan_text("Credit card: 378282246310005", "t");
    let rendering = &matches[0].masked_rendering;
    assert_eq!(rendering, "***********0005");
    let digit_run: String = rendering.chars().filter(char::is_ascii_digit).collect();
    assert!(digit_run.len() <= 4);
}

// ---- Stats ----

#[test]
fn detection_stats_reflect_configuration() {
    let stats = default_detector().detection_stats();
    assert_eq!(stats.card_patterns, 6);
    assert_eq!(stats.masked_patterns, 8);
    assert!(stats.luhn_required);
    assert_eq!(stats.min_confidence, 0.7);
}
