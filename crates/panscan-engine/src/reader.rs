//! Per-file content acquisition.
//!
//! The reader decides whether a file is scannable (size, extension,
//! MIME class) and produces decoded text for the detector. Every
//! per-file failure is a skip, never an abort.
//!
//! MIME resolution is deterministic:
//!   1. a 0x00 byte in the first 8 KiB forces `application/octet-stream`
//!      regardless of extension;
//!   2. otherwise the extension table of `mime_guess` decides;
//!   3. extensions the table does not know fall back to
//!      `application/octet-stream`, except the text-like set below
//!      (`json`, `xml`, `js`, `sql`, `yaml`, `yml`), which map to their
//!      application MIME.
//!
//! Text MIMEs and the five text-like application MIMEs are scanned when
//! `scan_text_files` is on; everything else only when
//! `scan_binary_files` is on.

use std::path::Path;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use panscan_core::config::AgentSection;

/// How many leading bytes feed MIME and charset sniffing.
const SNIFF_LEN: usize = 8192;

/// Application MIMEs that are text in practice.
const TEXT_LIKE_APPLICATION_MIMES: &[&str] = &[
    "application/json",
    "application/xml",
    "application/javascript",
    "application/sql",
    "application/yaml",
];

/// Extensions mapped to a text-like MIME when `mime_guess` has no entry.
const TEXT_LIKE_EXTENSION_FALLBACK: &[(&str, &str)] = &[
    ("json", "application/json"),
    ("xml", "application/xml"),
    ("js", "application/javascript"),
    ("sql", "application/sql"),
    ("yaml", "application/yaml"),
    ("yml", "application/yaml"),
];

/// Why a file produced no scannable content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Exceeds `max_file_size_bytes`.
    TooLarge,
    /// Extension not in the configured allowlist.
    ExtensionNotAllowed,
    /// MIME class disabled by `scan_text_files` / `scan_binary_files`.
    TypeNotScanned,
    /// Empty after decoding.
    NoContent,
    /// Filesystem error reading the file. Counted as an error, not a skip.
    Unreadable,
}

/// Result of reading one file.
#[derive(Debug)]
pub enum ReadOutcome {
    Content(String),
    Skipped(SkipReason),
}

/// Encoding-aware file reader.
pub struct FileReader {
    max_file_size: u64,
    allowlist: Vec<String>,
    scan_text: bool,
    scan_binary: bool,
}

impl FileReader {
    pub fn new(agent: &AgentSection) -> Self {
        // Normalize the allowlist once: lowercase, no leading dot.
        let allowlist = agent
            .extension_allowlist
            .iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .collect();
        Self {
            max_file_size: agent.effective_max_file_size(),
            allowlist,
            scan_text: agent.effective_scan_text_files(),
            scan_binary: agent.effective_scan_binary_files(),
        }
    }

    /// Read a file's content for scanning, or a reason it was skipped.
    pub fn read(&self, path: &Path) -> ReadOutcome {
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "cannot stat file");
                return ReadOutcome::Skipped(SkipReason::Unreadable);
            }
        };

        if metadata.len() > self.max_file_size {
            tracing::debug!(path = %path.display(), size = metadata.len(), "file exceeds size limit");
            return ReadOutcome::Skipped(SkipReason::TooLarge);
        }

        if !self.allowlist.is_empty() {
            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_lowercase)
                .unwrap_or_default();
            if !self.allowlist.contains(&extension) {
                return ReadOutcome::Skipped(SkipReason::ExtensionNotAllowed);
            }
        }

        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "cannot read file");
                return ReadOutcome::Skipped(SkipReason::Unreadable);
            }
        };

        let sniff = &bytes[..bytes.len().min(SNIFF_LEN)];
        let mime = resolve_mime(path, sniff);
        if !self.should_scan_mime(&mime) {
            tracing::debug!(path = %path.display(), mime = %mime, "mime type not scanned");
            return ReadOutcome::Skipped(SkipReason::TypeNotScanned);
        }

        match decode(&bytes, sniff) {
            Some(text) => ReadOutcome::Content(text),
            None => ReadOutcome::Skipped(SkipReason::NoContent),
        }
    }

    fn should_scan_mime(&self, mime: &str) -> bool {
        if mime.starts_with("text/") || TEXT_LIKE_APPLICATION_MIMES.contains(&mime) {
            self.scan_text
        } else {
            self.scan_binary
        }
    }
}

/// Resolve a MIME type per the table in the module docs.
fn resolve_mime(path: &Path, sniff: &[u8]) -> String {
    if sniff.contains(&0) {
        return "application/octet-stream".to_string();
    }

    if let Some(mime) = mime_guess::from_path(path).first_raw() {
        return mime.to_string();
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    for (ext, mime) in TEXT_LIKE_EXTENSION_FALLBACK {
        if *ext == extension {
            return (*mime).to_string();
        }
    }

    "application/octet-stream".to_string()
}

/// Decode file bytes to text.
///
/// The charset is sniffed from the leading bytes, then the decode ladder
/// {detected, utf-8, windows-1252} is tried in order with replacement of
/// undecodable sequences; the first non-empty result wins. (The latin1
/// and cp1252 labels both resolve to windows-1252 under the WHATWG
/// encoding standard, so one attempt covers both.)
fn decode(bytes: &[u8], sniff: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }

    let mut detector = EncodingDetector::new();
    detector.feed(sniff, bytes.len() <= sniff.len());
    let detected = detector.guess(None, true);

    let ladder: [&'static Encoding; 3] = [detected, UTF_8, WINDOWS_1252];
    for encoding in ladder {
        let (text, _, _) = encoding.decode(bytes);
        if !text.is_empty() {
            return Some(text.into_owned());
        }
    }
    None
}
