//! Agent configuration.
//!
//! Loaded once at startup from a YAML file with sections `agent`,
//! `detection`, `privacy`, `reporting`, and `audit`, then referenced
//! read-only for the lifetime of the process. Unknown keys are ignored
//! for forward compatibility; missing required sections fail validation.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::ConfigError;

/// Top-level agent configuration, immutable per session.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AgentConfig {
    pub agent: AgentSection,
    pub detection: DetectionSection,
    pub privacy: PrivacySection,
    pub reporting: ReportingSection,
    pub audit: AuditSection,
}

/// Filesystem traversal and worker pool options.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AgentSection {
    /// Directories to scan. A single entry `*` requests a whole-system scan.
    pub scan_roots: Vec<String>,
    /// Glob patterns excluding paths (matched against the forward-slash
    /// normalized path or its containing directory).
    pub exclude_globs: Vec<String>,
    /// Maximum file size in bytes. Default: 10 MiB.
    pub max_file_size_bytes: Option<u64>,
    /// If non-empty, only files with these extensions are scanned
    /// (case-insensitive, leading dot optional).
    pub extension_allowlist: Vec<String>,
    /// Maximum files yielded per scan. 0 = unbounded. Default: 10000.
    pub max_files: Option<usize>,
    /// Maximum recursion depth, root = 0. 0 = unbounded. Default: 8.
    pub max_depth: Option<usize>,
    /// Worker pool size. Default: 4.
    pub concurrency: Option<usize>,
    /// Scan files with text MIME types. Default: true.
    pub scan_text_files: Option<bool>,
    /// Scan files with binary MIME types. Default: false.
    pub scan_binary_files: Option<bool>,
}

impl AgentSection {
    pub fn effective_max_file_size(&self) -> u64 {
        self.max_file_size_bytes.unwrap_or(10 * 1024 * 1024)
    }

    /// File cap as an Option; `None` means unbounded.
    pub fn effective_max_files(&self) -> Option<usize> {
        match self.max_files.unwrap_or(10_000) {
            0 => None,
            n => Some(n),
        }
    }

    /// Depth cap as an Option; `None` means unbounded.
    pub fn effective_max_depth(&self) -> Option<usize> {
        match self.max_depth.unwrap_or(8) {
            0 => None,
            n => Some(n),
        }
    }

    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.unwrap_or(4).max(1)
    }

    pub fn effective_scan_text_files(&self) -> bool {
        self.scan_text_files.unwrap_or(true)
    }

    pub fn effective_scan_binary_files(&self) -> bool {
        self.scan_binary_files.unwrap_or(false)
    }
}

/// PAN detection thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DetectionSection {
    /// Discard candidates that fail the Luhn check. Default: true.
    pub require_luhn: Option<bool>,
    /// Minimum confidence score in [0,1] for a match to be emitted.
    /// Default: 0.7.
    pub min_confidence: Option<f64>,
    /// Context window width (chars each side) used for scoring. Default: 100.
    pub context_window_chars: Option<usize>,
    /// Skip lines consisting of masked renderings. Default: true.
    pub exclude_masked: Option<bool>,
}

impl DetectionSection {
    pub fn effective_require_luhn(&self) -> bool {
        self.require_luhn.unwrap_or(true)
    }

    pub fn effective_min_confidence(&self) -> f64 {
        self.min_confidence.unwrap_or(0.7)
    }

    pub fn effective_context_window(&self) -> usize {
        self.context_window_chars.unwrap_or(100)
    }

    pub fn effective_exclude_masked(&self) -> bool {
        self.exclude_masked.unwrap_or(true)
    }
}

/// Privacy controls. These gate every place raw PAN material could
/// otherwise appear.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PrivacySection {
    /// Keep raw digits on matches. Default: false. Requires explicit
    /// authorization; enabling it is audited as a security event.
    pub allow_full_pan_retention: Option<bool>,
    /// Never place full PANs in reports even when retention is on.
    /// Default: true.
    pub redact_pan: Option<bool>,
    /// Masked renderings keep the last four digits. Default: true.
    pub show_last4_only: Option<bool>,
    /// Carry SHA-256 cross-reference hashes on findings. Default: true.
    pub hash_sensitive_data: Option<bool>,
    /// Log per-file detail (paths, file access) to the audit log.
    /// Default: true.
    pub enable_detailed_logging: Option<bool>,
}

impl PrivacySection {
    pub fn effective_allow_full_pan_retention(&self) -> bool {
        self.allow_full_pan_retention.unwrap_or(false)
    }

    pub fn effective_redact_pan(&self) -> bool {
        self.redact_pan.unwrap_or(true)
    }

    pub fn effective_show_last4_only(&self) -> bool {
        self.show_last4_only.unwrap_or(true)
    }

    pub fn effective_hash_sensitive_data(&self) -> bool {
        self.hash_sensitive_data.unwrap_or(true)
    }

    pub fn effective_detailed_logging(&self) -> bool {
        self.enable_detailed_logging.unwrap_or(true)
    }
}

/// Server communication options.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReportingSection {
    pub server_base_url: Option<String>,
    pub websocket_url: Option<String>,
    pub api_token: Option<String>,
    pub tls: TlsSection,
    /// Retry attempts after the initial request. Default: 3.
    pub max_retries: Option<u32>,
    /// Delay between retries in seconds, doubled on HTTP 429. Default: 5.
    pub retry_delay_seconds: Option<u64>,
    /// Sliding-window outbound rate limit. Default: 10.
    pub max_requests_per_minute: Option<u32>,
}

impl ReportingSection {
    pub fn effective_max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(3)
    }

    pub fn effective_retry_delay_seconds(&self) -> u64 {
        self.retry_delay_seconds.unwrap_or(5)
    }

    pub fn effective_max_requests_per_minute(&self) -> u32 {
        self.max_requests_per_minute.unwrap_or(10)
    }
}

/// TLS material for the HTTPS client.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TlsSection {
    /// Verify server certificates. Default: true.
    pub verify: Option<bool>,
    /// PEM file overriding the system CA store.
    pub ca_cert: Option<String>,
    /// Client certificate PEM for mutual TLS.
    pub client_cert: Option<String>,
    /// Client private key PEM for mutual TLS.
    pub client_key: Option<String>,
}

impl TlsSection {
    pub fn effective_verify(&self) -> bool {
        self.verify.unwrap_or(true)
    }
}

/// Audit log options.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AuditSection {
    /// Audit log path. Relative paths resolve against the installation
    /// directory. Default: "logs/audit.log".
    pub log_file: Option<String>,
}

impl AuditSection {
    pub fn effective_log_file(&self) -> &str {
        self.log_file.as_deref().unwrap_or("logs/audit.log")
    }
}

/// Sections that must be present in the configuration file.
const REQUIRED_SECTIONS: &[&str] = &["agent", "detection", "privacy", "reporting"];

impl AgentConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&raw)
    }

    /// Parse configuration from YAML text.
    ///
    /// Required sections are checked against the raw document before
    /// typed deserialization so that serde defaults cannot paper over a
    /// missing section. Unknown keys inside sections are ignored.
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let value: serde_yaml::Value = serde_yaml::from_str(raw)?;
        for section in REQUIRED_SECTIONS {
            if value.get(section).is_none() {
                return Err(ConfigError::MissingSection { section });
            }
        }
        let config: AgentConfig = serde_yaml::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate value ranges and required settings.
    ///
    /// Returns human-readable warnings for settings that are legal but
    /// security-relevant; the session controller records them as
    /// `security_event` audit entries.
    pub fn validate(&self) -> Result<Vec<String>, ConfigError> {
        if self.agent.scan_roots.is_empty() {
            return Err(ConfigError::NoScanRoots);
        }

        let min_confidence = self.detection.effective_min_confidence();
        if !(0.0..=1.0).contains(&min_confidence) {
            return Err(ConfigError::InvalidValue {
                field: "detection.min_confidence",
                message: format!("{min_confidence} is outside [0,1]"),
            });
        }

        let mut warnings = Vec::new();
        if self.privacy.effective_allow_full_pan_retention() {
            warnings.push(
                "full PAN retention is ENABLED - ensure explicit authorization".to_string(),
            );
        }
        if let Some(url) = &self.reporting.server_base_url {
            if !url.starts_with("https://") {
                warnings.push(format!("server URL {url} does not use HTTPS"));
            }
        }
        Ok(warnings)
    }

    /// Short hash of the configuration for the audit trail.
    ///
    /// Serialized through `serde_json` (sorted keys) so the hash is
    /// stable across key ordering in the source YAML.
    pub fn config_hash(&self) -> String {
        let canonical = serde_json::to_value(self)
            .and_then(|v| serde_json::to_string(&v))
            .unwrap_or_default();
        let digest = Sha256::digest(canonical.as_bytes());
        hex::encode(digest)[..16].to_string()
    }
}
