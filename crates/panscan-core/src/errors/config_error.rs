//! Configuration loading and validation errors. All fatal before start.

use super::ErrorCode;

/// Errors raised while loading or validating the agent configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read configuration file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration file is not valid YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Missing required configuration section: {section}")]
    MissingSection { section: &'static str },

    #[error("No scan roots configured")]
    NoScanRoots,

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
}

impl ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Read { .. } => "CONFIG_READ_FAILED",
            Self::Parse(_) => "CONFIG_PARSE_FAILED",
            Self::MissingSection { .. } => "CONFIG_MISSING_SECTION",
            Self::NoScanRoots => "CONFIG_NO_SCAN_ROOTS",
            Self::InvalidValue { .. } => "CONFIG_INVALID_VALUE",
        }
    }
}
