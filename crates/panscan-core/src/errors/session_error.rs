//! Session lifecycle errors.

use super::{ConfigError, ErrorCode, ReportError, ScanError, TransportError};

/// Errors surfaced by the session controller.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A scan is already active. At most one session runs per process.
    #[error("A scan session is already in progress")]
    Busy,

    #[error("No active scan session")]
    NoActiveSession,

    #[error("Configuration invalid: {0}")]
    Config(#[from] ConfigError),

    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),

    #[error("Report failed: {0}")]
    Report(#[from] ReportError),

    #[error("Transport failed: {0}")]
    Transport(#[from] TransportError),
}

impl ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Busy => "SESSION_BUSY",
            Self::NoActiveSession => "SESSION_NOT_ACTIVE",
            Self::Config(e) => e.error_code(),
            Self::Scan(e) => e.error_code(),
            Self::Report(e) => e.error_code(),
            Self::Transport(e) => e.error_code(),
        }
    }
}
