//! Audit log errors. The audit log is best-effort: callers log these to
//! stderr and continue; they never abort a scan.

use super::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Cannot create audit log directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot open audit log {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Audit write failed: {0}")]
    Write(#[from] std::io::Error),
}

impl ErrorCode for AuditError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::CreateDir { .. } => "AUDIT_CREATE_DIR",
            Self::Open { .. } => "AUDIT_OPEN",
            Self::Write(_) => "AUDIT_WRITE",
        }
    }
}
