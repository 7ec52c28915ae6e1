//! Scan session lifecycle and agent identity.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Session states. `Stopping` is entered when a stop is requested while
/// running; the session drains and lands back in a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    Pending,
    Running,
    Stopping,
    Completed,
    Failed,
}

/// A single start→complete/fail cycle. At most one active per process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSession {
    pub scan_id: Uuid,
    pub operator: String,
    pub started_at: DateTime<Utc>,
    /// Validated absolute directory paths.
    pub roots: Vec<PathBuf>,
    pub config_hash: String,
    pub state: ScanState,
}

impl ScanSession {
    pub fn new(operator: &str, roots: Vec<PathBuf>, config_hash: String) -> Self {
        Self {
            scan_id: Uuid::new_v4(),
            operator: operator.to_string(),
            started_at: Utc::now(),
            roots,
            config_hash,
            state: ScanState::Pending,
        }
    }
}

/// Stable machine-derived agent identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentIdentity {
    /// `pci-agent-` followed by 16 hex digits derived from the host.
    pub agent_id: String,
    pub hostname: String,
}

impl AgentIdentity {
    /// Derive the identity from hostname, OS, and architecture so the id
    /// is stable across restarts on the same machine.
    pub fn from_host() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown-host".to_string());
        let machine_info = format!(
            "{}-{}-{}",
            hostname,
            std::env::consts::OS,
            std::env::consts::ARCH
        );
        let digest = hex::encode(Sha256::digest(machine_info.as_bytes()));
        Self {
            agent_id: format!("pci-agent-{}", &digest[..16]),
            hostname,
        }
    }

    /// Registration payload for `POST /api/agents/register`.
    pub fn registration_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "agent_id": self.agent_id,
            "hostname": self.hostname,
            "version": env!("CARGO_PKG_VERSION"),
            "os_info": {
                "system": std::env::consts::OS,
                "release": "",
                "version": "",
                "machine": std::env::consts::ARCH,
                "processor": std::env::consts::ARCH,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_id_is_stable_and_prefixed() {
        let a = AgentIdentity::from_host();
        let b = AgentIdentity::from_host();
        assert_eq!(a.agent_id, b.agent_id);
        assert!(a.agent_id.starts_with("pci-agent-"));
        assert_eq!(a.agent_id.len(), "pci-agent-".len() + 16);
    }

    #[test]
    fn new_session_is_pending_with_v4_id() {
        let session = ScanSession::new("auditor", vec![PathBuf::from("/tmp")], "ab".into());
        assert_eq!(session.state, ScanState::Pending);
        assert_eq!(session.scan_id.get_version_num(), 4);
    }
}
