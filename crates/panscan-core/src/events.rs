//! Typed progress event stream.
//!
//! The orchestrator emits these over a channel; the session controller
//! consumes them and fans out to the CLI printer or the WebSocket
//! connection. Using a message stream instead of a callback keeps
//! orchestrator throughput independent of consumer speed.

use serde::{Deserialize, Serialize};

/// How a scan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStatus {
    Completed,
    Stopped,
}

/// Progress events for a single scan session.
///
/// `files_scanned` is monotonic within a session; the final event is
/// always a `Complete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum ProgressEvent {
    /// Pass 1 tick, emitted every 1,000 enumerated paths.
    Counting { total_files: usize },

    /// Pass 2 tick, emitted per completed file.
    Scanning {
        files_scanned: usize,
        total_files: usize,
        matches_found: usize,
        current_file: String,
        in_queue: usize,
        percentage: f64,
    },

    /// Terminal event.
    Complete {
        files_scanned: usize,
        total_files: usize,
        matches_found: usize,
        status: CompletionStatus,
        completed: bool,
    },
}

impl ProgressEvent {
    pub fn complete(
        files_scanned: usize,
        total_files: usize,
        matches_found: usize,
        stopped: bool,
    ) -> Self {
        Self::Complete {
            files_scanned,
            total_files,
            matches_found,
            status: if stopped {
                CompletionStatus::Stopped
            } else {
                CompletionStatus::Completed
            },
            completed: !stopped,
        }
    }
}
