//! # panscan-core
//!
//! Foundation crate for the panscan PCI compliance agent.
//! Defines configuration, errors, domain types, progress events, and the
//! tamper-evident audit log. Every other crate in the workspace depends
//! on this.

pub mod audit;
pub mod config;
pub mod errors;
pub mod events;
pub mod sanitize;
pub mod types;

// Re-export the most commonly used types at the crate root.
pub use config::AgentConfig;
pub use errors::ErrorCode;
pub use events::ProgressEvent;
pub use types::card::CardBrand;
pub use types::matches::{PanMatch, ScanStats};
pub use types::session::{AgentIdentity, ScanSession, ScanState};
