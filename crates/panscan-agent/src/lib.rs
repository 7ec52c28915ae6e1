//! # panscan-agent
//!
//! Host-resident agent tying the scan pipeline together: session
//! lifecycle, HTTPS reporting client, and the bidirectional WebSocket
//! control channel.

pub mod client;
pub mod session;
pub mod ws;

pub use client::HttpClient;
pub use session::{OutputFormat, RunOptions, ScanSummary, SessionController};
pub use ws::{WsClient, WsEmitter};
