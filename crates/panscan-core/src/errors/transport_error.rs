//! Transport errors for the HTTPS client and the event channel.

use super::ErrorCode;

/// Errors raised by server communication. Retries are exhausted before
/// any of these surface.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("No server URL configured")]
    NoServerUrl,

    #[error("HTTP request to {url} failed after {attempts} attempts: {message}")]
    RequestFailed {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("Authentication rejected by server (HTTP {status})")]
    AuthRejected { status: u16 },

    #[error("TLS material unusable: {message}")]
    Tls { message: String },

    #[error("WebSocket error: {message}")]
    WebSocket { message: String },
}

impl ErrorCode for TransportError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NoServerUrl => "TRANSPORT_NO_SERVER_URL",
            Self::RequestFailed { .. } => "TRANSPORT_REQUEST_FAILED",
            Self::AuthRejected { .. } => "TRANSPORT_AUTH_REJECTED",
            Self::Tls { .. } => "TRANSPORT_TLS",
            Self::WebSocket { .. } => "TRANSPORT_WEBSOCKET",
        }
    }
}
