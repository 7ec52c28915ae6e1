//! Blocking HTTPS client for the management server.
//!
//! Requests honor a 30-second per-attempt timeout, bounded retries with
//! a fixed delay (doubled after an HTTP 429), and a sliding-window rate
//! limit shared by all calls through one client instance.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use panscan_core::config::ReportingSection;
use panscan_core::errors::TransportError;
use panscan_core::types::AgentIdentity;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Certificate, Identity, StatusCode};
use serde_json::Value;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const RATE_WINDOW: Duration = Duration::from_secs(60);

struct RateWindow {
    window_start: Instant,
    count: u32,
}

/// HTTPS client with retry, rate limiting, and optional mutual TLS.
pub struct HttpClient {
    client: Client,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
    max_requests_per_minute: u32,
    rate: Mutex<RateWindow>,
}

impl HttpClient {
    pub fn new(reporting: &ReportingSection) -> Result<Self, TransportError> {
        let base_url = reporting
            .server_base_url
            .clone()
            .ok_or(TransportError::NoServerUrl)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = &reporting.api_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                TransportError::Tls {
                    message: "API token contains invalid header characters".to_string(),
                }
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("PCI-Compliance-Agent/1.0")
            .default_headers(headers);

        let tls = &reporting.tls;
        if !tls.effective_verify() {
            tracing::warn!("TLS verification disabled - not recommended for production");
            builder = builder.danger_accept_invalid_certs(true);
        } else if let Some(ca_path) = &tls.ca_cert {
            let pem = std::fs::read(ca_path).map_err(|e| TransportError::Tls {
                message: format!("cannot read CA certificate {ca_path}: {e}"),
            })?;
            let certificate = Certificate::from_pem(&pem).map_err(|e| TransportError::Tls {
                message: format!("invalid CA certificate {ca_path}: {e}"),
            })?;
            builder = builder.add_root_certificate(certificate);
            tracing::info!(ca = %ca_path, "using CA certificate override");
        }

        if let (Some(cert_path), Some(key_path)) = (&tls.client_cert, &tls.client_key) {
            let mut pem = std::fs::read(cert_path).map_err(|e| TransportError::Tls {
                message: format!("cannot read client certificate {cert_path}: {e}"),
            })?;
            pem.extend(std::fs::read(key_path).map_err(|e| TransportError::Tls {
                message: format!("cannot read client key {key_path}: {e}"),
            })?);
            let identity = Identity::from_pem(&pem).map_err(|e| TransportError::Tls {
                message: format!("invalid client identity: {e}"),
            })?;
            builder = builder.identity(identity);
            tracing::info!("client certificate authentication configured");
        }

        let client = builder.build().map_err(|e| TransportError::Tls {
            message: format!("cannot build HTTP client: {e}"),
        })?;

        Ok(Self {
            client,
            base_url,
            max_retries: reporting.effective_max_retries(),
            retry_delay: Duration::from_secs(reporting.effective_retry_delay_seconds()),
            max_requests_per_minute: reporting.effective_max_requests_per_minute(),
            rate: Mutex::new(RateWindow {
                window_start: Instant::now(),
                count: 0,
            }),
        })
    }

    /// Post a pre-serialized JSON body. Used for reports, whose bytes
    /// have already passed the sensitive-data gate.
    pub fn post_raw(&self, path: &str, body: String) -> Result<Value, TransportError> {
        self.request("POST", path, Some(body))
    }

    pub fn post_json(&self, path: &str, body: &Value) -> Result<Value, TransportError> {
        self.request("POST", path, Some(body.to_string()))
    }

    pub fn get(&self, path: &str) -> Result<Value, TransportError> {
        self.request("GET", path, None)
    }

    /// Register this agent with the server.
    pub fn register_agent(&self, identity: &AgentIdentity) -> Result<Value, TransportError> {
        self.post_json("/api/agents/register", &identity.registration_payload())
    }

    /// `GET /api/health` connectivity probe.
    pub fn test_connection(&self) -> bool {
        self.get("/api/health").is_ok()
    }

    pub fn server_info(&self) -> Result<Value, TransportError> {
        self.get("/api/info")
    }

    /// Block until the sliding window admits another request.
    fn check_rate_limit(&self) {
        let mut rate = self
            .rate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if rate.window_start.elapsed() > RATE_WINDOW {
            rate.count = 0;
            rate.window_start = Instant::now();
        }

        if rate.count >= self.max_requests_per_minute {
            let wait = RATE_WINDOW.saturating_sub(rate.window_start.elapsed());
            if !wait.is_zero() {
                tracing::info!(seconds = wait.as_secs_f64(), "rate limit reached, waiting");
                std::thread::sleep(wait);
            }
            rate.count = 0;
            rate.window_start = Instant::now();
        }

        rate.count += 1;
    }

    fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<String>,
    ) -> Result<Value, TransportError> {
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );

        let attempts = self.max_retries + 1;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            self.check_rate_limit();
            tracing::debug!(method, url = url.as_str(), attempt, "sending request");

            let request = match method {
                "POST" => self.client.post(&url).body(body.clone().unwrap_or_default()),
                _ => self.client.get(&url),
            };

            match request.send() {
                Ok(response) => {
                    let status = response.status();
                    match status {
                        StatusCode::OK | StatusCode::CREATED => {
                            return Ok(response.json().unwrap_or(Value::Object(Default::default())));
                        }
                        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                            return Err(TransportError::AuthRejected {
                                status: status.as_u16(),
                            });
                        }
                        StatusCode::TOO_MANY_REQUESTS => {
                            tracing::warn!(url = url.as_str(), "server rate limit exceeded");
                            last_error = format!("HTTP {status}");
                            std::thread::sleep(self.retry_delay * 2);
                            continue;
                        }
                        other => {
                            last_error = format!("HTTP {other}");
                            tracing::warn!(url = url.as_str(), status = %other, "request failed");
                        }
                    }
                }
                Err(e) => {
                    last_error = e.to_string();
                    tracing::warn!(url = url.as_str(), attempt, error = %e, "request error");
                }
            }

            if attempt < attempts {
                std::thread::sleep(self.retry_delay);
            }
        }

        Err(TransportError::RequestFailed {
            url,
            attempts,
            message: last_error,
        })
    }
}
