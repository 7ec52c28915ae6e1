//! Scan session lifecycle.
//!
//! The controller owns the orchestrator, report builder, audit logger,
//! and HTTPS client as explicit collaborators and enforces
//! single-session-at-a-time: `start` while a session is active is a
//! BUSY error. State machine: Idle → Running → (Stopping →) Idle.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use crossbeam_channel::Sender;
use panscan_core::audit::AuditLogger;
use panscan_core::config::AgentConfig;
use panscan_core::errors::{ReportError, ScanError, SessionError};
use panscan_core::events::ProgressEvent;
use panscan_core::types::{AgentIdentity, ScanSession, ScanState};
use panscan_engine::walker::validate_roots;
use panscan_engine::Scanner;
use panscan_report::wire::serialize_checked;
use panscan_report::{to_wire, ReportBuilder};
use serde::Serialize;
use serde_json::{json, Value};

use crate::client::HttpClient;

/// Local report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

/// Per-run options from the CLI or the remote command.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub send_report: bool,
    pub output_path: Option<PathBuf>,
    pub output_format: OutputFormat,
}

/// Result summary of a finished session.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub scan_id: String,
    /// `completed` or `stopped`.
    pub status: String,
    pub matches_found: usize,
    pub files_scanned: u64,
    pub errors: u64,
    pub report_path: Option<String>,
    pub sent_to_server: bool,
}

struct Inner {
    session: Option<ScanSession>,
}

/// Coordinates one scan session at a time across the pipeline.
pub struct SessionController {
    config: AgentConfig,
    identity: AgentIdentity,
    scanner: Scanner,
    report_builder: ReportBuilder,
    audit: AuditLogger,
    http: Option<HttpClient>,
    inner: Mutex<Inner>,
}

impl SessionController {
    /// Build the controller and its collaborators. The HTTPS client is
    /// only constructed when a server URL is configured.
    pub fn new(config: AgentConfig) -> Result<Self, SessionError> {
        let audit = AuditLogger::new(&config).map_err(|e| {
            SessionError::Config(panscan_core::errors::ConfigError::InvalidValue {
                field: "audit.log_file",
                message: e.to_string(),
            })
        })?;
        let scanner = Scanner::new(&config)?;
        let report_builder = ReportBuilder::new(&config);
        let http = match &config.reporting.server_base_url {
            Some(_) => Some(HttpClient::new(&config.reporting)?),
            None => None,
        };
        let identity = AgentIdentity::from_host();
        tracing::info!(agent_id = identity.agent_id.as_str(), "agent initialized");

        Ok(Self {
            config,
            identity,
            scanner,
            report_builder,
            audit,
            http,
            inner: Mutex::new(Inner { session: None }),
        })
    }

    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    pub fn http(&self) -> Option<&HttpClient> {
        self.http.as_ref()
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    /// Start a new session: validate configuration and roots, register
    /// the session, audit the start.
    pub fn start(
        &self,
        operator: &str,
        roots_override: Option<&[String]>,
    ) -> Result<String, SessionError> {
        let mut inner = self.lock_inner();
        if inner.session.is_some() {
            tracing::warn!("start refused, a session is already active");
            self.audit
                .log_scan_error("-", "start refused: session already in progress");
            return Err(SessionError::Busy);
        }

        let warnings = self.config.validate()?;
        for warning in &warnings {
            self.audit
                .log_security_event("configuration_warning", "high", warning);
        }

        let requested: Vec<String> = match roots_override {
            Some(roots) if !roots.is_empty() => roots.to_vec(),
            _ => self.config.agent.scan_roots.clone(),
        };
        let roots = validate_roots(&requested);
        if roots.is_empty() {
            self.audit
                .log_scan_error("-", "no valid directories to scan");
            return Err(SessionError::Scan(ScanError::NoValidRoots));
        }

        // New session: clear any stop request left from the previous one.
        self.scanner.cancellation().reset();

        let mut session = ScanSession::new(operator, roots, self.config.config_hash());
        session.state = ScanState::Running;
        let scan_id = session.scan_id.to_string();

        self.audit.log_scan_started(
            &scan_id,
            operator,
            &session.roots,
            &session.config_hash,
        );
        tracing::info!(scan_id = scan_id.as_str(), operator, "scan session started");

        inner.session = Some(session);
        Ok(scan_id)
    }

    /// Request the running scan to stop. Running file tasks complete;
    /// queued ones are dropped.
    pub fn stop(&self) {
        let mut inner = self.lock_inner();
        match inner.session.as_mut() {
            Some(session) if session.state == ScanState::Running => {
                tracing::info!(scan_id = %session.scan_id, "stop requested");
                session.state = ScanState::Stopping;
                self.scanner.cancellation().request_stop();
            }
            _ => tracing::info!("no running scan to stop"),
        }
    }

    /// Current agent status snapshot.
    pub fn status(&self) -> Value {
        let inner = self.lock_inner();
        let (scan_id, operator, running) = match &inner.session {
            Some(s) => (
                Some(s.scan_id.to_string()),
                Some(s.operator.clone()),
                matches!(s.state, ScanState::Running | ScanState::Stopping),
            ),
            None => (None, None, false),
        };
        json!({
            "agent_id": self.identity.agent_id,
            "current_scan_id": scan_id,
            "current_operator": operator,
            "scan_running": running,
            "server_configured": self.http.is_some(),
        })
    }

    /// Run the started session to completion: scan, audit findings,
    /// build and save the report, and transmit it when requested.
    pub fn run_to_completion(
        &self,
        events: &Sender<ProgressEvent>,
        options: &RunOptions,
    ) -> Result<ScanSummary, SessionError> {
        let session = {
            let inner = self.lock_inner();
            inner.session.clone().ok_or(SessionError::NoActiveSession)?
        };
        let scan_id = session.scan_id.to_string();

        let outcome = self.scanner.scan(&session.roots, events);

        for m in &outcome.matches {
            self.audit.log_pan_detected(&scan_id, m);
        }
        self.audit.log_scan_completed(
            &scan_id,
            outcome.stats.matches_found,
            outcome.stats.files_scanned,
            outcome.stats.errors,
        );

        let mut summary = ScanSummary {
            scan_id: scan_id.clone(),
            status: if outcome.stopped { "stopped" } else { "completed" }.to_string(),
            matches_found: outcome.matches.len(),
            files_scanned: outcome.stats.files_scanned,
            errors: outcome.stats.errors,
            report_path: None,
            sent_to_server: false,
        };

        // A stopped scan keeps no partial findings and produces no report.
        if !outcome.stopped {
            match self.finish_report(&session, &outcome, options) {
                Ok((path, sent)) => {
                    summary.report_path = Some(path.display().to_string());
                    summary.sent_to_server = sent;
                }
                Err(e) => {
                    self.audit.log_scan_error(&scan_id, &e.to_string());
                    self.finish_session(ScanState::Failed);
                    return Err(e);
                }
            }
        }

        self.finish_session(ScanState::Completed);
        Ok(summary)
    }

    fn finish_report(
        &self,
        session: &ScanSession,
        outcome: &panscan_engine::ScanOutcome,
        options: &RunOptions,
    ) -> Result<(PathBuf, bool), SessionError> {
        let report = self.report_builder.build(
            &self.identity.agent_id,
            session,
            &outcome.matches,
            &outcome.stats,
            &self.config,
        )?;
        self.audit.log_report_generated(
            &session.scan_id.to_string(),
            &report.metadata.report_hash,
            outcome.matches.len(),
        );

        let path = match &options.output_path {
            Some(path) => path.clone(),
            None => default_report_path(&session.scan_id.to_string(), options.output_format),
        };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match options.output_format {
            OutputFormat::Json => {
                let rendered =
                    serde_json::to_string_pretty(&report).map_err(ReportError::Serialize)?;
                std::fs::write(&path, rendered).map_err(|source| ReportError::Write {
                    path: path.display().to_string(),
                    source,
                })?;
            }
            OutputFormat::Csv => {
                panscan_report::export::write_csv(&outcome.matches, &path)?;
            }
        }
        tracing::info!(path = %path.display(), "report saved locally");

        let mut sent = false;
        if options.send_report {
            if self.http.is_some() {
                sent = self.transmit(session, &report);
            } else {
                tracing::warn!("no server configured, report kept local only");
            }
        }
        Ok((path, sent))
    }

    /// Send the wire projection. A sensitive-data gate hit is recorded
    /// as a critical security event and the local report is kept; the
    /// session itself still completes.
    fn transmit(&self, session: &ScanSession, report: &panscan_report::Report) -> bool {
        let scan_id = session.scan_id.to_string();
        let directories: Vec<String> = session
            .roots
            .iter()
            .map(|r| r.display().to_string())
            .collect();
        let wire = to_wire(report, &directories);

        let body = match serialize_checked(&wire) {
            Ok(body) => body,
            Err(e) => {
                self.audit
                    .log_security_event("sensitive_data_leak", "critical", &e.to_string());
                self.audit.log_report_send_failed(&scan_id, &e.to_string());
                return false;
            }
        };

        let http = match &self.http {
            Some(http) => http,
            None => return false,
        };
        match http.post_raw("/api/reports", body) {
            Ok(_) => {
                self.audit
                    .log_report_sent(&scan_id, &report.metadata.timestamp);
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to send report");
                self.audit.log_report_send_failed(&scan_id, &e.to_string());
                false
            }
        }
    }

    fn finish_session(&self, state: ScanState) {
        let mut inner = self.lock_inner();
        if let Some(mut session) = inner.session.take() {
            session.state = state;
            tracing::debug!(scan_id = %session.scan_id, state = ?state, "session finished");
        }
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// `reports/pci_scan_report_<scan_id>_<YYYYMMDD_HHMMSS>.<ext>` under the
/// installation directory.
fn default_report_path(scan_id: &str, format: OutputFormat) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let extension = match format {
        OutputFormat::Json => "json",
        OutputFormat::Csv => "csv",
    };
    install_dir()
        .join("reports")
        .join(format!("pci_scan_report_{scan_id}_{timestamp}.{extension}"))
}

fn install_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}
