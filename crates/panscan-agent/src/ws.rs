//! Bidirectional event channel to the management server.
//!
//! Messages are JSON envelopes `{event, data}` over a WebSocket. The
//! client runs a single-threaded loop: it drains outbound events from a
//! channel, sends a heartbeat every 30 seconds, and dispatches inbound
//! `scan-command` messages to the session layer. Reconnection is
//! automatic, up to 5 attempts with a 2-second delay.

use std::net::TcpStream;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use panscan_core::errors::TransportError;
use panscan_core::events::ProgressEvent;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const RECONNECT_ATTEMPTS: u32 = 5;
const RECONNECT_DELAY: Duration = Duration::from_secs(2);
/// Socket read timeout; bounds how stale the heartbeat and outbound
/// queue can get while waiting for server traffic.
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// The JSON message envelope used in both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    pub data: Value,
}

/// A remote scan command received from the server.
#[derive(Debug, Clone)]
pub enum ScanCommand {
    Start {
        directories: Vec<String>,
        operator: String,
    },
    Stop,
    Status,
}

/// Cloneable handle for emitting agent events to the server.
#[derive(Clone)]
pub struct WsEmitter {
    agent_id: String,
    outgoing: Sender<Envelope>,
}

impl WsEmitter {
    pub fn scan_progress(&self, progress: &ProgressEvent) {
        self.emit(
            "scan-progress",
            json!({
                "agent_id": self.agent_id,
                "progress": progress,
                "timestamp": unix_time(),
            }),
        );
    }

    pub fn scan_completed(&self, results: Value) {
        self.emit(
            "scan-completed",
            json!({
                "agent_id": self.agent_id,
                "results": results,
                "timestamp": unix_time(),
            }),
        );
    }

    pub fn scan_error(&self, error: &str) {
        self.emit(
            "scan-error",
            json!({
                "agent_id": self.agent_id,
                "error": error,
                "timestamp": unix_time(),
            }),
        );
    }

    pub fn scan_status(&self, status: Value) {
        self.emit(
            "scan-status-response",
            json!({
                "agent_id": self.agent_id,
                "status": status,
                "timestamp": unix_time(),
            }),
        );
    }

    fn emit(&self, event: &str, data: Value) {
        let envelope = Envelope {
            event: event.to_string(),
            data,
        };
        if self.outgoing.send(envelope).is_err() {
            tracing::debug!(event, "websocket loop gone, event dropped");
        }
    }
}

/// WebSocket client for remote control.
pub struct WsClient {
    url: String,
    agent_id: String,
    commands: Sender<ScanCommand>,
    outgoing: Receiver<Envelope>,
}

impl WsClient {
    /// Create the client and its emitter handle. `commands` receives
    /// parsed `scan-command` messages; the emitter feeds the outbound
    /// queue drained by [`WsClient::run`].
    pub fn new(
        url: &str,
        agent_id: &str,
        commands: Sender<ScanCommand>,
    ) -> (Self, WsEmitter) {
        let (outgoing_tx, outgoing_rx) = crossbeam_channel::unbounded();
        let emitter = WsEmitter {
            agent_id: agent_id.to_string(),
            outgoing: outgoing_tx,
        };
        (
            Self {
                url: url.to_string(),
                agent_id: agent_id.to_string(),
                commands,
                outgoing: outgoing_rx,
            },
            emitter,
        )
    }

    /// Connect and serve until the reconnect attempts are exhausted.
    /// Intended to run on its own thread.
    pub fn run(&self) {
        let mut attempts = 0;
        loop {
            match self.connect_and_serve() {
                Ok(()) => {
                    tracing::info!("websocket closed by server, reconnecting");
                    attempts = 0;
                }
                Err(e) => {
                    attempts += 1;
                    tracing::warn!(error = %e, attempts, "websocket connection failed");
                    if attempts >= RECONNECT_ATTEMPTS {
                        tracing::error!("websocket reconnect attempts exhausted");
                        return;
                    }
                }
            }
            std::thread::sleep(RECONNECT_DELAY);
        }
    }

    fn connect_and_serve(&self) -> Result<(), TransportError> {
        tracing::info!(url = self.url.as_str(), "connecting to websocket server");
        let (mut socket, _) = tungstenite::connect(self.url.as_str()).map_err(|e| {
            TransportError::WebSocket {
                message: e.to_string(),
            }
        })?;
        set_read_timeout(&mut socket);

        self.send(&mut socket, "join-agent", json!(self.agent_id))?;
        tracing::info!("connected and joined agent room");

        let mut last_heartbeat = Instant::now();
        loop {
            while let Ok(envelope) = self.outgoing.try_recv() {
                self.send(&mut socket, &envelope.event, envelope.data)?;
            }

            if last_heartbeat.elapsed() >= HEARTBEAT_INTERVAL {
                self.send(
                    &mut socket,
                    "heartbeat",
                    json!({ "agent_id": self.agent_id, "timestamp": unix_time() }),
                )?;
                last_heartbeat = Instant::now();
            }

            match socket.read() {
                Ok(Message::Text(text)) => self.dispatch(&text),
                Ok(Message::Close(_)) => return Ok(()),
                Ok(_) => {}
                Err(tungstenite::Error::Io(e))
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) => {}
                Err(e) => {
                    return Err(TransportError::WebSocket {
                        message: e.to_string(),
                    })
                }
            }
        }
    }

    fn dispatch(&self, text: &str) {
        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!(error = %e, "unparseable websocket message");
                return;
            }
        };

        match envelope.event.as_str() {
            "heartbeat-ack" => tracing::trace!("heartbeat acknowledged"),
            "scan-command" => {
                if let Some(command) = parse_scan_command(&envelope.data) {
                    tracing::info!(?command, "received scan command");
                    if self.commands.send(command).is_err() {
                        tracing::error!("command consumer gone");
                    }
                } else {
                    tracing::warn!(data = %envelope.data, "malformed scan command");
                }
            }
            other => tracing::debug!(event = other, "unhandled websocket event"),
        }
    }

    fn send(
        &self,
        socket: &mut WebSocket<MaybeTlsStream<TcpStream>>,
        event: &str,
        data: Value,
    ) -> Result<(), TransportError> {
        let envelope = Envelope {
            event: event.to_string(),
            data,
        };
        let text = serde_json::to_string(&envelope).map_err(|e| TransportError::WebSocket {
            message: e.to_string(),
        })?;
        socket
            .send(Message::Text(text))
            .map_err(|e| TransportError::WebSocket {
                message: e.to_string(),
            })
    }
}

fn parse_scan_command(data: &Value) -> Option<ScanCommand> {
    match data.get("action")?.as_str()? {
        "start" => {
            let directories = data
                .get("directories")
                .and_then(Value::as_array)
                .map(|a| {
                    a.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            let operator = data
                .get("operator")
                .and_then(Value::as_str)
                .unwrap_or("Remote Operator")
                .to_string();
            Some(ScanCommand::Start {
                directories,
                operator,
            })
        }
        "stop" => Some(ScanCommand::Stop),
        "status" => Some(ScanCommand::Status),
        _ => None,
    }
}

fn set_read_timeout(socket: &mut WebSocket<MaybeTlsStream<TcpStream>>) {
    if let MaybeTlsStream::Plain(stream) = socket.get_mut() {
        let _ = stream.set_read_timeout(Some(READ_TIMEOUT));
    }
}

fn unix_time() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start_command() {
        let data = json!({
            "action": "start",
            "directories": ["/var/www", "/tmp"],
            "operator": "remote-op",
        });
        match parse_scan_command(&data) {
            Some(ScanCommand::Start {
                directories,
                operator,
            }) => {
                assert_eq!(directories, vec!["/var/www", "/tmp"]);
                assert_eq!(operator, "remote-op");
            }
            other => panic!("expected Start, got {other:?}"),
        }
    }

    #[test]
    fn start_without_operator_gets_default() {
        let data = json!({ "action": "start" });
        match parse_scan_command(&data) {
            Some(ScanCommand::Start { operator, .. }) => {
                assert_eq!(operator, "Remote Operator")
            }
            other => panic!("expected Start, got {other:?}"),
        }
    }

    #[test]
    fn parses_stop_status_and_rejects_unknown() {
        assert!(matches!(
            parse_scan_command(&json!({"action": "stop"})),
            Some(ScanCommand::Stop)
        ));
        assert!(matches!(
            parse_scan_command(&json!({"action": "status"})),
            Some(ScanCommand::Status)
        ));
        assert!(parse_scan_command(&json!({"action": "reboot"})).is_none());
        assert!(parse_scan_command(&json!({})).is_none());
    }
}
