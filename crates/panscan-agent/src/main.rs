//! CLI entry point for the PCI compliance scanning agent.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use crossbeam_channel::unbounded;
use panscan_agent::ws::{ScanCommand, WsClient};
use panscan_agent::{OutputFormat, RunOptions, SessionController};
use panscan_core::config::AgentConfig;
use panscan_core::events::ProgressEvent;
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "panscan", version, about = "PCI compliance scanning agent")]
struct Cli {
    /// Configuration file path.
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Operator name for the audit trail. Required unless running in
    /// WebSocket mode.
    #[arg(short, long)]
    operator: Option<String>,

    /// Directories to scan, overriding the configuration. A single `*`
    /// requests a whole-system scan.
    #[arg(short, long, num_args = 1..)]
    directories: Option<Vec<String>>,

    /// Output file for the local report.
    #[arg(short = 'O', long)]
    output: Option<PathBuf>,

    /// Skip sending the report to the server.
    #[arg(long)]
    no_send: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Run under remote control over the event channel.
    #[arg(long)]
    websocket_mode: bool,

    /// Server URL override for reporting and the event channel.
    #[arg(long)]
    server_url: Option<String>,

    /// Local report format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    output_format: OutputFormat,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            eprintln!("Agent execution failed: {e:#}");
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let mut config = AgentConfig::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    if let Some(url) = &cli.server_url {
        config.reporting.server_base_url = Some(url.clone());
        let ws_url = url
            .replacen("https://", "wss://", 1)
            .replacen("http://", "ws://", 1);
        config.reporting.websocket_url = Some(ws_url);
    }

    let controller = Arc::new(SessionController::new(config.clone())?);

    // A user interrupt stops the running scan and exits 130.
    {
        let controller = Arc::clone(&controller);
        ctrlc::set_handler(move || {
            tracing::info!("interrupt received, stopping");
            controller.stop();
            std::process::exit(130);
        })
        .context("installing interrupt handler")?;
    }

    if cli.websocket_mode {
        return run_websocket_mode(&cli, &config, controller);
    }

    let Some(operator) = cli.operator.clone() else {
        bail!("operator name is required for CLI scans (--operator)");
    };

    let scan_id = controller.start(&operator, cli.directories.as_deref())?;
    println!("Scan session started: {scan_id}");

    let (progress_tx, progress_rx) = unbounded();
    let printer = std::thread::spawn(move || {
        for event in progress_rx.iter() {
            if let ProgressEvent::Scanning {
                files_scanned,
                total_files,
                matches_found,
                ..
            } = event
            {
                println!(
                    "Progress: {files_scanned}/{total_files} files, {matches_found} matches found"
                );
            }
        }
    });

    let options = RunOptions {
        send_report: !cli.no_send,
        output_path: cli.output.clone(),
        output_format: cli.output_format,
    };
    let summary = controller.run_to_completion(&progress_tx, &options);
    drop(progress_tx);
    let _ = printer.join();

    let summary = summary?;
    if let Some(path) = &summary.report_path {
        println!("Report saved to: {path}");
    }
    if options.send_report {
        println!(
            "Report sent to server: {}",
            if summary.sent_to_server { "yes" } else { "no" }
        );
    }

    println!("\nScan Summary:");
    println!("Scan ID: {}", summary.scan_id);
    println!("Status: {}", summary.status);
    println!("Files scanned: {}", summary.files_scanned);
    println!("Potential PANs found: {}", summary.matches_found);
    println!("Errors: {}", summary.errors);

    Ok(if summary.matches_found == 0 { 0 } else { 1 })
}

fn run_websocket_mode(
    cli: &Cli,
    config: &AgentConfig,
    controller: Arc<SessionController>,
) -> anyhow::Result<i32> {
    let Some(ws_url) = config.reporting.websocket_url.clone() else {
        bail!("websocket mode requires reporting.websocket_url or --server-url");
    };

    if let Some(http) = controller.http() {
        match http.register_agent(controller.identity()) {
            Ok(_) => tracing::info!("agent registered with server"),
            Err(e) => tracing::warn!(error = %e, "agent registration failed"),
        }
    }

    let (command_tx, command_rx) = unbounded();
    let (ws_client, emitter) = WsClient::new(&ws_url, &controller.identity().agent_id, command_tx);

    let ws_thread = std::thread::spawn(move || ws_client.run());
    tracing::info!("agent ready for remote commands");

    let output_format = cli.output_format;
    for command in command_rx.iter() {
        match command {
            ScanCommand::Start {
                directories,
                operator,
            } => {
                let roots = (!directories.is_empty()).then_some(directories);
                match controller.start(&operator, roots.as_deref()) {
                    Ok(scan_id) => {
                        tracing::info!(scan_id = scan_id.as_str(), "remote scan starting");
                        let controller = Arc::clone(&controller);
                        let emitter = emitter.clone();
                        std::thread::spawn(move || {
                            let (progress_tx, progress_rx) = unbounded();
                            let forward_emitter = emitter.clone();
                            let forwarder = std::thread::spawn(move || {
                                for event in progress_rx.iter() {
                                    forward_emitter.scan_progress(&event);
                                }
                            });

                            let options = RunOptions {
                                send_report: true,
                                output_path: None,
                                output_format,
                            };
                            let result = controller.run_to_completion(&progress_tx, &options);
                            drop(progress_tx);
                            let _ = forwarder.join();

                            match result {
                                Ok(summary) => emitter.scan_completed(json!(summary)),
                                Err(e) => emitter.scan_error(&e.to_string()),
                            }
                        });
                    }
                    Err(e) => emitter.scan_error(&e.to_string()),
                }
            }
            ScanCommand::Stop => controller.stop(),
            ScanCommand::Status => {
                let mut status = controller.status();
                // Answering over the channel implies the channel is up.
                status["websocket_connected"] = json!(true);
                emitter.scan_status(status);
            }
        }
    }

    let _ = ws_thread.join();
    Ok(0)
}
