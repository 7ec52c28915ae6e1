//! Two-pass scan orchestrator.
//!
//! Pass 1 enumerates every path under the roots; pass 2 feeds them to a
//! pool of worker threads running reader + detector per file. The
//! orchestrator thread is the only writer of the aggregate match list
//! and the stats counters; workers return their per-file result by
//! value over a channel.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use crossbeam_channel::{bounded, unbounded, Sender};
use panscan_core::config::AgentConfig;
use panscan_core::errors::ScanError;
use panscan_core::events::ProgressEvent;
use panscan_core::types::{PanMatch, ScanStats};

use crate::cancellation::ScanCancellation;
use crate::detector::PanDetector;
use crate::reader::{FileReader, ReadOutcome, SkipReason};
use crate::walker::Walker;

/// Result of scanning one file, returned by value from a worker.
enum FileOutcome {
    Matches(Vec<PanMatch>),
    Skipped,
    Errored,
    /// Dequeued after a stop request; never scanned.
    Dropped,
}

/// Final result of a scan.
#[derive(Debug)]
pub struct ScanOutcome {
    /// Aggregate match list. Within a file, source order; across files,
    /// completion order.
    pub matches: Vec<PanMatch>,
    pub stats: ScanStats,
    pub stopped: bool,
}

/// The scan orchestrator. Owns the detector, reader, and walker; the
/// cancellation handle is shared with the session controller.
pub struct Scanner {
    detector: PanDetector,
    reader: FileReader,
    walker: Walker,
    concurrency: usize,
    cancellation: ScanCancellation,
}

impl Scanner {
    pub fn new(config: &AgentConfig) -> Result<Self, ScanError> {
        Ok(Self {
            detector: PanDetector::new(&config.detection, &config.privacy)?,
            reader: FileReader::new(&config.agent),
            walker: Walker::new(&config.agent)?,
            concurrency: config.agent.effective_concurrency(),
            cancellation: ScanCancellation::new(),
        })
    }

    /// Cancellation handle for external stop requests.
    pub fn cancellation(&self) -> &ScanCancellation {
        &self.cancellation
    }

    pub fn detector(&self) -> &PanDetector {
        &self.detector
    }

    /// Run a full scan over validated roots, emitting progress events.
    ///
    /// Does not reset the stop flag — the flag belongs to the session
    /// and is cleared when a new session starts, so a stop requested
    /// before pass 2 yields an empty finding set and a stopped
    /// completion.
    pub fn scan(&self, roots: &[PathBuf], events: &Sender<ProgressEvent>) -> ScanOutcome {
        let started = Instant::now();
        let mut stats = ScanStats::default();

        // Pass 1: enumerate.
        let files = self
            .walker
            .enumerate(roots, &self.cancellation, &mut stats, |count| {
                if count % 1000 == 0 {
                    let _ = events.send(ProgressEvent::Counting { total_files: count });
                }
            });

        if self.cancellation.is_stop_requested() {
            stats.duration_seconds = started.elapsed().as_secs_f64();
            let _ = events.send(ProgressEvent::complete(0, 0, 0, true));
            return ScanOutcome {
                matches: Vec::new(),
                stats,
                stopped: true,
            };
        }

        let total_files = files.len();
        tracing::info!(total_files, "enumeration complete");

        if total_files == 0 {
            stats.duration_seconds = started.elapsed().as_secs_f64();
            let _ = events.send(ProgressEvent::complete(0, 0, 0, false));
            return ScanOutcome {
                matches: Vec::new(),
                stats,
                stopped: false,
            };
        }

        // Pass 2: scan over the worker pool. Queue depth plus running
        // workers keeps at most 2x concurrency tasks in flight.
        let (job_tx, job_rx) = bounded::<PathBuf>(self.concurrency);
        let (result_tx, result_rx) = unbounded::<(PathBuf, FileOutcome)>();
        let dispatched = AtomicUsize::new(0);

        let mut matches: Vec<PanMatch> = Vec::new();
        let mut files_completed = 0usize;

        std::thread::scope(|scope| {
            for _ in 0..self.concurrency {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for path in job_rx.iter() {
                        // Queued-but-unstarted tasks are dropped once a
                        // stop is requested; the running task finishes.
                        let outcome = if self.cancellation.is_stop_requested() {
                            FileOutcome::Dropped
                        } else {
                            self.scan_file(&path)
                        };
                        if result_tx.send((path, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(job_rx);
            drop(result_tx);

            let feeder_dispatched = &dispatched;
            let feeder_cancel = &self.cancellation;
            scope.spawn(move || {
                for path in files {
                    if feeder_cancel.is_stop_requested() {
                        break;
                    }
                    if job_tx.send(path).is_err() {
                        break;
                    }
                    feeder_dispatched.fetch_add(1, Ordering::Relaxed);
                }
                drop(job_tx);
            });

            for (path, outcome) in result_rx.iter() {
                match outcome {
                    FileOutcome::Matches(file_matches) => {
                        stats.files_scanned += 1;
                        stats.matches_found += file_matches.len() as u64;
                        matches.extend(file_matches);
                    }
                    FileOutcome::Skipped => stats.files_skipped += 1,
                    FileOutcome::Errored => stats.errors += 1,
                    FileOutcome::Dropped => continue,
                }
                files_completed += 1;

                let in_queue = dispatched
                    .load(Ordering::Relaxed)
                    .saturating_sub(files_completed);
                let percentage =
                    (files_completed as f64 / total_files as f64 * 1000.0).round() / 10.0;
                let _ = events.send(ProgressEvent::Scanning {
                    files_scanned: files_completed,
                    total_files,
                    matches_found: matches.len(),
                    current_file: path.display().to_string(),
                    in_queue,
                    percentage,
                });
            }
        });

        let stopped = self.cancellation.is_stop_requested();
        stats.duration_seconds = started.elapsed().as_secs_f64();
        let _ = events.send(ProgressEvent::complete(
            files_completed,
            total_files,
            matches.len(),
            stopped,
        ));

        tracing::info!(
            files_completed,
            total_files,
            matches = matches.len(),
            errors = stats.errors,
            stopped,
            "scan finished"
        );

        ScanOutcome {
            matches,
            stats,
            stopped,
        }
    }

    fn scan_file(&self, path: &Path) -> FileOutcome {
        match self.reader.read(path) {
            ReadOutcome::Content(text) => {
                let label = path.display().to_string();
                let file_matches = self.detector.scan_text(&text, &label);
                if !file_matches.is_empty() {
                    tracing::info!(
                        path = %path.display(),
                        count = file_matches.len(),
                        "potential PANs found"
                    );
                }
                FileOutcome::Matches(file_matches)
            }
            ReadOutcome::Skipped(SkipReason::Unreadable) => FileOutcome::Errored,
            ReadOutcome::Skipped(_) => FileOutcome::Skipped,
        }
    }
}
