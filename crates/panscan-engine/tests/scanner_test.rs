//! Orchestrator tests over real temp directory trees: two-pass scan,
//! filtering, caps, cancellation, determinism, and progress events.

use std::fs;
use std::path::Path;

use crossbeam_channel::unbounded;
use panscan_core::config::AgentConfig;
use panscan_core::events::{CompletionStatus, ProgressEvent};
use panscan_engine::walker::{validate_roots, Walker};
use panscan_engine::Scanner;

const VISA: &str = "4532015112830366";
const MASTERCARD: &str = "5555555555554444";

fn config_for(root: &Path, extra_yaml: &str) -> AgentConfig {
    let yaml = format!(
        r#"
agent:
  scan_roots: ["{}"]
{extra_yaml}
detection: {{}}
privacy: {{}}
reporting: {{}}
"#,
        root.display()
    );
    AgentConfig::from_yaml(&yaml).unwrap()
}

fn run_scan(config: &AgentConfig, root: &Path) -> (panscan_engine::ScanOutcome, Vec<ProgressEvent>) {
    let scanner = Scanner::new(config).unwrap();
    let (tx, rx) = unbounded();
    let outcome = scanner.scan(&[root.to_path_buf()], &tx);
    drop(tx);
    (outcome, rx.iter().collect())
}

#[test]
fn scans_tree_and_aggregates_matches() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), format!("credit card: {VISA}\n")).unwrap();
    fs::write(dir.path().join("b.txt"), format!("payment card: {MASTERCARD}\n")).unwrap();
    fs::write(dir.path().join("clean.txt"), "nothing to see\n").unwrap();

    let config = config_for(dir.path(), "");
    let (outcome, events) = run_scan(&config, dir.path());

    assert!(!outcome.stopped);
    assert_eq!(outcome.matches.len(), 2);
    assert_eq!(outcome.stats.files_scanned, 3);
    assert_eq!(outcome.stats.matches_found, 2);
    assert_eq!(outcome.stats.errors, 0);
    assert!(outcome.stats.duration_seconds >= 0.0);

    // Final event is a completed Complete.
    match events.last().unwrap() {
        ProgressEvent::Complete {
            files_scanned,
            total_files,
            matches_found,
            status,
            completed,
        } => {
            assert_eq!(*files_scanned, 3);
            assert_eq!(*total_files, 3);
            assert_eq!(*matches_found, 2);
            assert_eq!(*status, CompletionStatus::Completed);
            assert!(completed);
        }
        other => panic!("expected Complete, got {other:?}"),
    }
}

#[test]
fn progress_events_are_monotonic() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..20 {
        fs::write(dir.path().join(format!("f{i}.txt")), format!("card {VISA}\n")).unwrap();
    }

    let config = config_for(dir.path(), "  concurrency: 4\n");
    let (_, events) = run_scan(&config, dir.path());

    let mut last = 0;
    for event in &events {
        if let ProgressEvent::Scanning {
            files_scanned,
            total_files,
            percentage,
            ..
        } = event
        {
            assert!(*files_scanned > last, "files_scanned must be monotonic");
            last = *files_scanned;
            assert_eq!(*total_files, 20);
            assert!((0.0..=100.0).contains(percentage));
        }
    }
    assert_eq!(last, 20);
}

#[test]
fn stop_requested_before_scan_yields_empty_stopped_outcome() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), format!("card {VISA}\n")).unwrap();

    let config = config_for(dir.path(), "");
    let scanner = Scanner::new(&config).unwrap();
    scanner.cancellation().request_stop();

    let (tx, rx) = unbounded();
    let outcome = scanner.scan(&[dir.path().to_path_buf()], &tx);
    drop(tx);
    let events: Vec<ProgressEvent> = rx.iter().collect();

    assert!(outcome.stopped);
    assert!(outcome.matches.is_empty());
    match events.last().unwrap() {
        ProgressEvent::Complete { status, completed, .. } => {
            assert_eq!(*status, CompletionStatus::Stopped);
            assert!(!completed);
        }
        other => panic!("expected Complete, got {other:?}"),
    }
}

#[test]
fn identical_scans_produce_identical_finding_sets() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("a.txt"), format!("card {VISA} card {MASTERCARD}\n")).unwrap();
    fs::write(dir.path().join("sub/b.txt"), format!("card {VISA}\n")).unwrap();

    let config = config_for(dir.path(), "  concurrency: 8\n");

    let key = |m: &panscan_core::types::PanMatch| {
        (m.file_path.clone(), m.line_number, m.column_start, m.card_brand.as_str())
    };
    let (first, _) = run_scan(&config, dir.path());
    let (second, _) = run_scan(&config, dir.path());

    let mut a: Vec<_> = first.matches.iter().map(key).collect();
    let mut b: Vec<_> = second.matches.iter().map(key).collect();
    a.sort();
    b.sort();
    assert_eq!(a, b);
    assert_eq!(a.len(), 3);
}

#[test]
fn matches_within_a_file_stay_in_source_order() {
    let dir = tempfile::tempdir().unwrap();
    let content = format!("first {VISA}\nsecond {MASTERCARD}\nthird {VISA}\n");
    fs::write(dir.path().join("multi.txt"), content).unwrap();

    let config = config_for(dir.path(), "");
    let (outcome, _) = run_scan(&config, dir.path());

    let lines: Vec<u32> = outcome.matches.iter().map(|m| m.line_number).collect();
    assert_eq!(lines, vec![1, 2, 3]);
}

#[test]
fn exclusion_globs_prune_directories_and_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("node_modules")).unwrap();
    fs::write(
        dir.path().join("node_modules/dep.txt"),
        format!("card {VISA}\n"),
    )
    .unwrap();
    fs::write(dir.path().join("keep.txt"), format!("card {VISA}\n")).unwrap();
    fs::write(dir.path().join("skip.log"), format!("card {VISA}\n")).unwrap();

    let extra = "  exclude_globs: [\"**/node_modules/*\", \"*.log\"]\n";
    let config = config_for(dir.path(), extra);
    let (outcome, _) = run_scan(&config, dir.path());

    assert_eq!(outcome.matches.len(), 1);
    assert!(outcome.matches[0].file_path.ends_with("keep.txt"));
}

#[test]
fn max_files_caps_enumeration() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..10 {
        fs::write(dir.path().join(format!("f{i}.txt")), format!("card {VISA}\n")).unwrap();
    }

    let config = config_for(dir.path(), "  max_files: 4\n");
    let (outcome, _) = run_scan(&config, dir.path());

    assert_eq!(outcome.stats.files_scanned, 4);
    assert_eq!(outcome.matches.len(), 4);
}

#[test]
fn max_depth_limits_descent() {
    let dir = tempfile::tempdir().unwrap();
    let deep = dir.path().join("l1").join("l2").join("l3");
    fs::create_dir_all(&deep).unwrap();
    fs::write(dir.path().join("top.txt"), format!("card {VISA}\n")).unwrap();
    fs::write(deep.join("deep.txt"), format!("card {VISA}\n")).unwrap();

    let config = config_for(dir.path(), "  max_depth: 1\n");
    let (outcome, _) = run_scan(&config, dir.path());

    assert_eq!(outcome.matches.len(), 1);
    assert!(outcome.matches[0].file_path.ends_with("top.txt"));
}

#[test]
fn extension_allowlist_skips_other_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), format!("card {VISA}\n")).unwrap();
    fs::write(dir.path().join("b.csv"), format!("card {VISA}\n")).unwrap();

    let config = config_for(dir.path(), "  extension_allowlist: [\".txt\"]\n");
    let (outcome, _) = run_scan(&config, dir.path());

    assert_eq!(outcome.matches.len(), 1);
    assert_eq!(outcome.stats.files_scanned, 1);
    assert_eq!(outcome.stats.files_skipped, 1);
}

#[test]
fn binary_files_are_skipped_unless_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let mut payload = b"garbage\x00binary ".to_vec();
    payload.extend_from_slice(format!("card {VISA}").as_bytes());
    fs::write(dir.path().join("blob.txt"), &payload).unwrap();

    let config = config_for(dir.path(), "");
    let (outcome, _) = run_scan(&config, dir.path());
    assert_eq!(outcome.stats.files_skipped, 1);
    assert!(outcome.matches.is_empty());

    let config = config_for(dir.path(), "  scan_binary_files: true\n");
    let (outcome, _) = run_scan(&config, dir.path());
    assert_eq!(outcome.matches.len(), 1);
}

#[test]
fn walker_validates_roots() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().display().to_string();
    let missing = dir.path().join("nope").display().to_string();

    let roots = validate_roots(&[good.clone(), missing]);
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0], dir.path());
}

#[test]
fn walker_exclusion_matches_path_or_parent() {
    let yaml = r#"
agent:
  scan_roots: ["/tmp"]
  exclude_globs: ["/var/log/*", "**/.git/*"]
detection: {}
privacy: {}
reporting: {}
"#;
    let config = AgentConfig::from_yaml(yaml).unwrap();
    let walker = Walker::new(&config.agent).unwrap();

    assert!(walker.is_excluded(Path::new("/var/log/syslog")));
    assert!(walker.is_excluded(Path::new("/home/x/.git/config")));
    assert!(!walker.is_excluded(Path::new("/home/x/data.txt")));
}
