//! Bounded, filtered filesystem traversal.
//!
//! Enumeration is pass 1 of a scan: it materializes the path list so
//! pass 2 can report accurate progress. Exclusion globs match the
//! forward-slash normalized path or its containing directory; access
//! errors skip the entry and never abort the walk.

use std::path::{Path, PathBuf};

use panscan_core::config::AgentSection;
use panscan_core::errors::ScanError;
use panscan_core::types::ScanStats;

use crate::cancellation::ScanCancellation;

/// Unix root set for a whole-system scan, filtered to what exists and
/// is readable.
#[cfg(not(windows))]
const UNIX_SYSTEM_ROOTS: &[&str] = &[
    "/", "/home", "/root", "/var", "/var/www", "/opt", "/tmp", "/etc", "/usr",
    "/usr/local", "/srv", "/mnt", "/media",
];

#[cfg(windows)]
const WINDOWS_COMMON_SUBPATHS: &[&str] =
    &["Users", "ProgramData", "Program Files", "inetpub", "Windows\\Temp"];

/// Expand the whole-system marker to the platform root set.
/// Missing or unreadable entries are dropped silently.
pub fn expand_whole_system() -> Vec<PathBuf> {
    #[cfg(windows)]
    {
        let mut roots = Vec::new();
        for letter in 'A'..='Z' {
            let drive = PathBuf::from(format!("{letter}:\\"));
            if drive.exists() {
                roots.push(drive.clone());
                for sub in WINDOWS_COMMON_SUBPATHS {
                    let path = drive.join(sub);
                    if is_readable_dir(&path) {
                        roots.push(path);
                    }
                }
            }
        }
        roots
    }
    #[cfg(not(windows))]
    {
        UNIX_SYSTEM_ROOTS
            .iter()
            .map(PathBuf::from)
            .filter(|p| is_readable_dir(p))
            .collect()
    }
}

/// Resolve the requested roots into validated absolute directories.
///
/// A single `*` expands to the platform defaults. Paths that do not
/// exist, are not directories, or are unreadable are dropped with a
/// warning.
pub fn validate_roots(requested: &[String]) -> Vec<PathBuf> {
    if requested.len() == 1 && requested[0] == "*" {
        tracing::info!("whole-system scan requested, discovering platform roots");
        return expand_whole_system();
    }

    let mut valid = Vec::new();
    for root in requested {
        let path = PathBuf::from(root);
        let absolute = if path.is_absolute() {
            path
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&path))
                .unwrap_or(path)
        };
        if is_readable_dir(&absolute) {
            valid.push(absolute);
        } else {
            tracing::warn!(root = %absolute.display(), "scan root missing, not a directory, or unreadable");
        }
    }
    valid
}

fn is_readable_dir(path: &Path) -> bool {
    path.is_dir() && std::fs::read_dir(path).is_ok()
}

/// Pass-1 walker with the configured exclusion and cap semantics.
pub struct Walker {
    exclude: Vec<glob::Pattern>,
    max_depth: Option<usize>,
    max_files: Option<usize>,
}

impl Walker {
    /// Compile the exclusion globs. A malformed pattern is fatal.
    pub fn new(agent: &AgentSection) -> Result<Self, ScanError> {
        let mut exclude = Vec::with_capacity(agent.exclude_globs.len());
        for pattern in &agent.exclude_globs {
            let normalized = pattern.replace('\\', "/");
            let compiled = glob::Pattern::new(&normalized).map_err(|source| {
                ScanError::InvalidExcludeGlob {
                    pattern: pattern.clone(),
                    source,
                }
            })?;
            exclude.push(compiled);
        }
        Ok(Self {
            exclude,
            max_depth: agent.effective_max_depth(),
            max_files: agent.effective_max_files(),
        })
    }

    /// Whether a path matches an exclusion glob, directly or through its
    /// containing directory.
    pub fn is_excluded(&self, path: &Path) -> bool {
        excluded_by(&self.exclude, path)
    }

    /// Enumerate scannable file paths under the given roots.
    ///
    /// Directory and skip counters accumulate into `stats`; `on_tick`
    /// fires for every enumerated path (the orchestrator emits a
    /// `counting` event every 1,000). When the file cap is reached no
    /// further paths are collected but directory counting runs to the
    /// natural end of the walk. A stop request aborts enumeration
    /// immediately.
    pub fn enumerate(
        &self,
        roots: &[PathBuf],
        cancellation: &ScanCancellation,
        stats: &mut ScanStats,
        mut on_tick: impl FnMut(usize),
    ) -> Vec<PathBuf> {
        let mut files = Vec::new();

        'roots: for root in roots {
            let mut builder = ignore::WalkBuilder::new(root);
            builder
                .standard_filters(false)
                .hidden(false)
                .follow_links(false)
                // The config depth is the deepest directory to descend
                // into (root = 0); entries inside it sit one level lower.
                .max_depth(self.max_depth.map(|d| d + 1));

            let exclude = self.exclude.clone();
            builder.filter_entry(move |entry| !excluded_by(&exclude, entry.path()));

            for entry in builder.build() {
                if cancellation.is_stop_requested() {
                    tracing::info!("stop requested during enumeration");
                    break 'roots;
                }

                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::debug!(error = %e, "access error during enumeration");
                        stats.errors += 1;
                        continue;
                    }
                };

                let Some(file_type) = entry.file_type() else {
                    continue;
                };

                if file_type.is_dir() {
                    stats.directories_scanned += 1;
                    continue;
                }
                if !file_type.is_file() {
                    continue;
                }

                if self
                    .max_files
                    .map(|cap| files.len() >= cap)
                    .unwrap_or(false)
                {
                    continue;
                }

                files.push(entry.into_path());
                on_tick(files.len());
            }
        }

        files
    }
}

fn excluded_by(patterns: &[glob::Pattern], path: &Path) -> bool {
    let path_str = path.display().to_string().replace('\\', "/");
    let parent_str = path
        .parent()
        .map(|p| p.display().to_string().replace('\\', "/"))
        .unwrap_or_default();
    for pattern in patterns {
        if pattern.matches(&path_str) {
            return true;
        }
        let dir_pattern = pattern.as_str().trim_end_matches("/*");
        if !parent_str.is_empty()
            && glob::Pattern::new(dir_pattern)
                .map(|p| p.matches(&parent_str))
                .unwrap_or(false)
        {
            return true;
        }
    }
    false
}
