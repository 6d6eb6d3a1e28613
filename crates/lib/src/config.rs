//! # Pipeline Settings
//!
//! Every component receives its paths and tunables through these structs at
//! construction time. Nothing in the library derives a path from the current
//! working directory, so two job families (or two tests) can run side by side
//! as long as they are given different roots.

use crate::constants::*;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The on-disk locations used by the elicitation pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub in_progress_dir: PathBuf,
    pub completed_dir: PathBuf,
    pub results_dir: PathBuf,
    pub request_dir: PathBuf,
    pub mapping_log: PathBuf,
    pub triples_dir: PathBuf,
}

impl StorePaths {
    /// The default layout: every job store lives under `root`, the elicited
    /// triples go to `triples_dir`.
    pub fn under(root: impl AsRef<Path>, triples_dir: impl Into<PathBuf>) -> Self {
        let root = root.as_ref();
        Self {
            in_progress_dir: root.join(IN_PROGRESS_DIR),
            completed_dir: root.join(COMPLETED_DIR),
            results_dir: root.join(RESULTS_DIR),
            request_dir: root.join(REQUEST_DIR),
            mapping_log: root.join(MAPPING_LOG_FILE),
            triples_dir: triples_dir.into(),
        }
    }
}

/// Submission policy for the batch tracker.
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    /// Total number of batch creation attempts before giving up.
    pub max_attempts: u32,
    /// Pause after a rate-limited attempt.
    pub retry_backoff: Duration,
    pub job_description: String,
    pub endpoint: String,
    pub completion_window: String,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_SUBMIT_ATTEMPTS,
            retry_backoff: Duration::from_secs(DEFAULT_RETRY_BACKOFF_SECS),
            job_description: DEFAULT_JOB_DESCRIPTION.to_string(),
            endpoint: DEFAULT_BATCH_ENDPOINT.to_string(),
            completion_window: DEFAULT_COMPLETION_WINDOW.to_string(),
        }
    }
}

/// Tunables and cache locations for the evaluation pipeline.
#[derive(Debug, Clone)]
pub struct EvalSettings {
    /// `None` evaluates every candidate.
    pub sample_size: Option<usize>,
    /// Seeds the sampler and names the snippet cache.
    pub seed: String,
    /// Pause between two consecutive search queries.
    pub search_delay: Duration,
    pub snippet_top_k: usize,
    pub gold_path: PathBuf,
    pub snippet_dir: PathBuf,
    /// Merge all source files into a single `pooled` tally.
    pub pool_files: bool,
}

impl EvalSettings {
    pub fn under(root: impl AsRef<Path>, seed: &str) -> Self {
        let root = root.as_ref();
        Self {
            sample_size: None,
            seed: seed.to_string(),
            search_delay: Duration::from_secs(DEFAULT_SEARCH_DELAY_SECS),
            snippet_top_k: DEFAULT_SNIPPET_TOP_K,
            gold_path: root.join(GOLD_FILE),
            snippet_dir: root.join(SNIPPET_DIR),
            pool_files: false,
        }
    }

    /// Converts the CLI convention (negative disables sampling) into an option.
    pub fn sample_size_from_arg(value: i64) -> Option<usize> {
        usize::try_from(value).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_paths_are_rooted() {
        let paths = StorePaths::under("/tmp/work", "/tmp/triples");
        assert_eq!(paths.in_progress_dir, PathBuf::from("/tmp/work/progress_dir"));
        assert_eq!(paths.completed_dir, PathBuf::from("/tmp/work/completed_dir"));
        assert_eq!(paths.mapping_log, PathBuf::from("/tmp/work/template_index.txt"));
        assert_eq!(paths.triples_dir, PathBuf::from("/tmp/triples"));
    }

    #[test]
    fn negative_sample_size_disables_sampling() {
        assert_eq!(EvalSettings::sample_size_from_arg(-1), None);
        assert_eq!(EvalSettings::sample_size_from_arg(0), Some(0));
        assert_eq!(EvalSettings::sample_size_from_arg(25), Some(25));
    }
}
