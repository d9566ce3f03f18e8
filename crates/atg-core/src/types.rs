//! Core types for atg
//!
//! - Persisted tool configuration ([`AtgConfig`])
//! - Per-run context handed to the scanner and orchestrator ([`RunContext`])
//! - Session identifiers

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use ulid::Ulid;

/// Default statement-coverage threshold (percent)
pub const DEFAULT_COVERAGE_THRESHOLD: f64 = 80.0;

/// Default coverage output directory, relative to the project root
pub const DEFAULT_COVERAGE_DIR: &str = "coverage";

/// Unique Generation Session identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Ulid);

impl SessionId {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Saved tool configuration
///
/// `connection` is opaque to the engine; only the completion backend reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtgConfig {
    pub connection: serde_json::Value,
    pub model: String,
    /// Repair cycles allowed after the initial draft
    pub max_retries: u32,
    #[serde(default = "default_threshold")]
    pub coverage_threshold: f64,
    /// Exchanges kept after the anchor when prompting; `None` keeps all
    #[serde(default)]
    pub history_limit: Option<usize>,
    #[serde(default = "default_test_command")]
    pub test_command: Vec<String>,
}

fn default_threshold() -> f64 {
    DEFAULT_COVERAGE_THRESHOLD
}

fn default_test_command() -> Vec<String> {
    vec!["npx".to_string(), "jest".to_string()]
}

impl AtgConfig {
    #[inline]
    #[must_use]
    pub fn new(connection: serde_json::Value, model: impl Into<String>, max_retries: u32) -> Self {
        Self {
            connection,
            model: model.into(),
            max_retries,
            coverage_threshold: DEFAULT_COVERAGE_THRESHOLD,
            history_limit: None,
            test_command: default_test_command(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_history_limit(mut self, limit: Option<usize>) -> Self {
        self.history_limit = limit;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_coverage_threshold(mut self, threshold: f64) -> Self {
        self.coverage_threshold = threshold;
        self
    }
}

/// Explicit context for one orchestrator run
///
/// Replaces ambient process state: nothing in the engine reads the current
/// directory or environment.
#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    /// Directory the test runner executes in
    pub project_root: PathBuf,
    /// Scanned directory, relative to the project root
    pub source_root: String,
    /// Test output directory, relative to the project root
    pub test_root: String,
    /// Where coverage reports land, relative to the project root
    pub coverage_dir: String,
    /// Repair cycles allowed after the initial draft
    pub max_attempts: u32,
    pub history_limit: Option<usize>,
    pub coverage_threshold: f64,
}

impl RunContext {
    /// Context with default coverage settings and no retries
    #[must_use]
    pub fn new(
        project_root: impl Into<PathBuf>,
        source_root: impl Into<String>,
        test_root: impl Into<String>,
    ) -> Self {
        Self {
            project_root: project_root.into(),
            source_root: source_root.into(),
            test_root: test_root.into(),
            coverage_dir: DEFAULT_COVERAGE_DIR.to_string(),
            max_attempts: 0,
            history_limit: None,
            coverage_threshold: DEFAULT_COVERAGE_THRESHOLD,
        }
    }

    /// Apply the retry/history/threshold knobs from a saved config
    #[must_use]
    pub fn with_config(mut self, config: &AtgConfig) -> Self {
        self.max_attempts = config.max_retries;
        self.history_limit = config.history_limit;
        self.coverage_threshold = config.coverage_threshold;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_coverage_dir(mut self, dir: impl Into<String>) -> Self {
        self.coverage_dir = dir.into();
        self
    }

    /// Absolute-or-project path of the scanned directory
    #[inline]
    #[must_use]
    pub fn source_dir(&self) -> PathBuf {
        self.project_root.join(&self.source_root)
    }

    /// Directory Jest writes coverage reports into
    #[inline]
    #[must_use]
    pub fn report_dir(&self) -> PathBuf {
        self.project_root.join(&self.coverage_dir)
    }

    #[inline]
    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }
}
