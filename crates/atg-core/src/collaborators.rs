//! Collaborator interfaces consumed by the engine
//!
//! One trait per external concern. Concrete backends live in `atg-backends`;
//! deterministic fakes live in `atg-test-utils`.

use crate::conversation::Message;
use crate::error::{ExecuteError, GenerateError, ListError, PromptError};
use crate::path::SourceFile;
use async_trait::async_trait;
use std::path::Path;

/// Text-completion service that authors tests
#[async_trait]
pub trait TestGenerator: Send + Sync {
    /// Submit the conversation and return the single completion text
    ///
    /// Implementations prepend [`SYSTEM_INSTRUCTION`](crate::SYSTEM_INSTRUCTION)
    /// and own any timeout policy.
    async fn generate(&self, conversation: &[Message]) -> Result<String, GenerateError>;
}

/// Result of running one test file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub passed: bool,
    /// Captured runner output when the run failed
    pub error: Option<String>,
}

impl RunOutcome {
    #[inline]
    #[must_use]
    pub fn passed() -> Self {
        Self {
            passed: true,
            error: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            passed: false,
            error: Some(error.into()),
        }
    }

    /// Failure text, empty when the runner gave none
    #[inline]
    #[must_use]
    pub fn error_text(&self) -> &str {
        self.error.as_deref().unwrap_or_default()
    }
}

/// Test runner used as the verification oracle
#[async_trait]
pub trait TestExecutor: Send + Sync {
    /// Write `test_code` to `test_path` and run exactly that file
    ///
    /// An empty `test_code` re-runs the file already on disk without writing.
    async fn execute(&self, test_path: &Path, test_code: &str) -> Result<RunOutcome, ExecuteError>;
}

/// Glob-based enumeration of files under a root
#[async_trait]
pub trait FileLister: Send + Sync {
    /// Root-relative, forward-slash paths matching `include` but not `exclude`
    async fn list(
        &self,
        root: &Path,
        include: &[&str],
        exclude: &[&str],
    ) -> Result<Vec<String>, ListError>;
}

/// Full instrumented test run that writes coverage reports
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CoverageRunner: Send + Sync {
    /// Run the suite with coverage; a failing suite is still `Ok`
    async fn run_coverage(&self) -> Result<RunOutcome, ExecuteError>;
}

/// Reads a coverage report from disk
#[async_trait]
pub trait ReportReader: Send + Sync {
    /// Report bytes, or `None` if the file does not exist
    async fn read_report(&self, path: &Path) -> std::io::Result<Option<Vec<u8>>>;
}

/// Human yes/no prompt
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, prompt: &str, default: bool) -> Result<bool, PromptError>;
}

/// User-visible progress events
///
/// Every method defaults to doing nothing.
pub trait ProgressSink: Send + Sync {
    fn session_started(&self, _source: &SourceFile) {}
    fn session_succeeded(&self, _source: &SourceFile) {}
    fn session_exhausted(&self, _source: &SourceFile) {}
    fn no_coverage_report(&self) {}
    fn undercovered(&self, _source: &SourceFile, _pct: f64, _threshold: f64) {}
    fn finished(&self) {}
}

/// Progress sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl ProgressSink for SilentProgress {}
