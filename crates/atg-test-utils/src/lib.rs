//! Testing utilities for atg workspace
//!
//! Deterministic fakes for every collaborator, plus fixtures.

#![allow(missing_docs)]

use async_trait::async_trait;
use atg_core::scanner::TEST_GLOBS;
use atg_core::{
    Confirmer, CoverageRunner, ExecuteError, FileLister, GenerateError, ListError, Message,
    ProgressSink, PromptError, ReportReader, RunOutcome, SourceFile, TestExecutor, TestGenerator,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

/// Replays drafts in order, then repeats the fallback
#[derive(Debug)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<String, GenerateError>>>,
    fallback: String,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(drafts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(drafts.into_iter().map(|d| Ok(d.into())).collect()),
            fallback: "test('generated', () => {});".to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn repeating(draft: impl Into<String>) -> Self {
        let mut generator = Self::new(Vec::<String>::new());
        generator.fallback = draft.into();
        generator
    }

    /// Fail the next call
    pub fn then_fail(self, error: GenerateError) -> Self {
        self.script.lock().push_back(Err(error));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Message lists received, one per call
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl TestGenerator for ScriptedGenerator {
    async fn generate(&self, conversation: &[Message]) -> Result<String, GenerateError> {
        self.calls.lock().push(conversation.to_vec());
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

/// One recorded executor call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteCall {
    pub path: PathBuf,
    pub code: String,
}

/// Replays run outcomes; passes once the script is empty
///
/// Non-empty code is written to disk like the real runner does.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    script: Mutex<VecDeque<RunOutcome>>,
    per_path: Mutex<HashMap<String, VecDeque<RunOutcome>>>,
    calls: Mutex<Vec<ExecuteCall>>,
}

impl ScriptedExecutor {
    pub fn passing() -> Self {
        Self::default()
    }

    /// Outcomes for successive calls regardless of path
    pub fn new(outcomes: impl IntoIterator<Item = RunOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Outcomes for calls whose path ends with `suffix`, taking precedence
    pub fn with_outcomes_for(
        self,
        suffix: impl Into<String>,
        outcomes: impl IntoIterator<Item = RunOutcome>,
    ) -> Self {
        self.per_path
            .lock()
            .insert(suffix.into(), outcomes.into_iter().collect());
        self
    }

    pub fn calls(&self) -> Vec<ExecuteCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn next_outcome(&self, path: &Path) -> RunOutcome {
        let path = path.to_string_lossy().replace('\\', "/");
        let mut per_path = self.per_path.lock();
        if let Some(queue) = per_path
            .iter_mut()
            .find(|(suffix, _)| path.ends_with(suffix.as_str()))
            .map(|(_, queue)| queue)
        {
            if let Some(outcome) = queue.pop_front() {
                return outcome;
            }
        }
        drop(per_path);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(RunOutcome::passed)
    }
}

#[async_trait]
impl TestExecutor for ScriptedExecutor {
    async fn execute(&self, test_path: &Path, test_code: &str) -> Result<RunOutcome, ExecuteError> {
        if !test_code.is_empty() {
            tokio::fs::write(test_path, test_code)
                .await
                .map_err(|e| ExecuteError::io_error(test_path, e))?;
        }
        self.calls.lock().push(ExecuteCall {
            path: test_path.to_path_buf(),
            code: test_code.to_string(),
        });
        Ok(self.next_outcome(test_path))
    }
}

/// Fixed source and test listings
#[derive(Debug, Default)]
pub struct StaticLister {
    sources: Vec<String>,
    tests: Vec<String>,
    fail: bool,
}

impl StaticLister {
    pub fn new<S: Into<String>>(
        sources: impl IntoIterator<Item = S>,
        tests: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            sources: sources.into_iter().map(Into::into).collect(),
            tests: tests.into_iter().map(Into::into).collect(),
            fail: false,
        }
    }

    /// Lister whose every call fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl FileLister for StaticLister {
    async fn list(
        &self,
        root: &Path,
        include: &[&str],
        _exclude: &[&str],
    ) -> Result<Vec<String>, ListError> {
        if self.fail {
            return Err(ListError::io_error(
                root,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "listing failed"),
            ));
        }
        if include == TEST_GLOBS {
            Ok(self.tests.clone())
        } else {
            Ok(self.sources.clone())
        }
    }
}

/// Coverage reports keyed by file name
#[derive(Debug, Default)]
pub struct StaticReports {
    reports: HashMap<String, Vec<u8>>,
}

impl StaticReports {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(mut self, file_name: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.reports.insert(file_name.into(), body.into());
        self
    }
}

#[async_trait]
impl ReportReader for StaticReports {
    async fn read_report(&self, path: &Path) -> std::io::Result<Option<Vec<u8>>> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(self.reports.get(&name).cloned())
    }
}

/// Coverage runner returning a fixed outcome
#[derive(Debug)]
pub struct StubCoverageRunner {
    outcome: RunOutcome,
    calls: Mutex<usize>,
}

impl StubCoverageRunner {
    pub fn new(outcome: RunOutcome) -> Self {
        Self {
            outcome,
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

impl Default for StubCoverageRunner {
    fn default() -> Self {
        Self::new(RunOutcome::passed())
    }
}

#[async_trait]
impl CoverageRunner for StubCoverageRunner {
    async fn run_coverage(&self) -> Result<RunOutcome, ExecuteError> {
        *self.calls.lock() += 1;
        Ok(self.outcome.clone())
    }
}

/// Answers every prompt the same way and records the questions
#[derive(Debug)]
pub struct FixedConfirmer {
    answer: bool,
    prompts: Mutex<Vec<String>>,
}

impl FixedConfirmer {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl Confirmer for FixedConfirmer {
    async fn confirm(&self, prompt: &str, _default: bool) -> Result<bool, PromptError> {
        self.prompts.lock().push(prompt.to_string());
        Ok(self.answer)
    }
}

/// Progress sink recording one line per event
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<String>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    fn record(&self, event: String) {
        self.events.lock().push(event);
    }
}

impl ProgressSink for RecordingProgress {
    fn session_started(&self, source: &SourceFile) {
        self.record(format!("start {source}"));
    }

    fn session_succeeded(&self, source: &SourceFile) {
        self.record(format!("ok {source}"));
    }

    fn session_exhausted(&self, source: &SourceFile) {
        self.record(format!("exhausted {source}"));
    }

    fn no_coverage_report(&self) {
        self.record("no coverage".to_string());
    }

    fn undercovered(&self, source: &SourceFile, pct: f64, _threshold: f64) {
        self.record(format!("undercovered {source} {pct}"));
    }

    fn finished(&self) {
        self.record("finished".to_string());
    }
}

/// Write `files` (relative path, contents) under `root`, creating directories
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (relative, contents) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
    }
}
