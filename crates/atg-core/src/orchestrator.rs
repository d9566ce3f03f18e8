//! Orchestrator
//!
//! Sequences one full pass, strictly one file at a time:
//! 1. Scan for untested sources and generate their tests
//! 2. Re-run every existing derived test, repairing failures
//! 3. Run coverage and regenerate under-covered files after confirmation
//!
//! A session that exhausts its repair budget never stops the batch; any
//! collaborator error does.

use crate::collaborators::{
    Confirmer, CoverageRunner, FileLister, ProgressSink, ReportReader, TestExecutor, TestGenerator,
};
use crate::coverage::{load_coverage, select_undercovered, CoverageRecord};
use crate::error::OrchestratorError;
use crate::path::{join_normalized, test_path_for, SourceFile, TestFile};
use crate::scanner::Scanner;
use crate::session::{GenerationSession, SessionConfig, SessionOutcome, SessionSeed};
use crate::types::RunContext;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::sync::Arc;

/// Every backend the orchestrator drives
#[derive(Clone)]
pub struct Collaborators {
    pub generator: Arc<dyn TestGenerator>,
    pub executor: Arc<dyn TestExecutor>,
    pub lister: Arc<dyn FileLister>,
    pub coverage: Arc<dyn CoverageRunner>,
    pub reports: Arc<dyn ReportReader>,
    pub confirmer: Arc<dyn Confirmer>,
    pub progress: Arc<dyn ProgressSink>,
}

/// Result of one session inside a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResult {
    pub source: SourceFile,
    pub test_file: TestFile,
    pub outcome: SessionOutcome,
}

/// What a full pass did
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Initial sessions for untested sources
    pub generated: Vec<FileResult>,
    /// Repair sessions for failing existing tests
    pub repaired: Vec<FileResult>,
    /// Initial sessions for under-covered sources
    pub regenerated: Vec<FileResult>,
    pub undercovered: Vec<(SourceFile, f64)>,
    /// Whether a coverage report was found and parsed
    pub coverage_available: bool,
}

impl RunSummary {
    fn start() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            generated: Vec::new(),
            repaired: Vec::new(),
            regenerated: Vec::new(),
            undercovered: Vec::new(),
            coverage_available: false,
        }
    }

    /// Sessions that ended with a possibly failing test
    #[must_use]
    pub fn exhausted(&self) -> Vec<&FileResult> {
        self.generated
            .iter()
            .chain(&self.repaired)
            .chain(&self.regenerated)
            .filter(|r| !r.outcome.is_passed())
            .collect()
    }
}

/// Sequential driver for the whole generate → repair → coverage pass
pub struct Orchestrator {
    ctx: RunContext,
    scanner: Scanner,
    collaborators: Collaborators,
    skip_coverage: bool,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("ctx", &self.ctx)
            .field("skip_coverage", &self.skip_coverage)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    #[must_use]
    pub fn new(ctx: RunContext, collaborators: Collaborators) -> Self {
        Self {
            scanner: Scanner::new(Arc::clone(&collaborators.lister)),
            ctx,
            collaborators,
            skip_coverage: false,
        }
    }

    /// Stop after the repair pass
    #[inline]
    #[must_use]
    pub fn with_skip_coverage(mut self, skip: bool) -> Self {
        self.skip_coverage = skip;
        self
    }

    #[inline]
    #[must_use]
    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Execute one full pass
    ///
    /// # Errors
    /// Scan failures, generation/execution failures and filesystem errors
    /// abort the pass. Retry exhaustion and coverage problems do not.
    pub async fn run(&self) -> Result<RunSummary, OrchestratorError> {
        let mut summary = RunSummary::start();
        let source_dir = self.ctx.source_dir();

        let untested = self.scanner.untested_files(&source_dir).await?;
        tracing::info!(count = untested.len(), "generating tests for untested files");
        for source in &untested {
            let seed = self.initial_seed(source).await?;
            summary.generated.push(self.run_session(source, seed).await?);
        }

        let all_sources = self.scanner.all_source_files(&source_dir).await?;
        tracing::info!(count = all_sources.len(), "re-verifying existing tests");
        for source in &all_sources {
            if let Some(result) = self.repair_if_failing(source).await? {
                summary.repaired.push(result);
            }
        }

        if !self.skip_coverage {
            self.coverage_pass(&all_sources, &mut summary).await?;
        }

        summary.finished_at = Utc::now();
        self.collaborators.progress.finished();
        Ok(summary)
    }

    async fn repair_if_failing(
        &self,
        source: &SourceFile,
    ) -> Result<Option<FileResult>, OrchestratorError> {
        let test_file = test_path_for(source.as_str(), &self.ctx.test_root)?;
        let test_path = test_file.to_path(&self.ctx.project_root);

        let existing_code = match tokio::fs::read_to_string(&test_path).await {
            Ok(code) => code,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(source = %source, test = %test_file, "no derived test on disk");
                return Ok(None);
            }
            Err(e) => return Err(OrchestratorError::io_error(test_path, e)),
        };

        let outcome = self.collaborators.executor.execute(&test_path, "").await?;
        if outcome.passed {
            return Ok(None);
        }

        tracing::info!(source = %source, "existing test fails, repairing");
        let seed = SessionSeed::Repair {
            existing_code,
            failure: outcome.error_text().to_string(),
        };
        self.run_session(source, seed).await.map(Some)
    }

    async fn coverage_pass(
        &self,
        sources: &[SourceFile],
        summary: &mut RunSummary,
    ) -> Result<(), OrchestratorError> {
        match self.collaborators.coverage.run_coverage().await {
            Ok(outcome) if !outcome.passed => {
                tracing::warn!("coverage run exited non-zero, reading reports anyway");
            }
            Err(e) => tracing::warn!(error = %e, "coverage run failed, reading reports anyway"),
            Ok(_) => {}
        }

        let Some(record) = self.load_record().await else {
            return Ok(());
        };
        summary.coverage_available = true;

        let threshold = self.ctx.coverage_threshold;
        let undercovered = select_undercovered(&record, sources, threshold);
        for (source, pct) in &undercovered {
            tracing::info!(source = %source, pct, threshold, "under coverage threshold");
            self.collaborators.progress.undercovered(source, *pct, threshold);
        }
        summary.undercovered.clone_from(&undercovered);
        if undercovered.is_empty() {
            return Ok(());
        }

        let prompt = format!(
            "{} file(s) are below {threshold}% statement coverage. Regenerate their tests?",
            undercovered.len()
        );
        if !self.collaborators.confirmer.confirm(&prompt, true).await? {
            tracing::info!("regeneration declined");
            return Ok(());
        }

        for (source, _) in &undercovered {
            let seed = self.initial_seed(source).await?;
            summary.regenerated.push(self.run_session(source, seed).await?);
        }
        Ok(())
    }

    async fn load_record(&self) -> Option<CoverageRecord> {
        let dir = self.ctx.report_dir();
        match load_coverage(self.collaborators.reports.as_ref(), &dir).await {
            Ok(record) => {
                let source_dir = self.ctx.source_dir();
                let canonical = tokio::fs::canonicalize(&source_dir)
                    .await
                    .unwrap_or_else(|_| source_dir.clone());
                Some(
                    record
                        .rebase(&canonical.to_string_lossy())
                        .rebase(&source_dir.to_string_lossy()),
                )
            }
            Err(e) if e.is_missing_report() => {
                tracing::warn!(dir = %dir.display(), "no coverage report found");
                self.collaborators.progress.no_coverage_report();
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "coverage report unusable, skipping regeneration");
                self.collaborators.progress.no_coverage_report();
                None
            }
        }
    }

    async fn initial_seed(&self, source: &SourceFile) -> Result<SessionSeed, OrchestratorError> {
        let path = source.to_path(&self.ctx.source_dir());
        let source_code = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| OrchestratorError::io_error(path, e))?;
        Ok(SessionSeed::Initial { source_code })
    }

    async fn run_session(
        &self,
        source: &SourceFile,
        seed: SessionSeed,
    ) -> Result<FileResult, OrchestratorError> {
        let test_file = test_path_for(source.as_str(), &self.ctx.test_root)?;
        let display = join_normalized(&self.ctx.source_root, source.as_str());
        let config = SessionConfig::new(self.ctx.max_attempts)
            .with_history_limit(self.ctx.history_limit);

        self.collaborators.progress.session_started(source);
        let report = GenerationSession::new(
            source.clone(),
            &display,
            test_file,
            &self.ctx.project_root,
            seed,
        )
        .run(
            self.collaborators.generator.as_ref(),
            self.collaborators.executor.as_ref(),
            config,
        )
        .await
        .map_err(|e| OrchestratorError::session(source.as_str(), e))?;

        if report.outcome.is_passed() {
            self.collaborators.progress.session_succeeded(source);
        } else {
            self.collaborators.progress.session_exhausted(source);
        }

        Ok(FileResult {
            source: report.source,
            test_file: report.test_file,
            outcome: report.outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{MockConfirmer, MockCoverageRunner, RunOutcome, SilentProgress};
    use crate::conversation::Message;
    use crate::error::{ExecuteError, GenerateError, ListError};
    use crate::scanner::TEST_GLOBS;
    use async_trait::async_trait;
    use std::path::Path;

    struct EchoGenerator;

    #[async_trait]
    impl TestGenerator for EchoGenerator {
        async fn generate(&self, _: &[Message]) -> Result<String, GenerateError> {
            Ok("test('ok', () => {})".to_string())
        }
    }

    struct AlwaysPass;

    #[async_trait]
    impl TestExecutor for AlwaysPass {
        async fn execute(&self, path: &Path, code: &str) -> Result<RunOutcome, ExecuteError> {
            if !code.is_empty() {
                tokio::fs::write(path, code)
                    .await
                    .map_err(|e| ExecuteError::io_error(path, e))?;
            }
            Ok(RunOutcome::passed())
        }
    }

    struct OneSource;

    #[async_trait]
    impl FileLister for OneSource {
        async fn list(&self, _: &Path, include: &[&str], _: &[&str]) -> Result<Vec<String>, ListError> {
            if include == TEST_GLOBS {
                Ok(vec![])
            } else {
                Ok(vec!["a.js".to_string()])
            }
        }
    }

    struct SummaryReport(&'static str);

    #[async_trait]
    impl ReportReader for SummaryReport {
        async fn read_report(&self, path: &Path) -> std::io::Result<Option<Vec<u8>>> {
            if path.ends_with(crate::coverage::SUMMARY_REPORT) {
                Ok(Some(self.0.as_bytes().to_vec()))
            } else {
                Ok(None)
            }
        }
    }

    fn collaborators(coverage: MockCoverageRunner, confirmer: MockConfirmer) -> Collaborators {
        Collaborators {
            generator: Arc::new(EchoGenerator),
            executor: Arc::new(AlwaysPass),
            lister: Arc::new(OneSource),
            coverage: Arc::new(coverage),
            reports: Arc::new(SummaryReport(r#"{"a.js": {"statements": {"pct": 10}}}"#)),
            confirmer: Arc::new(confirmer),
            progress: Arc::new(SilentProgress),
        }
    }

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/a.js"), "module.exports = 1;").unwrap();
        dir
    }

    #[tokio::test]
    async fn declined_confirmation_skips_regeneration() {
        let dir = project();
        let mut coverage = MockCoverageRunner::new();
        coverage
            .expect_run_coverage()
            .times(1)
            .returning(|| Ok(RunOutcome::passed()));
        let mut confirmer = MockConfirmer::new();
        confirmer
            .expect_confirm()
            .times(1)
            .returning(|_, default| Ok(!default));

        let ctx = RunContext::new(dir.path(), "src", "__tests__");
        let summary = Orchestrator::new(ctx, collaborators(coverage, confirmer))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.generated.len(), 1);
        assert_eq!(summary.undercovered, vec![(SourceFile::new("a.js"), 10.0)]);
        assert!(summary.regenerated.is_empty());
        assert!(dir.path().join("__tests__/a.test.js").is_file());
    }

    #[tokio::test]
    async fn failing_coverage_run_is_tolerated() {
        let dir = project();
        let mut coverage = MockCoverageRunner::new();
        coverage
            .expect_run_coverage()
            .times(1)
            .returning(|| Err(ExecuteError::Spawn("npx not found".into())));
        let mut confirmer = MockConfirmer::new();
        confirmer.expect_confirm().times(1).returning(|_, _| Ok(true));

        let ctx = RunContext::new(dir.path(), "src", "__tests__");
        let summary = Orchestrator::new(ctx, collaborators(coverage, confirmer))
            .run()
            .await
            .unwrap();

        assert!(summary.coverage_available);
        assert_eq!(summary.regenerated.len(), 1);
        assert!(summary.exhausted().is_empty());
    }

    #[tokio::test]
    async fn skip_coverage_never_runs_coverage() {
        let dir = project();
        let mut coverage = MockCoverageRunner::new();
        coverage.expect_run_coverage().times(0);
        let mut confirmer = MockConfirmer::new();
        confirmer.expect_confirm().times(0);

        let ctx = RunContext::new(dir.path(), "src", "__tests__");
        let summary = Orchestrator::new(ctx, collaborators(coverage, confirmer))
            .with_skip_coverage(true)
            .run()
            .await
            .unwrap();

        assert!(!summary.coverage_available);
        assert_eq!(summary.generated.len(), 1);
    }
}
