//! Jest runner backend
//!
//! Writes drafts to disk and shells out to the configured test command in
//! the project root. A failing run is an outcome, not an error.

use async_trait::async_trait;
use atg_core::{CoverageRunner, ExecuteError, RunOutcome, TestExecutor};
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;

/// Flags appended when running a single test file
pub const RUN_FLAGS: &[&str] = &["--runInBand", "--verbose", "--watchAll=false"];

/// Flags for the whole-suite coverage run
pub const COVERAGE_FLAGS: &[&str] = &[
    "--coverage",
    "--coverageReporters=json-summary",
    "--coverageReporters=json",
    "--watchAll=false",
];

/// Runs Jest (or a compatible command) in a project root
#[derive(Debug, Clone)]
pub struct JestRunner {
    project_root: PathBuf,
    command: Vec<String>,
}

impl JestRunner {
    #[inline]
    #[must_use]
    pub fn new(project_root: impl Into<PathBuf>, command: Vec<String>) -> Self {
        Self {
            project_root: project_root.into(),
            command,
        }
    }

    #[inline]
    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Full argument vector for one test file, program first
    #[must_use]
    pub fn test_invocation(&self, test_path: &Path) -> Vec<String> {
        let mut args = self.command.clone();
        args.push(test_path.to_string_lossy().into_owned());
        args.extend(RUN_FLAGS.iter().map(ToString::to_string));
        args
    }

    /// Full argument vector for the coverage run, program first
    #[must_use]
    pub fn coverage_invocation(&self) -> Vec<String> {
        let mut args = self.command.clone();
        args.extend(COVERAGE_FLAGS.iter().map(ToString::to_string));
        args
    }

    async fn spawn(&self, invocation: &[String]) -> Result<Output, ExecuteError> {
        let (program, args) = invocation
            .split_first()
            .ok_or_else(|| ExecuteError::Spawn("test command is empty".to_string()))?;

        tracing::debug!(program = %program, args = ?args, "spawning test command");
        Command::new(platform_program(program))
            .args(args)
            .current_dir(&self.project_root)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ExecuteError::Spawn(format!("{program}: {e}")))
    }
}

#[async_trait]
impl TestExecutor for JestRunner {
    async fn execute(&self, test_path: &Path, test_code: &str) -> Result<RunOutcome, ExecuteError> {
        if !test_code.is_empty() {
            tokio::fs::write(test_path, test_code)
                .await
                .map_err(|e| ExecuteError::io_error(test_path, e))?;
        }

        match self.spawn(&self.test_invocation(test_path)).await {
            Ok(output) => Ok(outcome_from(&output)),
            // A runner that cannot start is reported like a failing test
            Err(ExecuteError::Spawn(message)) => Ok(RunOutcome::failed(message)),
            Err(other) => Err(other),
        }
    }
}

#[async_trait]
impl CoverageRunner for JestRunner {
    async fn run_coverage(&self) -> Result<RunOutcome, ExecuteError> {
        let output = self.spawn(&self.coverage_invocation()).await?;
        Ok(outcome_from(&output))
    }
}

fn outcome_from(output: &Output) -> RunOutcome {
    if output.status.success() {
        RunOutcome::passed()
    } else {
        RunOutcome::failed(combined_output(&output.stdout, &output.stderr))
    }
}

/// stdout followed by stderr; Jest prints its failure report on stderr
#[must_use]
pub fn combined_output(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
        (true, true) => "test command failed without output".to_string(),
        (false, true) => stdout.into_owned(),
        (true, false) => stderr.into_owned(),
        (false, false) => format!("{stdout}\n{stderr}"),
    }
}

#[cfg(windows)]
fn platform_program(program: &str) -> String {
    match program {
        "npx" | "npm" | "yarn" | "pnpm" => format!("{program}.cmd"),
        other => other.to_string(),
    }
}

#[cfg(not(windows))]
fn platform_program(program: &str) -> String {
    program.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn runner(root: &Path, command: &[&str]) -> JestRunner {
        JestRunner::new(root, command.iter().map(ToString::to_string).collect())
    }

    #[test]
    fn test_invocation_shape() {
        let jest = runner(Path::new("/proj"), &["npx", "jest"]);
        assert_eq!(
            jest.test_invocation(Path::new("__tests__/a.test.js")),
            vec![
                "npx",
                "jest",
                "__tests__/a.test.js",
                "--runInBand",
                "--verbose",
                "--watchAll=false"
            ]
        );
    }

    #[test]
    fn coverage_invocation_requests_both_reports() {
        let jest = runner(Path::new("/proj"), &["npx", "jest"]);
        let args = jest.coverage_invocation();
        assert!(args.contains(&"--coverageReporters=json-summary".to_string()));
        assert!(args.contains(&"--coverageReporters=json".to_string()));
    }

    #[test]
    fn combined_output_keeps_both_streams() {
        assert_eq!(combined_output(b"out", b"err"), "out\nerr");
        assert_eq!(combined_output(b"", b"err"), "err");
        assert_eq!(combined_output(b"", b"  "), "test command failed without output");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn execute_writes_code_and_reports_pass() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.test.js");
        let jest = runner(dir.path(), &["true"]);

        let outcome = jest.execute(&path, "test('x', () => {});").await.unwrap();

        assert!(outcome.passed);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "test('x', () => {});");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn execute_with_empty_code_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.test.js");
        std::fs::write(&path, "existing").unwrap();
        let jest = runner(dir.path(), &["false"]);

        let outcome = jest.execute(&path, "").await.unwrap();

        assert!(!outcome.passed);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "existing");
    }

    #[tokio::test]
    async fn missing_program_is_a_failed_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.test.js");
        let jest = runner(dir.path(), &["atg-no-such-runner-binary"]);

        let outcome = jest.execute(&path, "x").await.unwrap();

        assert!(!outcome.passed);
        assert!(outcome.error_text().contains("atg-no-such-runner-binary"));
    }

    #[tokio::test]
    async fn write_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("a.test.js");
        let jest = runner(dir.path(), &["true"]);

        let err = jest.execute(&path, "x").await.unwrap_err();
        assert!(matches!(err, ExecuteError::Io { .. }));
    }

    #[tokio::test]
    async fn empty_command_fails_coverage_run() {
        let dir = tempfile::tempdir().unwrap();
        let jest = runner(dir.path(), &[]);
        let err = jest.run_coverage().await.unwrap_err();
        assert!(matches!(err, ExecuteError::Spawn(_)));
    }
}
