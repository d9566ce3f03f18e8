//! Error types for atg Core
//!
//! Provides error handling for:
//! - Path derivation (source → test file)
//! - Source/test scanning
//! - Collaborator failures (generation, execution, prompts)
//! - Coverage report loading
//! - Orchestration

use std::path::PathBuf;

/// Path derivation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Path does not end in a recognized source extension
    #[error("invalid source path (expected .js, .ts, .jsx or .tsx): {0}")]
    InvalidPath(String),
}

/// File listing errors raised by a [`FileLister`](crate::FileLister)
#[derive(Debug, thiserror::Error)]
pub enum ListError {
    /// Glob pattern could not be compiled
    #[error("invalid glob pattern '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },

    /// Walking the directory tree failed
    #[error("io error listing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ListError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Scanner errors
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// The listing collaborator failed
    #[error("failed to list files under {root}: {source}")]
    Listing {
        root: PathBuf,
        #[source]
        source: ListError,
    },
}

/// Errors from the completion service
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// Request could not be sent or response not received
    #[error("transport error: {0}")]
    Transport(String),

    /// Service answered with a non-success status
    #[error("completion service returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Response envelope did not carry a completion
    #[error("malformed completion response: {0}")]
    MalformedResponse(String),

    /// Connection settings are unusable
    #[error("invalid connection settings: {0}")]
    InvalidConnection(String),
}

/// Errors from the test executor
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    /// Writing the test file failed
    #[error("io error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Test command could not be started
    #[error("failed to start test command: {0}")]
    Spawn(String),
}

impl ExecuteError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Interactive prompt errors
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// Reading from or writing to the terminal failed
    #[error("prompt io error: {0}")]
    Io(#[from] std::io::Error),

    /// Input stream closed before an answer was given
    #[error("input closed while waiting for: {0}")]
    InputClosed(String),
}

/// Shape of a coverage report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportShape {
    /// Pre-aggregated `coverage-summary.json`
    Summary,
    /// Raw per-statement `coverage-final.json`
    Final,
}

impl std::fmt::Display for ReportShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Summary => f.write_str("summary"),
            Self::Final => f.write_str("final"),
        }
    }
}

/// Coverage loading errors
#[derive(Debug, thiserror::Error)]
pub enum CoverageError {
    /// Neither report shape is present
    #[error("no coverage report found")]
    NoCoverageReport,

    /// Report is not valid JSON of the expected shape
    #[error("malformed {shape} coverage report: {source}")]
    Malformed {
        shape: ReportShape,
        #[source]
        source: serde_json::Error,
    },

    /// Reading a report failed for a reason other than absence
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CoverageError {
    /// Missing reports are advisory, not failures
    #[inline]
    #[must_use]
    pub fn is_missing_report(&self) -> bool {
        matches!(self, Self::NoCoverageReport)
    }
}

/// Errors that end a Generation Session abnormally
///
/// Retry exhaustion is not an error; see [`SessionOutcome`](crate::SessionOutcome).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Generation call failed
    #[error("generation failed: {0}")]
    Generate(#[from] GenerateError),

    /// Execution call failed
    #[error("execution failed: {0}")]
    Execute(#[from] ExecuteError),

    /// Test directory could not be created
    #[error("failed to create test directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Main orchestration error type
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Scan failed
    #[error("scan failed: {0}")]
    Scan(#[from] ScanError),

    /// Test path could not be derived
    #[error("path error: {0}")]
    Path(#[from] PathError),

    /// A Generation Session failed
    #[error("session for {source_file} failed: {error}")]
    Session {
        source_file: String,
        #[source]
        error: SessionError,
    },

    /// Re-running an existing test failed to execute
    #[error("execution failed: {0}")]
    Execute(#[from] ExecuteError),

    /// Confirmation prompt failed
    #[error("prompt failed: {0}")]
    Prompt(#[from] PromptError),

    /// Reading a source or test file failed
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl OrchestratorError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create session error for a source file
    pub fn session(source_file: impl Into<String>, error: SessionError) -> Self {
        Self::Session {
            source_file: source_file.into(),
            error,
        }
    }

    /// Whether this error aborted the whole batch
    ///
    /// Every variant that reaches the caller did; this exists so callers can
    /// distinguish collaborator outages from local filesystem problems.
    #[inline]
    #[must_use]
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            Self::Session {
                error: SessionError::Generate(_) | SessionError::Execute(_),
                ..
            } | Self::Execute(_)
                | Self::Prompt(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_error_display() {
        let err = PathError::InvalidPath("README.md".to_string());
        assert!(err.to_string().contains("README.md"));
    }

    #[test]
    fn missing_report_is_advisory() {
        assert!(CoverageError::NoCoverageReport.is_missing_report());

        let io = CoverageError::Io {
            path: PathBuf::from("coverage/coverage-final.json"),
            source: std::io::Error::other("denied"),
        };
        assert!(!io.is_missing_report());
    }

    #[test]
    fn collaborator_failure_classification() {
        let generate = OrchestratorError::session(
            "a.js",
            SessionError::Generate(GenerateError::Transport("reset".into())),
        );
        assert!(generate.is_collaborator_failure());

        let io = OrchestratorError::io_error("a.js", std::io::Error::other("gone"));
        assert!(!io.is_collaborator_failure());
    }

    #[test]
    fn session_error_mentions_source() {
        let err = OrchestratorError::session(
            "src/a.js",
            SessionError::Generate(GenerateError::Api {
                status: 429,
                message: "rate limited".into(),
            }),
        );
        let text = err.to_string();
        assert!(text.contains("src/a.js"));
        assert!(text.contains("429"));
    }
}
