//! Generation Session
//!
//! Owns one source file's test-authoring lifecycle:
//!
//! ```text
//! Drafting ──generate──▶ Verifying ──execute──▶ Done
//!    ▲                       │
//!    └──── repair request ◀──┘ (while repairs < max_attempts, else Exhausted)
//! ```
//!
//! The initial draft is always generated and verified once; `max_attempts`
//! bounds only the repair cycles after it. Exhaustion is a terminal state, not
//! an error: the last draft stays on disk.

use crate::collaborators::{RunOutcome, TestExecutor, TestGenerator};
use crate::conversation::{Conversation, Message};
use crate::error::SessionError;
use crate::path::{SourceFile, TestFile};
use crate::types::SessionId;
use std::path::{Path, PathBuf};
use tracing::Instrument;

/// Shared output rules appended to every authoring request
const OUTPUT_RULES: &str = "Respond with valid test code only.\n\
Do not include explanations, markdown fences or headings; use /* inline comments */ inside the code if you must explain something.\n\
Aim for full branch coverage of every exported function and class, including edge cases and error paths.\n";

/// How the conversation starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSeed {
    /// Write a test from scratch (overwrites any existing test)
    Initial { source_code: String },
    /// Fix an existing failing test
    Repair {
        existing_code: String,
        failure: String,
    },
}

/// Retry and prompt-size knobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Repair cycles allowed after the initial draft
    pub max_attempts: u32,
    /// Exchanges kept after the anchor when prompting
    pub history_limit: Option<usize>,
}

impl SessionConfig {
    #[inline]
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            history_limit: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_history_limit(mut self, limit: Option<usize>) -> Self {
        self.history_limit = limit;
        self
    }
}

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Drafting,
    Verifying,
    Done,
    Exhausted,
}

/// Terminal result of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The test runner accepted a draft
    Passed { repairs: u32 },
    /// Repair budget spent; the last draft is left on disk, possibly failing
    Exhausted { repairs: u32, last_error: String },
}

impl SessionOutcome {
    #[inline]
    #[must_use]
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed { .. })
    }

    /// Repair cycles used
    #[inline]
    #[must_use]
    pub fn repairs(&self) -> u32 {
        match self {
            Self::Passed { repairs } | Self::Exhausted { repairs, .. } => *repairs,
        }
    }
}

/// Everything a finished session leaves behind
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub id: SessionId,
    pub source: SourceFile,
    pub test_file: TestFile,
    pub outcome: SessionOutcome,
    /// `Done` or `Exhausted`
    pub state: SessionState,
    /// Runner result of the final verification
    pub last_outcome: Option<RunOutcome>,
    pub conversation: Conversation,
    /// Last draft handed to the executor
    pub last_code: String,
    pub generation_calls: u32,
    pub execute_calls: u32,
}

/// One source file's generate → verify → repair loop
#[derive(Debug)]
pub struct GenerationSession {
    id: SessionId,
    source: SourceFile,
    test_file: TestFile,
    test_path: PathBuf,
    conversation: Conversation,
    state: SessionState,
    repairs: u32,
    last_code: String,
    last_outcome: Option<RunOutcome>,
    generation_calls: u32,
    execute_calls: u32,
}

impl GenerationSession {
    /// Create a session and seed its conversation
    ///
    /// # Arguments
    /// * `source` - Source file being tested
    /// * `source_display` - Project-relative source path quoted in prompts
    /// * `test_file` - Project-relative test path quoted in prompts
    /// * `project_root` - Directory the test file is resolved against
    /// * `seed` - Fresh authoring or repair of an existing test
    #[must_use]
    pub fn new(
        source: SourceFile,
        source_display: &str,
        test_file: TestFile,
        project_root: &Path,
        seed: SessionSeed,
    ) -> Self {
        let mut conversation = Conversation::new();
        match seed {
            SessionSeed::Initial { source_code } => {
                conversation.push(Message::user(initial_prompt(
                    source_display,
                    test_file.as_str(),
                    source.file_name(),
                    &source_code,
                )));
            }
            SessionSeed::Repair {
                existing_code,
                failure,
            } => {
                conversation.push(Message::user(format!(
                    "Existing test file at (project-relative): {test_file}\n\n{existing_code}"
                )));
                conversation.push(Message::user(format!(
                    "This test failed with error:\n\n{failure}\n\nPlease revise the test to fix it.\n{OUTPUT_RULES}"
                )));
            }
        }

        Self {
            id: SessionId::new(),
            test_path: test_file.to_path(project_root),
            source,
            test_file,
            conversation,
            state: SessionState::Drafting,
            repairs: 0,
            last_code: String::new(),
            last_outcome: None,
            generation_calls: 0,
            execute_calls: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Absolute location the executor writes to
    #[inline]
    #[must_use]
    pub fn test_path(&self) -> &Path {
        &self.test_path
    }

    /// Drive the loop to a terminal state
    ///
    /// # Errors
    /// Generation and execution failures end the session immediately and are
    /// not retried; only failing test runs drive repairs.
    pub async fn run(
        mut self,
        generator: &dyn TestGenerator,
        executor: &dyn TestExecutor,
        config: SessionConfig,
    ) -> Result<SessionReport, SessionError> {
        let span = tracing::info_span!("session", id = %self.id, source = %self.source);
        let outcome = self.drive(generator, executor, config).instrument(span).await?;

        Ok(SessionReport {
            id: self.id,
            source: self.source,
            test_file: self.test_file,
            outcome,
            state: self.state,
            last_outcome: self.last_outcome,
            conversation: self.conversation,
            last_code: self.last_code,
            generation_calls: self.generation_calls,
            execute_calls: self.execute_calls,
        })
    }

    async fn drive(
        &mut self,
        generator: &dyn TestGenerator,
        executor: &dyn TestExecutor,
        config: SessionConfig,
    ) -> Result<SessionOutcome, SessionError> {
        self.draft(generator, config.history_limit).await?;

        loop {
            self.state = SessionState::Verifying;
            ensure_parent_dir(&self.test_path).await?;
            let outcome = executor.execute(&self.test_path, &self.last_code).await?;
            self.execute_calls += 1;

            if outcome.passed {
                tracing::info!(repairs = self.repairs, "test passed");
                self.state = SessionState::Done;
                self.last_outcome = Some(outcome);
                return Ok(SessionOutcome::Passed {
                    repairs: self.repairs,
                });
            }

            if self.repairs >= config.max_attempts {
                tracing::warn!(repairs = self.repairs, "repair budget exhausted");
                self.state = SessionState::Exhausted;
                let last_error = outcome.error_text().to_string();
                self.last_outcome = Some(outcome);
                return Ok(SessionOutcome::Exhausted {
                    repairs: self.repairs,
                    last_error,
                });
            }

            self.repairs += 1;
            tracing::debug!(attempt = self.repairs, "test failed, requesting repair");
            self.conversation.push(Message::user(format!(
                "The previous test failed with this error:\n\n{}\n\nPlease revise the test to fix it.",
                outcome.error_text()
            )));
            self.last_outcome = Some(outcome);
            self.state = SessionState::Drafting;
            self.draft(generator, config.history_limit).await?;
        }
    }

    async fn draft(
        &mut self,
        generator: &dyn TestGenerator,
        history_limit: Option<usize>,
    ) -> Result<(), SessionError> {
        let request = self.conversation.window(history_limit);
        let code = generator.generate(&request).await?;
        self.generation_calls += 1;
        self.conversation.push(Message::assistant(code.clone()));
        self.last_code = code;
        Ok(())
    }
}

fn initial_prompt(source: &str, test: &str, file_name: &str, source_code: &str) -> String {
    format!(
        "You are an expert JavaScript/TypeScript testing assistant.\n\n\
         Generate a Jest unit test file for the source code below.\n\
         The source file is located at (project-relative): {source}\n\
         The test file will be created at (project-relative): {test}\n\
         {OUTPUT_RULES}\n\
         Source file: {file_name}\n{source_code}\n"
    )
}

async fn ensure_parent_dir(path: &Path) -> Result<(), SessionError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|source| SessionError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })
}
