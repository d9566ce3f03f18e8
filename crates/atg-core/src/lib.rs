//! atg Core - closed-loop test generation engine
//!
//! Decides which source files lack tests, drives an LLM through a bounded
//! generate → run → repair loop per file, and uses coverage results to pick
//! files for regeneration:
//! - [`path`]: source ↔ test path matching
//! - [`scanner`]: tested/untested partition of a source tree
//! - [`session`]: the per-file retry state machine
//! - [`coverage`]: report parsing and under-coverage selection
//! - [`orchestrator`]: the full sequential pass
//!
//! Every external effect (completion service, test runner, file listing,
//! prompts) sits behind a trait in [`collaborators`].
//!
//! # Example
//!
//! ```rust,ignore
//! use atg_core::{Collaborators, Orchestrator, RunContext};
//!
//! # async fn example(collaborators: Collaborators) -> Result<(), Box<dyn std::error::Error>> {
//! let ctx = RunContext::new(".", "src", "__tests__").with_max_attempts(3);
//! let summary = Orchestrator::new(ctx, collaborators).run().await?;
//!
//! println!("Generated {} tests", summary.generated.len());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod collaborators;
pub mod conversation;
pub mod coverage;
pub mod error;
pub mod orchestrator;
pub mod path;
pub mod scanner;
pub mod session;
pub mod types;

pub use collaborators::{
    Confirmer, CoverageRunner, FileLister, ProgressSink, ReportReader, RunOutcome, SilentProgress,
    TestExecutor, TestGenerator,
};
pub use conversation::{Conversation, Message, Role, SYSTEM_INSTRUCTION};
pub use coverage::{
    load_coverage, parse_coverage, select_undercovered, CoverageRecord, FINAL_REPORT,
    SUMMARY_REPORT,
};
pub use error::{
    CoverageError, ExecuteError, GenerateError, ListError, OrchestratorError, PathError,
    PromptError, ReportShape, ScanError, SessionError,
};
pub use orchestrator::{Collaborators, FileResult, Orchestrator, RunSummary};
pub use path::{has_matching_test, join_normalized, test_path_for, SourceFile, TestFile};
pub use scanner::Scanner;
pub use session::{
    GenerationSession, SessionConfig, SessionOutcome, SessionReport, SessionSeed, SessionState,
};
pub use types::{AtgConfig, RunContext, SessionId};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving the engine
    pub use crate::{
        AtgConfig, Collaborators, Orchestrator, RunContext, RunSummary, SessionOutcome, SourceFile,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
