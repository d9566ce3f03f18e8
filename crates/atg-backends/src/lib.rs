//! atg Backends - concrete collaborators for the engine
//!
//! - [`openai`]: chat-completions test generator
//! - [`jest`]: test executor and coverage runner
//! - [`lister`]: glob-based file listing
//! - [`reports`]: coverage report reader
//! - [`console`]: terminal prompts and confirmation
//! - [`config_store`]: saved configuration

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config_store;
pub mod console;
pub mod jest;
pub mod lister;
pub mod openai;
pub mod reports;

pub use config_store::{redacted, ConfigError, ConfigStore};
pub use console::{ConsolePrompter, StdioPrompter};
pub use jest::JestRunner;
pub use lister::GlobLister;
pub use openai::{ChatCompletionsClient, ConnectionSettings};
pub use reports::FsReportReader;
