use anyhow::{bail, Context, Result};
use atg_backends::openai::API_KEY_ENV;
use atg_backends::{
    redacted, ChatCompletionsClient, ConfigStore, ConnectionSettings, FsReportReader, GlobLister,
    JestRunner, StdioPrompter,
};
use atg_core::{join_normalized, AtgConfig, Collaborators, Orchestrator, RunContext, Scanner};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod cli;
mod progress;

use cli::{Invocation, LogOptions, RunOptions};
use progress::ConsoleProgress;

const DEFAULT_SOURCE_DIR: &str = "src";
/// Test directory created under the source directory unless one is given
const TEST_SUBDIR: &str = "__tests__";

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli::build_cli().get_matches();
    let (invocation, log) = cli::interpret(&matches);
    init_tracing(log);

    match invocation {
        Invocation::Run(options) => run(options).await,
        Invocation::Scan(options) => scan(options).await,
        Invocation::ConfigPath(path) => {
            println!("{}", store_for(path)?.path().display());
            Ok(())
        }
        Invocation::ConfigShow(path) => {
            let store = store_for(path)?;
            if !store.exists().await {
                bail!("no saved config at {}", store.path().display());
            }
            let config = store.load().await?;
            println!("{}", serde_json::to_string_pretty(&redacted(&config))?);
            Ok(())
        }
    }
}

fn init_tracing(log: LogOptions) {
    let default_level = if log.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(options: RunOptions) -> Result<()> {
    let project_root = project_root(&options)?;
    let prompter = Arc::new(StdioPrompter::stdio().with_assume_yes(options.yes));

    let store = store_for(options.config.clone())?;
    let config = apply_overrides(store.resolve(prompter.as_ref()).await?, &options);
    let ctx = context(&project_root, &options, prompter.as_ref())
        .await?
        .with_config(&config);

    let settings = ConnectionSettings::from_value(&config.connection)?
        .with_key_fallback(std::env::var(API_KEY_ENV).ok());
    let generator = ChatCompletionsClient::new(settings, config.model.clone())?;
    let jest = Arc::new(JestRunner::new(&project_root, config.test_command.clone()));

    let collaborators = Collaborators {
        generator: Arc::new(generator),
        executor: jest.clone(),
        lister: Arc::new(GlobLister::new()),
        coverage: jest,
        reports: Arc::new(FsReportReader),
        confirmer: prompter,
        progress: Arc::new(ConsoleProgress),
    };

    tracing::info!(
        root = %project_root.display(),
        source = %ctx.source_root,
        tests = %ctx.test_root,
        model = %config.model,
        max_retries = ctx.max_attempts,
        "starting run"
    );
    let summary = Orchestrator::new(ctx, collaborators)
        .with_skip_coverage(options.skip_coverage)
        .run()
        .await?;

    for line in progress::summary_lines(&summary) {
        println!("{line}");
    }
    Ok(())
}

async fn scan(options: RunOptions) -> Result<()> {
    let project_root = project_root(&options)?;
    let prompter = StdioPrompter::stdio();
    let source_dir = match options.source_dir {
        Some(dir) => checked_relative(dir)?,
        None => prompter.ask_relative_dir("Source directory", DEFAULT_SOURCE_DIR).await?,
    };

    let scanner = Scanner::new(Arc::new(GlobLister::new()));
    let untested = scanner
        .untested_files(&project_root.join(&source_dir))
        .await?;
    for source in &untested {
        println!("{source}");
    }
    tracing::info!(untested = untested.len(), "scan finished");
    Ok(())
}

fn project_root(options: &RunOptions) -> Result<PathBuf> {
    match &options.project_root {
        Some(root) => Ok(root.clone()),
        None => std::env::current_dir().context("cannot read current directory"),
    }
}

fn store_for(path: Option<PathBuf>) -> Result<ConfigStore> {
    Ok(match path {
        Some(path) => ConfigStore::at(path),
        None => ConfigStore::default_location()?,
    })
}

fn apply_overrides(mut config: AtgConfig, options: &RunOptions) -> AtgConfig {
    if let Some(retries) = options.max_retries {
        config.max_retries = retries;
    }
    if let Some(threshold) = options.coverage_threshold {
        config.coverage_threshold = threshold;
    }
    if options.history_limit.is_some() {
        config.history_limit = options.history_limit;
    }
    config
}

async fn context(
    project_root: &Path,
    options: &RunOptions,
    prompter: &StdioPrompter,
) -> Result<RunContext> {
    let source_dir = match options.source_dir.clone() {
        Some(dir) => checked_relative(dir)?,
        None => prompter.ask_relative_dir("Source directory", DEFAULT_SOURCE_DIR).await?,
    };
    let test_dir = match options.test_dir.clone() {
        Some(dir) => checked_relative(dir)?,
        None => {
            prompter
                .ask_relative_dir("Test directory", &default_test_dir(&source_dir))
                .await?
        }
    };
    if !is_within(&test_dir, &source_dir) {
        tracing::warn!(
            tests = %test_dir,
            source = %source_dir,
            "test directory is outside the source directory; later scans will not see these tests"
        );
    }
    Ok(RunContext::new(project_root, source_dir, test_dir))
}

/// Tests land inside the scanned tree so a rerun finds them
fn default_test_dir(source_dir: &str) -> String {
    join_normalized(source_dir, TEST_SUBDIR)
}

fn is_within(dir: &str, root: &str) -> bool {
    let dir = join_normalized(dir, "");
    let root = join_normalized(root, "");
    root == "." || dir == root || dir.starts_with(&format!("{root}/"))
}

fn checked_relative(dir: String) -> Result<String> {
    if Path::new(&dir).is_absolute() || dir.starts_with('/') || dir.starts_with('\\') {
        bail!("{dir} must be relative to the project root");
    }
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_test_dir_sits_under_the_sources() {
        assert_eq!(default_test_dir("src"), "src/__tests__");
        assert_eq!(default_test_dir("./lib/"), "lib/__tests__");
        assert_eq!(default_test_dir("."), "__tests__");
        assert!(is_within(&default_test_dir("src"), "src"));
    }

    #[test]
    fn sibling_test_dir_is_outside_the_sources() {
        assert!(!is_within("__tests__", "src"));
        assert!(!is_within("src2/__tests__", "src"));
        assert!(is_within("src\\__tests__", "src"));
        assert!(is_within("__tests__", "."));
    }

    #[test]
    fn absolute_dirs_are_rejected() {
        assert!(checked_relative("/tmp/tests".to_string()).is_err());
        assert_eq!(checked_relative("tests".to_string()).unwrap(), "tests");
    }
}
