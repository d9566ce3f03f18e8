//! Command line definition

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

/// Options shared by `run` and `scan`
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RunOptions {
    pub(crate) project_root: Option<PathBuf>,
    pub(crate) source_dir: Option<String>,
    pub(crate) test_dir: Option<String>,
    pub(crate) config: Option<PathBuf>,
    pub(crate) max_retries: Option<u32>,
    pub(crate) coverage_threshold: Option<f64>,
    pub(crate) history_limit: Option<usize>,
    pub(crate) yes: bool,
    pub(crate) skip_coverage: bool,
}

impl RunOptions {
    pub(crate) fn from_matches(args: &ArgMatches) -> Self {
        Self {
            project_root: args.get_one::<PathBuf>("project-root").cloned(),
            source_dir: args.get_one::<String>("source-dir").cloned(),
            test_dir: args.get_one::<String>("test-dir").cloned(),
            config: args.get_one::<PathBuf>("config").cloned(),
            max_retries: lookup::<u32>(args, "max-retries"),
            coverage_threshold: lookup::<f64>(args, "coverage-threshold"),
            history_limit: lookup::<usize>(args, "history-limit"),
            yes: flag(args, "yes"),
            skip_coverage: flag(args, "skip-coverage"),
        }
    }
}

/// Parsed invocation
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Invocation {
    Run(RunOptions),
    Scan(RunOptions),
    ConfigPath(Option<PathBuf>),
    ConfigShow(Option<PathBuf>),
}

/// Global logging switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct LogOptions {
    pub(crate) verbose: bool,
    pub(crate) json: bool,
}

pub(crate) fn build_cli() -> Command {
    Command::new("atg")
        .version(atg_core::VERSION)
        .about("Generate, run and repair Jest unit tests with an LLM")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Debug-level logging"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .args(run_args())
        .subcommand(
            Command::new("run")
                .about("Generate missing tests, repair failing ones, then check coverage (default)")
                .args(run_args()),
        )
        .subcommand(
            Command::new("scan")
                .about("List source files without a matching test")
                .args(run_args()),
        )
        .subcommand(
            Command::new("config")
                .about("Inspect the saved configuration")
                .subcommand_required(true)
                .arg(config_arg())
                .subcommand(Command::new("path").about("Print the config file location"))
                .subcommand(Command::new("show").about("Print the saved config, connection redacted")),
        )
}

fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .value_parser(value_parser!(PathBuf))
        .help("Config file to use instead of the per-user default")
}

fn run_args() -> Vec<Arg> {
    vec![
        Arg::new("project-root")
            .long("project-root")
            .value_parser(value_parser!(PathBuf))
            .help("Directory Jest runs in (default: current directory)"),
        Arg::new("source-dir")
            .long("source-dir")
            .help("Source directory relative to the project root"),
        Arg::new("test-dir")
            .long("test-dir")
            .help(
                "Test output directory relative to the project root (default: <source-dir>/__tests__; \
                 tests outside the source directory are not found by later scans)",
            ),
        config_arg(),
        Arg::new("max-retries")
            .long("max-retries")
            .value_parser(value_parser!(u32))
            .help("Override the saved repair budget"),
        Arg::new("coverage-threshold")
            .long("coverage-threshold")
            .value_parser(value_parser!(f64))
            .help("Statement coverage percentage below which files are regenerated"),
        Arg::new("history-limit")
            .long("history-limit")
            .value_parser(value_parser!(usize))
            .help("Exchanges of history sent with each repair request"),
        Arg::new("yes")
            .short('y')
            .long("yes")
            .action(ArgAction::SetTrue)
            .help("Answer yes to every confirmation"),
        Arg::new("skip-coverage")
            .long("skip-coverage")
            .action(ArgAction::SetTrue)
            .help("Stop after the repair pass"),
    ]
}

/// Turn matches into an invocation plus logging switches
pub(crate) fn interpret(matches: &ArgMatches) -> (Invocation, LogOptions) {
    let either = |id: &str| {
        flag(matches, id) || matches.subcommand().is_some_and(|(_, sub)| flag(sub, id))
    };
    let log = LogOptions {
        verbose: either("verbose"),
        json: either("log-json"),
    };
    let invocation = match matches.subcommand() {
        Some(("scan", args)) => Invocation::Scan(RunOptions::from_matches(args)),
        Some(("run", args)) => Invocation::Run(RunOptions::from_matches(args)),
        Some(("config", args)) => {
            let path = args.get_one::<PathBuf>("config").cloned();
            match args.subcommand_name() {
                Some("show") => Invocation::ConfigShow(path),
                _ => Invocation::ConfigPath(path),
            }
        }
        _ => Invocation::Run(RunOptions::from_matches(matches)),
    };
    (invocation, log)
}

fn lookup<T: Clone + Send + Sync + 'static>(args: &ArgMatches, id: &str) -> Option<T> {
    args.try_get_one::<T>(id).ok().flatten().cloned()
}

fn flag(args: &ArgMatches, id: &str) -> bool {
    args.try_get_one::<bool>(id).ok().flatten().copied().unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(argv: &[&str]) -> (Invocation, LogOptions) {
        let matches = build_cli().try_get_matches_from(argv).unwrap();
        interpret(&matches)
    }

    #[test]
    fn cli_is_well_formed() {
        build_cli().debug_assert();
    }

    #[test]
    fn bare_invocation_runs() {
        let (invocation, log) = parse(&["atg"]);
        assert_eq!(invocation, Invocation::Run(RunOptions::default()));
        assert_eq!(log, LogOptions::default());
    }

    #[test]
    fn run_flags_without_subcommand() {
        let (invocation, _) = parse(&["atg", "--source-dir", "lib", "--max-retries", "2", "-y"]);
        let Invocation::Run(options) = invocation else {
            panic!("expected run");
        };
        assert_eq!(options.source_dir.as_deref(), Some("lib"));
        assert_eq!(options.max_retries, Some(2));
        assert!(options.yes);
    }

    #[test]
    fn run_subcommand_with_global_flags() {
        let (invocation, log) = parse(&[
            "atg",
            "run",
            "--coverage-threshold",
            "90",
            "--history-limit",
            "3",
            "--skip-coverage",
            "-v",
            "--log-json",
        ]);
        let Invocation::Run(options) = invocation else {
            panic!("expected run");
        };
        assert_eq!(options.coverage_threshold, Some(90.0));
        assert_eq!(options.history_limit, Some(3));
        assert!(options.skip_coverage);
        assert!(log.verbose && log.json);
    }

    #[test]
    fn scan_subcommand() {
        let (invocation, _) = parse(&["atg", "scan", "--source-dir", "src"]);
        assert!(matches!(invocation, Invocation::Scan(o) if o.source_dir.as_deref() == Some("src")));
    }

    #[test]
    fn config_subcommands() {
        assert_eq!(parse(&["atg", "config", "path"]).0, Invocation::ConfigPath(None));
        assert_eq!(
            parse(&["atg", "config", "--config", "/tmp/c.json", "show"]).0,
            Invocation::ConfigShow(Some(PathBuf::from("/tmp/c.json")))
        );
    }

    #[test]
    fn bad_retry_value_is_rejected() {
        assert!(build_cli()
            .try_get_matches_from(["atg", "--max-retries", "many"])
            .is_err());
    }
}
