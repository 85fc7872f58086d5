//! Command-line definitions and output helpers of the `dynmock` binary.

use crate::app::demo::demo_suite;
use crate::app::dto::{CaseStatus, RunReport};
use crate::app::runner::Runner;
use crate::config::RunnerConfig;
use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// dynmock - run the built-in mocking demonstration suite
#[derive(Parser)]
#[command(name = "dynmock")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the test names of the demo suite
    List,

    /// Run the demo suite
    Run(RunArgs),
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Only run tests whose name matches this regex
    #[arg(long)]
    pub filter: Option<String>,

    /// Skip tests whose name matches this regex
    #[arg(long)]
    pub exclude: Option<String>,

    /// Stop after the first failing test
    #[arg(long)]
    pub fail_fast: bool,

    /// Poll duration above which the async loop reports a slow callback
    #[arg(long)]
    pub slow_callback_threshold_ms: Option<u64>,

    /// Log slow callbacks instead of failing the test
    #[arg(long)]
    pub slow_callback_is_not_fatal: bool,

    /// JSON runner configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Configuration file (if any) with the command-line flags applied on top.
pub fn resolve_config(args: &RunArgs) -> Result<RunnerConfig> {
    let mut config = match &args.config {
        Some(path) => RunnerConfig::load(path)?,
        None => RunnerConfig::default(),
    };
    if let Some(filter) = &args.filter {
        config.filter = Some(filter.clone());
    }
    if let Some(exclude) = &args.exclude {
        config.exclude = Some(exclude.clone());
    }
    if let Some(ms) = args.slow_callback_threshold_ms {
        config.slow_callback_threshold_ms = ms;
    }
    config.fail_fast |= args.fail_fast;
    config.slow_callback_is_not_fatal |= args.slow_callback_is_not_fatal;
    Ok(config)
}

pub fn list_tests() {
    let suite = demo_suite();
    for case in suite.cases() {
        let kind = if case.is_async() { "async" } else { "sync" };
        println!("{} ({kind})", case.name());
    }
}

/// Runs the demo suite and prints the report. Returns whether every test passed.
pub fn run_tests(args: &RunArgs) -> Result<bool> {
    let config = resolve_config(args)?;
    let runner = Runner::new(config)?;
    let report = runner.run(&demo_suite());
    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{json}");
    } else {
        print_summary(&report);
    }
    Ok(report.is_success())
}

pub fn print_summary(report: &RunReport) {
    println!("{}", report.suite);
    println!("{}", "=".repeat(report.suite.len()));
    for outcome in &report.outcomes {
        let status = match outcome.status {
            CaseStatus::Passed => "ok",
            CaseStatus::Failed => "FAILED",
        };
        println!("{:<40} {:>6} ({} ms)", outcome.name, status, outcome.duration_ms);
        for failure in &outcome.failures {
            println!("    {}: {}", failure.kind, failure.message.replace('\n', "\n    "));
        }
    }
    println!();
    println!(
        "{} passed, {} failed, {} skipped",
        report.passed, report.failed, report.skipped
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"filter": "strict", "slow_callback_threshold_ms": 50}}"#).unwrap();
        let args = RunArgs {
            config: Some(file.path().to_path_buf()),
            filter: Some("async".into()),
            fail_fast: true,
            ..RunArgs::default()
        };
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.filter.as_deref(), Some("async"));
        assert_eq!(config.slow_callback_threshold_ms, 50);
        assert!(config.fail_fast);
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let args = RunArgs {
            config: Some(PathBuf::from("/nonexistent/dynmock.json")),
            ..RunArgs::default()
        };
        let err = resolve_config(&args).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read config file"));
    }
}
