//! Binary entry point logic, kept in the library so it can be tested.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cli::{Cli, Commands, ConfigArgs, OutputFormat, ScanArgs};
use crate::config::Config;
use crate::duplicates::{DuplicateEngine, ExecutionMode, RunReport};
use crate::error::ExitCode;
use crate::logging::init_logging;
use crate::output::{CsvOutput, JsonOutput, TextOutput};
use crate::progress::Progress;
use crate::signal::install_handler;

/// Run the parsed command line and return the process exit code.
///
/// # Errors
///
/// Returns an error for invalid configuration or when the run cannot
/// start. Per-file failures are part of the report instead.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    let Cli {
        verbose,
        quiet,
        no_color,
        config,
        command,
        ..
    } = cli;

    init_logging(verbose, quiet);
    if no_color {
        yansi::disable();
    }

    let settings = Config::load(config.as_deref()).context("Failed to load configuration")?;

    match command {
        Commands::Scan(args) => run_scan(settings, &args, quiet),
        Commands::Config(args) => print_config(&settings, &args),
    }
}

fn run_scan(mut settings: Config, args: &ScanArgs, quiet: bool) -> Result<ExitCode> {
    settings.apply_scan_args(args);
    let mode = if args.apply {
        ExecutionMode::Apply
    } else {
        ExecutionMode::Simulate
    };

    let shutdown = install_handler()?;
    let mut engine_config = settings
        .engine_config(&args.path, mode)
        .context("Invalid settings")?
        .with_shutdown_flag(shutdown.get_flag());
    if !quiet && args.output == OutputFormat::Text {
        engine_config = engine_config.with_progress_callback(Arc::new(Progress::new(false)));
    }

    let engine = DuplicateEngine::new(engine_config)
        .with_context(|| format!("Cannot scan {}", args.path.display()))?;
    let report = engine.run()?;
    let exit_code = exit_code_for(&report);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match args.output {
        OutputFormat::Text => TextOutput::new(&report).write_to(&mut out)?,
        OutputFormat::Json => JsonOutput::new(&report, exit_code).write_to(&mut out)?,
        OutputFormat::Csv => CsvOutput::new(&report.groups).write_to(&mut out)?,
    }
    out.flush()?;

    Ok(exit_code)
}

fn print_config(settings: &Config, args: &ConfigArgs) -> Result<ExitCode> {
    if args.path {
        match Config::default_path() {
            Some(path) => println!("{}", path.display()),
            None => anyhow::bail!("No configuration directory on this platform"),
        }
    } else {
        print!("{}", settings.to_toml()?);
    }
    Ok(ExitCode::Success)
}

/// Exit code summarising a finished run.
#[must_use]
pub fn exit_code_for(report: &RunReport) -> ExitCode {
    if report.interrupted {
        ExitCode::Interrupted
    } else if report.has_errors() {
        ExitCode::PartialSuccess
    } else if report.groups_found == 0 {
        ExitCode::NoDuplicates
    } else {
        ExitCode::Success
    }
}
