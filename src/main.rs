//! milvus-smoke - Milvus end-to-end smoke test CLI
//!
//! Main entry point for the milvus-smoke command-line tool.

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use milvus_smoke::cli::{CompletionsArgs, ConfigArgs};
use milvus_smoke::logging::init_cli_logging;
use milvus_smoke::*;

/// Exit code for a run that failed a step.
const EXIT_RUN_FAILED: u8 = 1;
/// Exit code for bad configuration or usage.
const EXIT_USAGE: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match dispatch(&cli) {
        Ok(code) => code,
        Err(err) => {
            print_error(&err);
            ExitCode::from(EXIT_USAGE)
        }
    }
}

fn dispatch(cli: &Cli) -> Result<ExitCode> {
    let init = matches!(&cli.command, Some(Commands::Config(args)) if args.init);
    let mut config = if init {
        Config::default()
    } else {
        Config::load(cli.config.as_deref())?
    };
    if cli.no_color {
        config.output.colors = false;
    }
    if !config.output.colors {
        colored::control::set_override(false);
    }
    init_cli_logging(cli.quiet, cli.verbose, cli.log_format, config.output.colors);
    debug!(config = ?cli.config, "Configuration resolved");

    match &cli.command {
        None => cmd_run(cli, &RunArgs::default(), config),
        Some(Commands::Run(args)) => cmd_run(cli, args, config),
        Some(Commands::Config(args)) => cmd_config(cli, args, &config),
        Some(Commands::Completions(args)) => {
            cmd_completions(args);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_error(err: &anyhow::Error) {
    match err.downcast_ref::<SmokeError>() {
        Some(smoke) => {
            let title = format!("{} error", smoke.category());
            let suggestions: Vec<&str> = smoke.suggestion().into_iter().collect();
            eprintln!("{}", format_error(&title, &smoke.to_string(), &suggestions));
        }
        None => eprintln!("{err:#}"),
    }
}

fn output_format(cli: &Cli, config: &Config) -> Result<OutputFormat> {
    if let Some(format) = cli.format {
        return Ok(format);
    }
    match OutputFormat::from_name(&config.output.format) {
        Some(format) => Ok(format),
        None => bail!(format_unknown_value_error(
            "output format",
            &config.output.format,
            OutputFormat::NAMES
        )),
    }
}

/// Prints a spinner while a step runs and a result line when it finishes.
struct ConsoleObserver {
    spinner: Mutex<Option<ProgressBar>>,
}

impl ConsoleObserver {
    fn new() -> Self {
        Self {
            spinner: Mutex::new(None),
        }
    }
}

impl StepObserver for ConsoleObserver {
    fn step_started(&self, step: Step) {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.green} {msg} {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(format!("{}...", step.label()));
        spinner.enable_steady_tick(Duration::from_millis(80));
        if let Ok(mut slot) = self.spinner.lock() {
            *slot = Some(spinner);
        }
    }

    fn step_finished(&self, report: &StepReport) {
        if let Ok(mut slot) = self.spinner.lock() {
            if let Some(spinner) = slot.take() {
                spinner.finish_and_clear();
            }
        }
        println!("{}", report.render_line());
        if let Some(suggestion) = &report.suggestion {
            println!("      {} {}", "Hint:".cyan(), suggestion);
        }
    }
}

fn cmd_run(cli: &Cli, args: &RunArgs, mut config: Config) -> Result<ExitCode> {
    args.apply(&mut config);
    let format = output_format(cli, &config)?;
    let quiet = cli.quiet || config.output.quiet;
    let plan = config.to_plan()?;

    let mut runner = VerificationRunner::new(MilvusConnector::new(), plan)?;
    let show_progress = format == OutputFormat::Text && !quiet;
    if show_progress {
        let plan = runner.plan();
        println!(
            "{} {} (collection '{}', {} x {}-d vectors, {})",
            "Smoke testing".bold(),
            plan.connect.endpoint().cyan(),
            plan.collection,
            plan.count,
            plan.dimension,
            if plan.strict { "strict" } else { "lenient" }
        );
        runner = runner.with_observer(ConsoleObserver::new());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let outcome = runtime.block_on(runner.run());
    let report = &outcome.report;

    match format {
        OutputFormat::Text => {
            if show_progress {
                println!();
            }
            println!("{}", report.render_summary());
            if let Some(error) = &outcome.error {
                let suggestions: Vec<&str> = error.suggestion().into_iter().collect();
                let title = report.failure.as_ref().map_or_else(
                    || "Smoke test failed".to_string(),
                    |f| format!("{} failed ({} error)", f.step.label(), f.category),
                );
                eprintln!("{}", format_error(&title, &error.to_string(), &suggestions));
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string(report)?),
        OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(report)?),
    }

    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_RUN_FAILED)
    })
}

fn cmd_config(cli: &Cli, args: &ConfigArgs, config: &Config) -> Result<ExitCode> {
    if args.init {
        let path = cli
            .config
            .clone()
            .or_else(Config::user_config_path)
            .context("Could not determine a config directory; pass --config <path>")?;
        if path.exists() && !args.force {
            eprintln!(
                "{}",
                format_error(
                    &format!("Config file already exists: {}", path.display()),
                    "",
                    &["Pass --force to overwrite it."],
                )
            );
            return Ok(ExitCode::from(EXIT_USAGE));
        }
        Config::default().save_to(&path)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(key) = &args.get {
        return Ok(match config.get(key) {
            Some(value) => {
                println!("{value}");
                ExitCode::SUCCESS
            }
            None => {
                eprintln!(
                    "{}",
                    format_unknown_value_error("config key", key, VALID_CONFIG_KEYS)
                );
                ExitCode::from(EXIT_USAGE)
            }
        });
    }

    match output_format(cli, config)? {
        OutputFormat::Text => {
            let source = cli
                .config
                .clone()
                .or_else(Config::user_config_path)
                .filter(|p| p.exists())
                .map_or_else(|| "built-in defaults".to_string(), |p| p.display().to_string());
            println!("# Effective configuration (file: {source})");
            print!("{}", toml::to_string_pretty(config)?);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string(config)?),
        OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(config)?),
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_completions(args: &CompletionsArgs) {
    let mut cmd = Cli::command();
    generate(args.shell, &mut cmd, "milvus-smoke", &mut io::stdout());
}
