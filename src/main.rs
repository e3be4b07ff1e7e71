//! Fanout - process-per-task parallel runner
//!
//! Command-line entry point. The same binary doubles as the worker: when
//! launched by the runner it serves one task from the built-in registry and
//! exits before any argument parsing happens.

mod cli;

use std::path::Path;

use clap::Parser;
use serde::Serialize;
use tracing::{debug, info};

use fanout::config::{self, FanoutConfig};
use fanout::error::{Error, Result};
use fanout::tasks::{builtin_registry, TaskRegistry};
use fanout::types::load_task_list;
use fanout::{logging, serve_if_worker, version, RunnerConfig, TaskRunner};

use crate::cli::{Cli, Commands};

fn main() {
    let registry = builtin_registry();

    // Workers are launched without arguments; serve before clap sees argv
    if let Some(served) = serve_if_worker(&registry) {
        if let Err(e) = served {
            exit_with(e);
        }
        return;
    }

    let cli = Cli::parse();
    if let Err(e) = run(cli, &registry) {
        exit_with(e);
    }
}

fn exit_with(e: Error) -> ! {
    eprint!("{}", e.format_for_terminal());
    std::process::exit(e.exit_code());
}

fn run(cli: Cli, registry: &TaskRegistry) -> Result<()> {
    match cli.command {
        Commands::Version => {
            version::print_version();
            Ok(())
        }
        Commands::Tasks => {
            print_tasks(registry);
            Ok(())
        }
        Commands::Config { subcommand } => {
            // Config commands use minimal logging
            logging::init_simple(tracing::Level::WARN)?;
            handle_config_command(subcommand)
        }
        Commands::Run {
            config,
            timeout_ms,
            report,
            pretty,
            tasks,
        } => {
            let mut config = FanoutConfig::load(config.as_deref())?;
            if let Some(ms) = timeout_ms {
                config.runner.task_timeout_ms = ms;
            }

            // The guards must be kept alive until the run finishes
            let _log_guards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;

            let build = version::build_info();
            debug!(
                version = %build.full_version(),
                target = %build.target,
                "Starting fanout"
            );

            run_tasks(&config, &tasks, report, pretty)
        }
    }
}

/// Run a task file and print the results on stdout
fn run_tasks(config: &FanoutConfig, tasks_path: &Path, report: bool, pretty: bool) -> Result<()> {
    let tasks = load_task_list(tasks_path)?;
    let runner = TaskRunner::new(RunnerConfig::from_settings(&config.runner)?);
    info!(
        tasks = tasks.len(),
        worker = %runner.config().worker.program.display(),
        "Task list loaded"
    );

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Runtime(e.to_string()))?;
    let run_report = rt.block_on(runner.run_all_with_report(tasks))?;

    if report {
        println!("{}", to_json(&run_report, pretty)?);
    } else {
        println!("{}", to_json(&run_report.results, pretty)?);
    }
    Ok(())
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let encoded = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(encoded)
}

fn print_tasks(registry: &TaskRegistry) {
    let width = registry.names().iter().map(|n| n.len()).max().unwrap_or(0);
    for (name, description) in registry.descriptions() {
        println!("{:<width$}  {}", name, description, width = width);
    }
}

/// Handle configuration subcommands
fn handle_config_command(subcommand: cli::ConfigSubcommand) -> Result<()> {
    use cli::ConfigSubcommand;

    match subcommand {
        ConfigSubcommand::Show { config } => {
            let cfg = FanoutConfig::load(config.as_deref())?;
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
        ConfigSubcommand::Init { path, force } => {
            let created = config::init_config(path.as_deref(), force)?;
            println!("Created configuration file: {}", created.display());
        }
        ConfigSubcommand::Validate { config } => {
            FanoutConfig::load(config.as_deref())?;
            println!("Configuration is valid.");
        }
    }

    Ok(())
}
