//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for the fanout runner.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Fanout - run every task in its own process, all at once
///
/// Reads a JSON list of `{"task": NAME, "args": ARGS}` objects, starts one
/// worker process per entry and prints the results in submission order.
/// A failed task yields `[]` in its slot.
#[derive(Parser, Debug)]
#[command(name = "fanout")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a batch of tasks in parallel worker processes
    Run {
        /// Path to configuration file
        #[arg(short, long, env = "FANOUT_CONFIG")]
        config: Option<String>,

        /// Kill any task that runs longer than this many milliseconds
        #[arg(short, long)]
        timeout_ms: Option<u64>,

        /// Print the full run report instead of the bare result list
        #[arg(short, long)]
        report: bool,

        /// Pretty-print JSON output
        #[arg(short, long)]
        pretty: bool,

        /// JSON file holding the task list, or `-` for stdin
        tasks: PathBuf,
    },

    /// List the tasks this binary can run
    Tasks,

    /// Display version and build information
    Version,

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the current configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}
