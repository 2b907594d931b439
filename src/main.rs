//! Cali Trace CLI
//!
//! Converts Caliper .cali performance traces into Google TraceEvent
//! JSON for Chrome tracing, Perfetto and compatible viewers.

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

use cali_trace::commands::{execute_convert, execute_info, validate_args, ConvertArgs};

/// Cali Trace - TraceEvent conversion for Caliper snapshots
#[derive(Parser, Debug)]
#[command(name = "cali2trace")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert .cali trace files to TraceEvent JSON
    Convert {
        /// Input .cali files, converted in the given order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output path for the JSON document (default: standard output)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,

        /// Attributes to export as standalone counter series
        #[arg(long, value_delimiter = ',')]
        counters: Vec<String>,

        /// Extra process-id attribute, tried before the built-ins
        #[arg(long = "pid-attribute")]
        pid_attributes: Vec<String>,

        /// Extra thread-id attribute, tried before the built-ins
        #[arg(long = "tid-attribute")]
        tid_attributes: Vec<String>,

        /// Skip the timestamp synchronization pass
        #[arg(long)]
        no_sync: bool,
    },

    /// Display globals and attributes of a .cali file
    Info {
        /// Path to the .cali file
        file: PathBuf,

        /// List the attribute keys as well
        #[arg(long)]
        attributes: bool,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging; env_logger writes to stderr, so info logging does
    // not interfere with JSON output on stdout
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    // Execute command
    match cli.command {
        Commands::Convert {
            inputs,
            output,
            pretty,
            counters,
            pid_attributes,
            tid_attributes,
            no_sync,
        } => {
            let args = ConvertArgs {
                inputs,
                output,
                pretty,
                counters,
                pid_attributes,
                tid_attributes,
                sync: !no_sync,
            };

            // Validate args first
            validate_args(&args)?;

            // Execute conversion
            execute_convert(args)?;
        }

        Commands::Info { file, attributes } => {
            execute_info(file, attributes)?;
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}

/// Display version information
///
/// **Private** - internal command implementation
fn display_version() {
    println!("Cali Trace v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Converts Caliper .cali traces to Google TraceEvent JSON.");
}
