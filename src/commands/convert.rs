//! Convert command implementation.
//!
//! The convert command:
//! 1. Decodes each input .cali file with its own metadata tree
//! 2. Reconstructs spans, counters and samples in one shared converter
//! 3. Runs the timestamp synchronization pass over the union
//! 4. Writes the TraceEvent JSON document
//! 5. Reports a summary on stderr

use anyhow::{bail, Context, Result};
use log::{debug, info};
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use std::time::Instant;

use crate::converter::{ConverterConfig, TraceEventConverter};
use crate::output::{write_trace, write_trace_compact, write_trace_to};

/// Arguments for the convert command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone, Default)]
pub struct ConvertArgs {
    /// Input .cali files, converted in the given order
    pub inputs: Vec<PathBuf>,

    /// Output path for the JSON document (None = standard output)
    pub output: Option<PathBuf>,

    /// Pretty-print the JSON output
    pub pretty: bool,

    /// Attributes to export as standalone counter series
    pub counters: Vec<String>,

    /// Extra process-id attributes, tried before the built-ins
    pub pid_attributes: Vec<String>,

    /// Extra thread-id attributes, tried before the built-ins
    pub tid_attributes: Vec<String>,

    /// Run the timestamp synchronization pass
    pub sync: bool,
}

/// Validate convert arguments before doing any work
///
/// **Public** - called from main.rs
pub fn validate_args(args: &ConvertArgs) -> Result<()> {
    if args.inputs.is_empty() {
        bail!("no input files given");
    }

    for input in &args.inputs {
        if !input.exists() {
            bail!("input file not found: {}", input.display());
        }
    }

    Ok(())
}

/// Execute the convert command
///
/// **Public** - main entry point called from main.rs
///
/// # Errors
/// * Input files that fail to open or decode
/// * End markers without a matching begin (corrupt input)
/// * Output write failures
pub fn execute_convert(args: ConvertArgs) -> Result<()> {
    let start_time = Instant::now();

    let defaults = ConverterConfig::default();
    let config = ConverterConfig {
        // user-supplied id attributes take precedence over the built-ins
        pid_attributes: args
            .pid_attributes
            .iter()
            .cloned()
            .chain(defaults.pid_attributes)
            .collect(),
        tid_attributes: args
            .tid_attributes
            .iter()
            .cloned()
            .chain(defaults.tid_attributes)
            .collect(),
        counter_attributes: args.counters.clone(),
    };

    let mut converter = TraceEventConverter::new(config);

    info!("Step 1/3: Decoding {} input file(s)...", args.inputs.len());
    for input in &args.inputs {
        debug!("Reading {}", input.display());

        let file = File::open(input)
            .with_context(|| format!("Failed to open {}", input.display()))?;
        converter
            .read(BufReader::new(file))
            .with_context(|| format!("Failed to convert {}", input.display()))?;
    }

    if args.sync {
        info!("Step 2/3: Synchronizing timestamps...");
        converter.sync();
    } else {
        info!("Step 2/3: Skipping timestamp synchronization (disabled)");
    }

    let summary = converter.summary();
    let document = converter.into_document();

    debug!("Record counts by kind: {:?}", summary.num_records);
    if !summary.counters.is_empty() {
        debug!("Counter series: {}", summary.counters.join(", "));
    }

    info!("Step 3/3: Writing output...");
    match &args.output {
        Some(path) => {
            let result = if args.pretty {
                write_trace(&document, path)
            } else {
                write_trace_compact(&document, path)
            };
            result.with_context(|| format!("Failed to write {}", path.display()))?;
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            write_trace_to(&document, &mut lock, args.pretty)
                .context("Failed to write to standard output")?;
            writeln!(lock).context("Failed to write to standard output")?;
        }
    }

    info!("Conversion completed in {:.2?}", start_time.elapsed());

    eprintln!("{} records written, {} skipped.", summary.written, summary.skipped);

    Ok(())
}
