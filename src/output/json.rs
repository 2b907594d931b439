//! JSON trace document writer.
//!
//! Writes TraceDocument structs to a file or any output stream,
//! pretty-printed or compact.

use log::{debug, info};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::schema::TraceDocument;
use crate::utils::error::OutputError;

/// Write a trace document to a JSON file, pretty-printed.
///
/// **Public** - main entry point for file output
///
/// # Errors
/// * `OutputError::WriteFailed` - I/O error during write
/// * `OutputError::SerializationFailed` - JSON serialization error
/// * `OutputError::InvalidPath` - path cannot be created or is invalid
pub fn write_trace(document: &TraceDocument, output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    write_trace_file(document, output_path.as_ref(), true)
}

/// Write a trace document to a JSON file without pretty-printing.
///
/// Compact output is preferred for large traces; trace viewers do not
/// care either way.
pub fn write_trace_compact(
    document: &TraceDocument,
    output_path: impl AsRef<Path>,
) -> Result<(), OutputError> {
    write_trace_file(document, output_path.as_ref(), false)
}

fn write_trace_file(
    document: &TraceDocument,
    output_path: &Path,
    pretty: bool,
) -> Result<(), OutputError> {
    info!("Writing trace to: {}", output_path.display());

    validate_output_path(output_path)?;

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("Creating parent directories: {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|e| {
                OutputError::InvalidPath(format!(
                    "Cannot create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    let file = File::create(output_path).map_err(OutputError::WriteFailed)?;
    let mut writer = BufWriter::new(file);

    write_trace_to(document, &mut writer, pretty)?;
    writer.flush().map_err(OutputError::WriteFailed)?;

    debug!("Trace written successfully");

    Ok(())
}

/// Write a trace document to any output stream.
///
/// **Public** - used for the stdout default and by the file writers
pub fn write_trace_to<W: Write>(
    document: &TraceDocument,
    writer: W,
    pretty: bool,
) -> Result<(), OutputError> {
    if pretty {
        serde_json::to_writer_pretty(writer, document).map_err(OutputError::SerializationFailed)
    } else {
        serde_json::to_writer(writer, document).map_err(OutputError::SerializationFailed)
    }
}

/// Serialize a trace document to a JSON string.
pub fn trace_to_string(document: &TraceDocument, pretty: bool) -> Result<String, OutputError> {
    let json = if pretty {
        serde_json::to_string_pretty(document)?
    } else {
        serde_json::to_string(document)?
    };

    Ok(json)
}

/// Read a trace document back from a JSON file.
///
/// **Public** - used by tests and downstream tooling
pub fn read_trace(input_path: impl AsRef<Path>) -> Result<TraceDocument, OutputError> {
    let file = File::open(input_path.as_ref()).map_err(OutputError::ReadFailed)?;
    let document = serde_json::from_reader(std::io::BufReader::new(file))
        .map_err(OutputError::SerializationFailed)?;

    Ok(document)
}

fn validate_output_path(path: &Path) -> Result<(), OutputError> {
    if path.as_os_str().is_empty() {
        return Err(OutputError::InvalidPath("empty output path".to_string()));
    }
    if path.is_dir() {
        return Err(OutputError::InvalidPath(format!(
            "{} is a directory",
            path.display()
        )));
    }

    Ok(())
}
