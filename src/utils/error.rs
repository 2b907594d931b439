//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use thiserror::Error;

/// Errors that can occur while decoding a .cali stream
#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("line {line}: record is missing the '__rec' field")]
    MissingRecordKind { line: u64 },

    #[error("line {line}: unknown record kind '{kind}'")]
    UnknownRecordKind { kind: String, line: u64 },

    #[error("line {line}: invalid record: {reason}")]
    InvalidRecord { line: u64, reason: String },

    #[error("line {line}: reference to unknown node id {id}")]
    UnknownNode { id: u64, line: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReaderError {
    /// Attach a line number to an error raised below the line loop.
    ///
    /// Only the stream reader knows the current line, so it stamps
    /// errors coming out of the lexer and the metadata tree.
    pub(crate) fn at_line(self, line: u64) -> Self {
        match self {
            ReaderError::MissingRecordKind { .. } => ReaderError::MissingRecordKind { line },
            ReaderError::UnknownRecordKind { kind, .. } => {
                ReaderError::UnknownRecordKind { kind, line }
            }
            ReaderError::InvalidRecord { reason, .. } => ReaderError::InvalidRecord { line, reason },
            ReaderError::UnknownNode { id, .. } => ReaderError::UnknownNode { id, line },
            other => other,
        }
    }
}

/// Errors that can occur during trace event reconstruction
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error(transparent)]
    Reader(#[from] ReaderError),

    #[error("'{attribute}' end event without matching begin (pid {pid}, tid {tid})")]
    StackUnderflow {
        attribute: String,
        pid: i64,
        tid: String,
    },
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to read file: {0}")]
    ReadFailed(std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}
