//! Decoding of Caliper .cali snapshot streams.
//!
//! This module handles:
//! - Lexing the escaped line-oriented wire format
//! - Maintaining the metadata tree and attribute registry
//! - Expanding snapshot records into flat attribute maps

pub mod metadata;
pub mod record;
pub mod stream;

// Re-export main types
pub use metadata::{Attribute, AttributeScope, MetadataDb, Node};
pub use record::{Record, RecordValue};
pub use stream::CaliperStreamReader;

use std::io::BufRead;

use crate::utils::error::ReaderError;

/// Reads a .cali stream and collects its contents.
///
/// Buffering counterpart of [`CaliperStreamReader`]: snapshot records
/// are collected into [`CaliperReader::records`] instead of being fed
/// to a callback. Each reader should read a single source.
#[derive(Debug, Default)]
pub struct CaliperReader {
    reader: CaliperStreamReader,
    /// The snapshot records read from the stream, in file order.
    pub records: Vec<Record>,
}

impl CaliperReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a .cali stream, collecting every snapshot record.
    pub fn read<R: BufRead>(&mut self, input: R) -> Result<(), ReaderError> {
        let records = &mut self.records;
        self.reader.read(input, |record| {
            records.push(record);
            Ok::<(), ReaderError>(())
        })
    }

    /// The run-level global attributes of the stream.
    pub fn globals(&self) -> &Record {
        self.reader.globals()
    }

    /// Iterate over the attribute keys defined in the stream.
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.reader.attributes()
    }

    /// Look up an attribute key by name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.reader.attribute(name)
    }

    /// The number of records read, per record kind.
    pub fn num_records(&self) -> &std::collections::BTreeMap<String, u64> {
        self.reader.num_records()
    }
}

/// Read a .cali stream and return its snapshot records and globals.
pub fn read_caliper_contents<R: BufRead>(input: R) -> Result<(Vec<Record>, Record), ReaderError> {
    let mut reader = CaliperReader::new();
    reader.read(input)?;

    let globals = reader.globals().clone();
    Ok((reader.records, globals))
}

/// Read a .cali stream and return only its global attributes.
pub fn read_caliper_globals<R: BufRead>(input: R) -> Result<Record, ReaderError> {
    let mut reader = CaliperStreamReader::new();
    reader.read_globals(input)?;

    Ok(reader.globals().clone())
}
