//! Stream decoder for .cali data.
//!
//! Drives the line lexer over a buffered input, classifies each record,
//! feeds node definitions into the metadata tree and hands fully
//! expanded snapshot records to a caller-supplied consumer, in file
//! order. Decoding is strictly sequential and single-pass; the format
//! guarantees a node is defined before any later record references it.

use log::debug;
use std::collections::BTreeMap;
use std::io::BufRead;

use super::metadata::{Attribute, Expansion, MetadataDb};
use super::record::{parse_record, RawRecord, Record, RecordValue};
use crate::utils::error::ReaderError;

/// Reads a Caliper .cali data stream.
///
/// Use [`CaliperStreamReader::read`] to decode a stream and process
/// snapshot records through a callback. After reading, run-level
/// metadata is available through [`CaliperStreamReader::globals`].
///
/// One reader holds the metadata tree for one decoding session; decode
/// each input source with a fresh instance.
#[derive(Debug, Default)]
pub struct CaliperStreamReader {
    db: MetadataDb,
    globals: Record,
    num_records: BTreeMap<String, u64>,
}

impl CaliperStreamReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a .cali stream, forwarding each snapshot record to `consumer`.
    ///
    /// **Public** - main decoding entry point
    ///
    /// The consumer may fail with any error type convertible from
    /// [`ReaderError`]; decode errors and consumer errors alike abort
    /// the current source.
    ///
    /// # Errors
    /// * `ReaderError::MissingRecordKind` - a line without a `__rec` field
    /// * `ReaderError::UnknownRecordKind` - a `__rec` value that is not
    ///   `node`, `ctx` or `globals`
    /// * `ReaderError::InvalidRecord` - a malformed field
    /// * `ReaderError::UnknownNode` - a reference to an undefined node id
    pub fn read<R, F, E>(&mut self, input: R, consumer: F) -> Result<(), E>
    where
        R: BufRead,
        F: FnMut(Record) -> Result<(), E>,
        E: From<ReaderError>,
    {
        self.read_impl(input, Some(consumer))
    }

    /// Decode a .cali stream for its run-level metadata only.
    ///
    /// Snapshot records are classified but not expanded, which makes this
    /// considerably cheaper than [`CaliperStreamReader::read`] when only
    /// the globals are of interest.
    pub fn read_globals<R: BufRead>(&mut self, input: R) -> Result<(), ReaderError> {
        self.read_impl::<_, fn(Record) -> Result<(), ReaderError>, _>(input, None)
    }

    fn read_impl<R, F, E>(&mut self, input: R, mut consumer: Option<F>) -> Result<(), E>
    where
        R: BufRead,
        F: FnMut(Record) -> Result<(), E>,
        E: From<ReaderError>,
    {
        let mut line_no: u64 = 0;

        for line in input.lines() {
            line_no += 1;
            let line = line.map_err(|e| E::from(ReaderError::Io(e)))?;
            self.process_line(line.trim(), line_no, &mut consumer)?;
        }

        debug!("decoded {} record kinds: {:?}", self.num_records.len(), self.num_records);

        Ok(())
    }

    fn process_line<F, E>(
        &mut self,
        line: &str,
        line_no: u64,
        consumer: &mut Option<F>,
    ) -> Result<(), E>
    where
        F: FnMut(Record) -> Result<(), E>,
        E: From<ReaderError>,
    {
        let raw = parse_record(line).map_err(|e| E::from(e.at_line(line_no)))?;

        let kind = raw
            .get("__rec")
            .and_then(|v| v.first())
            .ok_or_else(|| E::from(ReaderError::MissingRecordKind { line: line_no }))?
            .clone();

        match kind.as_str() {
            "node" => self
                .process_node_record(&raw)
                .map_err(|e| E::from(e.at_line(line_no)))?,
            "ctx" => {
                if let Some(consumer) = consumer.as_mut() {
                    let record = self
                        .expand_record(&raw)
                        .map_err(|e| E::from(e.at_line(line_no)))?;
                    consumer(record)?;
                }
            }
            "globals" => {
                self.globals = self
                    .expand_record(&raw)
                    .map_err(|e| E::from(e.at_line(line_no)))?;
            }
            other => {
                return Err(E::from(ReaderError::UnknownRecordKind {
                    kind: other.to_string(),
                    line: line_no,
                }))
            }
        }

        *self.num_records.entry(kind).or_insert(0) += 1;

        Ok(())
    }

    fn process_node_record(&mut self, raw: &RawRecord) -> Result<(), ReaderError> {
        let id = parse_id(required_field(raw, "id")?)?;
        let attribute_id = parse_id(required_field(raw, "attr")?)?;
        let data = required_field(raw, "data")?.to_string();

        let parent = match raw.get("parent").and_then(|v| v.first()) {
            Some(p) => Some(parse_id(p)?),
            None => None,
        };

        self.db.import_node(id, attribute_id, data, parent);

        Ok(())
    }

    /// Assemble one snapshot record from tree references plus inline
    /// attribute/value pairs.
    ///
    /// Inline pairs carry the snapshot's own as-value entries; they
    /// replace any value of the same name coming from a tree reference.
    fn expand_record(&self, raw: &RawRecord) -> Result<Record, ReaderError> {
        let mut merged = Expansion::new();

        if let Some(refs) = raw.get("ref") {
            for node_id in refs {
                let id = parse_id(node_id)?;
                for (key, values) in self.db.expand(id)? {
                    merged.insert(key.clone(), values.clone());
                }
            }
        }

        if let (Some(attrs), Some(data)) = (raw.get("attr"), raw.get("data")) {
            let mut inline = Expansion::new();
            for (attr_id, value) in attrs.iter().zip(data.iter()) {
                let id = parse_id(attr_id)?;
                let (name, properties) = self.db.attribute_info(id)?;
                if properties & Attribute::HIDDEN != 0 {
                    continue;
                }
                inline.entry(name.to_string()).or_default().push(value.clone());
            }
            merged.extend(inline);
        }

        Ok(merged
            .into_iter()
            .map(|(key, values)| (key, RecordValue::from(values)))
            .collect())
    }

    /// The run-level global attributes of the decoded stream.
    pub fn globals(&self) -> &Record {
        &self.globals
    }

    /// The number of records read, per record kind.
    pub fn num_records(&self) -> &BTreeMap<String, u64> {
        &self.num_records
    }

    /// The decoded metadata tree.
    pub fn db(&self) -> &MetadataDb {
        &self.db
    }

    /// Iterate over the attribute keys defined in the stream.
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.db.attributes()
    }

    /// Look up an attribute key by name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.db.attribute(name)
    }
}

fn required_field<'a>(raw: &'a RawRecord, key: &str) -> Result<&'a str, ReaderError> {
    raw.get(key)
        .and_then(|v| v.first())
        .map(String::as_str)
        .ok_or_else(|| ReaderError::InvalidRecord {
            line: 0,
            reason: format!("missing '{}' field", key),
        })
}

fn parse_id(value: &str) -> Result<u64, ReaderError> {
    value.parse::<u64>().map_err(|_| ReaderError::InvalidRecord {
        line: 0,
        reason: format!("invalid node id '{}'", value),
    })
}
