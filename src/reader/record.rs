//! Line lexer and record value types for the .cali wire format.
//!
//! A .cali file carries one record per line as comma-separated field
//! groups, each group a field tag followed by `=`-separated values:
//!
//! ```text
//! __rec=node,id=21,attr=20,data=main,parent=0
//! ```
//!
//! `\` escapes the next character so commas, equals signs and newlines
//! can appear inside values; `\n` decodes to a literal newline.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::utils::error::ReaderError;

/// One lexed line: field tag -> ordered list of decoded value tokens.
///
/// **Public** - intermediate representation between the lexer and the
/// stream reader; most callers never see it.
pub type RawRecord = HashMap<String, Vec<String>>;

/// A single value in a flattened snapshot record.
///
/// Values are scalars unless the same attribute occurs at multiple
/// depths of a node's ancestor chain, in which case the expansion
/// collects them into a list, oldest ancestor first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordValue {
    Scalar(String),
    List(Vec<String>),
}

impl RecordValue {
    /// Return the scalar form of this value, if it is one.
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            RecordValue::Scalar(s) => Some(s),
            RecordValue::List(_) => None,
        }
    }

    /// Return the value as a slice of items, scalar or list alike.
    pub fn items(&self) -> &[String] {
        match self {
            RecordValue::Scalar(s) => std::slice::from_ref(s),
            RecordValue::List(v) => v,
        }
    }
}

impl From<Vec<String>> for RecordValue {
    fn from(mut values: Vec<String>) -> Self {
        if values.len() == 1 {
            RecordValue::Scalar(values.remove(0))
        } else {
            RecordValue::List(values)
        }
    }
}

/// A flattened snapshot record: attribute name -> value(s).
///
/// Produced by expanding tree references plus inline pairs; consumed
/// by the trace reconstruction pipeline or collected by the buffering
/// reader. BTreeMap keeps iteration and serialization deterministic.
pub type Record = BTreeMap<String, RecordValue>;

/// Lex one line of a .cali file into a raw record.
///
/// **Public** - entry point for the lexer
///
/// # Errors
/// * `ReaderError::InvalidRecord` - a field group has an empty tag
///
/// The returned error carries line number 0; the stream reader stamps
/// the real line before surfacing it.
pub fn parse_record(line: &str) -> Result<RawRecord, ReaderError> {
    let mut record = RawRecord::new();

    let mut tag: Option<String> = None;
    let mut values: Vec<String> = Vec::new();
    let mut token = String::new();
    let mut escaped = false;

    let mut flush_group =
        |tag: &mut Option<String>, values: &mut Vec<String>, token: &mut String| {
            match tag.take() {
                Some(t) => {
                    values.push(std::mem::take(token));
                    record.insert(t, std::mem::take(values));
                }
                None if !token.is_empty() => {
                    // A group without '=' is a tag with an empty value list.
                    record.insert(std::mem::take(token), Vec::new());
                }
                None => {}
            }
        };

    for c in line.chars() {
        if escaped {
            token.push(if c == 'n' { '\n' } else { c });
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '=' {
            if tag.is_none() {
                if token.is_empty() {
                    return Err(ReaderError::InvalidRecord {
                        line: 0,
                        reason: "empty field tag".to_string(),
                    });
                }
                tag = Some(std::mem::take(&mut token));
            } else {
                values.push(std::mem::take(&mut token));
            }
        } else if c == ',' {
            flush_group(&mut tag, &mut values, &mut token);
        } else {
            token.push(c);
        }
    }

    flush_group(&mut tag, &mut values, &mut token);

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_node_record() {
        let rec = parse_record("__rec=node,id=21,attr=20,data=main,parent=0").unwrap();

        assert_eq!(rec["__rec"], vec!["node"]);
        assert_eq!(rec["id"], vec!["21"]);
        assert_eq!(rec["data"], vec!["main"]);
        assert_eq!(rec["parent"], vec!["0"]);
    }

    #[test]
    fn test_parse_value_list() {
        let rec = parse_record("__rec=ctx,ref=41=40=39,attr=7=12,data=42=23").unwrap();

        assert_eq!(rec["ref"], vec!["41", "40", "39"]);
        assert_eq!(rec["attr"], vec!["7", "12"]);
        assert_eq!(rec["data"], vec!["42", "23"]);
    }

    #[test]
    fn test_parse_escapes() {
        let rec = parse_record(r"__rec=ctx,data=a\,b\=c\\d\ne").unwrap();

        assert_eq!(rec["data"], vec!["a,b=c\\d\ne"]);
    }

    #[test]
    fn test_parse_empty_value() {
        let rec = parse_record("__rec=globals,data=").unwrap();

        assert_eq!(rec["data"], vec![""]);
    }

    #[test]
    fn test_parse_tag_without_values() {
        let rec = parse_record("flag,__rec=ctx").unwrap();

        assert_eq!(rec["flag"], Vec::<String>::new());
        assert_eq!(rec["__rec"], vec!["ctx"]);
    }

    #[test]
    fn test_empty_tag_is_an_error() {
        assert!(parse_record("=oops").is_err());
    }
}
