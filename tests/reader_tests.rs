use pretty_assertions::assert_eq;
use std::io::Cursor;

use cali_trace::reader::record::{parse_record, RecordValue};
use cali_trace::reader::{read_caliper_contents, read_caliper_globals, CaliperReader, CaliperStreamReader};
use cali_trace::utils::error::ReaderError;

/// Encode a value for embedding in a .cali line.
fn escape(value: &str) -> String {
    let mut out = String::new();
    for c in value.chars() {
        match c {
            ',' => out.push_str("\\,"),
            '=' => out.push_str("\\="),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

fn read_records(input: &str) -> Vec<cali_trace::reader::Record> {
    let (records, _) = read_caliper_contents(Cursor::new(input)).unwrap();
    records
}

#[test]
fn test_escaping_round_trip() {
    let cases = [
        "plain",
        "with,comma",
        "key=value",
        "back\\slash",
        "multi\nline",
        "all,of=it\\to\ngether,,==",
    ];

    for original in cases {
        let line = format!("__rec=ctx,data={}", escape(original));
        let rec = parse_record(&line).unwrap();
        assert_eq!(rec["data"], vec![original.to_string()], "case: {:?}", original);
    }
}

#[test]
fn test_attribute_name_resolution_through_tree() {
    // A ctx record resolves its inline attribute id through the tree.
    let input = "\
__rec=node,id=20,attr=8,data=region
__rec=node,id=21,attr=20,data=main,parent=0
__rec=ctx,ref=21,attr=20,data=main
";

    let records = read_records(input);

    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].get("region"),
        Some(&RecordValue::Scalar("main".to_string()))
    );
}

#[test]
fn test_list_on_repeat_and_path_synthesis() {
    // "region" is declared nested (prop 276); values at two depths
    // collect into a list, oldest ancestor first, and feed "path".
    let input = "\
__rec=node,id=12,attr=10,data=276,parent=3
__rec=node,id=13,attr=8,data=region,parent=12
__rec=node,id=14,attr=13,data=main
__rec=node,id=15,attr=13,data=loop,parent=14
__rec=ctx,ref=15
";

    let records = read_records(input);

    assert_eq!(records.len(), 1);
    let expected = RecordValue::List(vec!["main".to_string(), "loop".to_string()]);
    assert_eq!(records[0].get("region"), Some(&expected));
    assert_eq!(records[0].get("path"), Some(&expected));
}

#[test]
fn test_hidden_attributes_are_excluded() {
    // prop 128 = hidden
    let input = "\
__rec=node,id=12,attr=10,data=128,parent=3
__rec=node,id=13,attr=8,data=secret,parent=12
__rec=node,id=14,attr=8,data=visible,parent=3
__rec=node,id=15,attr=13,data=covert
__rec=node,id=16,attr=14,data=shown,parent=15
__rec=ctx,ref=16
";

    let records = read_records(input);

    assert_eq!(records.len(), 1);
    assert!(records[0].get("secret").is_none());
    assert_eq!(
        records[0].get("visible"),
        Some(&RecordValue::Scalar("shown".to_string()))
    );
}

#[test]
fn test_globals_record() {
    let input = "\
__rec=node,id=20,attr=8,data=cali.caliper.version,parent=3
__rec=node,id=21,attr=20,data=2.9.0
__rec=globals,ref=21
";

    let globals = read_caliper_globals(Cursor::new(input)).unwrap();

    assert_eq!(
        globals.get("cali.caliper.version"),
        Some(&RecordValue::Scalar("2.9.0".to_string()))
    );
}

#[test]
fn test_attribute_properties_from_stream() {
    let input = "\
__rec=node,id=12,attr=10,data=276,parent=3
__rec=node,id=13,attr=8,data=region,parent=12
__rec=node,id=14,attr=10,data=12,parent=5
__rec=node,id=15,attr=8,data=time.duration,parent=14
";

    let mut reader = CaliperReader::new();
    reader.read(Cursor::new(input)).unwrap();

    let region = reader.attribute("region").unwrap();
    assert!(region.is_nested());
    assert!(!region.is_hidden());
    assert_eq!(region.attribute_type(), "string");

    let duration = reader.attribute("time.duration").unwrap();
    assert!(!duration.is_nested());
    assert_eq!(duration.attribute_type(), "double");
    assert_eq!(duration.scope().to_string(), "process");
}

#[test]
fn test_attribute_metadata_lookup() {
    // "time.duration" is declared with an attribute.unit metadata entry
    // in its definition chain.
    let input = "\
__rec=node,id=30,attr=8,data=attribute.unit,parent=3
__rec=node,id=31,attr=30,data=sec,parent=5
__rec=node,id=32,attr=8,data=time.duration,parent=31
";

    let mut reader = CaliperStreamReader::new();
    reader.read_globals(Cursor::new(input)).unwrap();

    let attr = reader.attribute("time.duration").unwrap();
    assert_eq!(attr.get(reader.db(), "attribute.unit"), Some("sec"));
    assert_eq!(attr.get(reader.db(), "does.not.exist"), None);
    assert_eq!(attr.attribute_type(), "double");
}

#[test]
fn test_num_records_accounting() {
    let input = "\
__rec=node,id=20,attr=8,data=region,parent=3
__rec=node,id=21,attr=20,data=main
__rec=ctx,ref=21
__rec=ctx,ref=21
__rec=globals
";

    let mut reader = CaliperReader::new();
    reader.read(Cursor::new(input)).unwrap();

    assert_eq!(reader.num_records().get("node"), Some(&2));
    assert_eq!(reader.num_records().get("ctx"), Some(&2));
    assert_eq!(reader.num_records().get("globals"), Some(&1));
    assert_eq!(reader.records.len(), 2);
}

#[test]
fn test_missing_record_kind_is_an_error() {
    let mut reader = CaliperStreamReader::new();
    let err = reader.read_globals(Cursor::new("id=1,attr=8,data=x\n")).unwrap_err();

    match err {
        ReaderError::MissingRecordKind { line } => assert_eq!(line, 1),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_unknown_record_kind_is_an_error() {
    let mut reader = CaliperStreamReader::new();
    let err = reader
        .read_globals(Cursor::new("__rec=node,id=20,attr=8,data=x\n__rec=bogus\n"))
        .unwrap_err();

    match err {
        ReaderError::UnknownRecordKind { kind, line } => {
            assert_eq!(kind, "bogus");
            assert_eq!(line, 2);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_unknown_node_reference_is_an_error() {
    let err = read_caliper_contents(Cursor::new("__rec=ctx,ref=999\n")).unwrap_err();

    match err {
        ReaderError::UnknownNode { id, line } => {
            assert_eq!(id, 999);
            assert_eq!(line, 1);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_expansion_is_deterministic() {
    let input = "\
__rec=node,id=20,attr=8,data=region,parent=3
__rec=node,id=21,attr=20,data=main
__rec=node,id=22,attr=20,data=loop,parent=21
__rec=ctx,ref=22
__rec=ctx,ref=22
";

    let records = read_records(input);

    assert_eq!(records.len(), 2);
    assert_eq!(records[0], records[1]);
}
