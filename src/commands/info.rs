//! Info command implementation.
//!
//! Reads a single .cali file and prints its run-level globals and,
//! on request, the attribute keys it defines.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use crate::reader::{Attribute, CaliperReader};

/// Execute the info command
///
/// **Public** - called from main.rs
pub fn execute_info(file_path: PathBuf, show_attributes: bool) -> Result<()> {
    println!("Reading: {}", file_path.display());

    let file = File::open(&file_path)
        .with_context(|| format!("Failed to open {}", file_path.display()))?;

    let mut reader = CaliperReader::new();
    reader
        .read(BufReader::new(file))
        .with_context(|| format!("Failed to decode {}", file_path.display()))?;

    println!("✓ Valid .cali file");
    for (kind, count) in reader.num_records() {
        println!("  {} records: {}", kind, count);
    }

    if !reader.globals().is_empty() {
        println!();
        println!("Globals:");
        for (key, value) in reader.globals() {
            println!("  {:<32} {}", key, value.items().join(", "));
        }
    }

    if show_attributes {
        println!();
        println!("Attributes:");

        let mut attributes: Vec<&Attribute> = reader.attributes().collect();
        attributes.sort_by(|a, b| a.name().cmp(b.name()));

        for attr in attributes {
            println!(
                "  {:<44} type={:<8} scope={:<8} {}",
                attr.name(),
                attr.attribute_type(),
                attr.scope(),
                property_flags(attr)
            );
        }
    }

    Ok(())
}

/// Short human-readable summary of an attribute's property flags
///
/// **Private** - internal formatting helper
fn property_flags(attr: &Attribute) -> String {
    let mut flags = Vec::new();

    if attr.is_value() {
        flags.push("value");
    }
    if attr.is_nested() {
        flags.push("nested");
    }
    if attr.is_hidden() {
        flags.push("hidden");
    }
    if attr.is_global() {
        flags.push("global");
    }
    if attr.is_aggregatable() {
        flags.push("aggregatable");
    }

    flags.join(",")
}
