//! Cali Trace
//!
//! Decodes Caliper .cali performance snapshots and converts them into
//! Google TraceEvent JSON for standard trace viewers.
//!
//! This crate provides the core implementation for the `cali2trace`
//! CLI tool.
//!
//! ## Getting Started
//!
//! Most users should install and use the CLI:
//!
//! ```bash
//! cargo install cali-trace
//! cali2trace convert trace.cali -o trace.json
//! ```

pub mod commands;
pub mod converter;
pub mod output;
pub mod reader;
pub mod utils;
