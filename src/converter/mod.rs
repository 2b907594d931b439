//! Conversion of snapshot records into TraceEvent output.
//!
//! This module transforms the decoded record stream into:
//! - Region spans matched through per-location begin/end stacks
//! - Counter and call-stack sample events
//! - GPU activity intervals
//! - A shared, interned stack-frame table

pub mod pipeline;
pub mod stackframes;
pub mod timesync;

// Re-export main types and functions
pub use pipeline::{ConvertSummary, ConverterConfig, TraceEventConverter};
pub use stackframes::StackFrames;
pub use timesync::sync_timestamps;
