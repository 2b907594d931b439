//! TraceEvent JSON schema definitions.
//!
//! This module defines the structure of the JSON document we write:
//! the Google TraceEvent format (`traceEvents`, `stackFrames`,
//! `samples`) as consumed by Chrome tracing, Perfetto and Speedscope,
//! plus decoded run-level metadata passed through as `otherData`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::reader::Record;

/// Complete event: one region span with start timestamp and duration.
pub const PHASE_COMPLETE: char = 'X';

/// Counter event: a named numeric series sample.
pub const PHASE_COUNTER: char = 'C';

/// A thread lane identifier.
///
/// Ordinary events carry numeric thread ids; GPU activity lanes and
/// gputrace blocks use synthesized names instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThreadId {
    Id(i64),
    Lane(String),
}

impl From<i64> for ThreadId {
    fn from(id: i64) -> Self {
        ThreadId::Id(id)
    }
}

impl From<String> for ThreadId {
    fn from(lane: String) -> Self {
        ThreadId::Lane(lane)
    }
}

/// One entry of the `traceEvents` array.
///
/// Timestamps and durations are in microseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub ph: char,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cat: Option<String>,

    pub ts: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dur: Option<f64>,

    pub pid: i64,

    pub tid: ThreadId,

    /// Stack frame id of the call path active at this event, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sf: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<BTreeMap<String, serde_json::Value>>,
}

impl TraceEvent {
    /// A complete ("X") event covering `[ts, ts + dur]`.
    pub fn complete(name: String, cat: String, ts: f64, dur: f64, pid: i64, tid: ThreadId) -> Self {
        Self {
            ph: PHASE_COMPLETE,
            name,
            cat: Some(cat),
            ts,
            dur: Some(dur),
            pid,
            tid,
            sf: None,
            args: None,
        }
    }

    /// A counter ("C") event reporting one value of a named series.
    pub fn counter(name: String, ts: f64, pid: i64, tid: ThreadId, series: &str, value: f64) -> Self {
        let mut args = BTreeMap::new();
        args.insert(series.to_string(), serde_json::json!(value));

        Self {
            ph: PHASE_COUNTER,
            name,
            cat: None,
            ts,
            dur: None,
            pid,
            tid,
            sf: None,
            args: Some(args),
        }
    }
}

/// One entry of the `samples` array: a call-stack sample taken at `ts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleEvent {
    pub name: String,

    pub ts: f64,

    pub pid: i64,

    pub tid: ThreadId,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sf: Option<usize>,

    pub weight: u64,
}

/// One entry of the `stackFrames` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackFrameEntry {
    pub category: String,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,
}

/// Top-level trace document written to JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceDocument {
    #[serde(rename = "traceEvents")]
    pub trace_events: Vec<TraceEvent>,

    /// Interned call-stack frames, keyed by stringified frame id
    #[serde(rename = "stackFrames", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stack_frames: BTreeMap<String, StackFrameEntry>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<SampleEvent>,

    /// Run-level global attributes decoded from the input
    #[serde(rename = "otherData", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub other_data: Record,
}
