//! Post-hoc alignment of independently-started process clocks.
//!
//! Each process may carry a synchronization marker holding its
//! reference timestamp. After a full conversion pass, every process's
//! events are shifted forward by the difference between the latest
//! reference timestamp seen and its own, so events that happened
//! earlier in real time do not appear to precede synchronization.

use std::collections::HashMap;

use crate::output::schema::{SampleEvent, TraceEvent};

/// Align event timestamps across processes.
///
/// Processes without a recorded reference timestamp keep an implicit
/// adjustment of zero. The reference timestamps themselves are advanced
/// to the common maximum, which makes the pass idempotent: a second run
/// computes all-equal references and adjusts nothing.
pub fn sync_timestamps(
    events: &mut [TraceEvent],
    samples: &mut [SampleEvent],
    tsync: &mut HashMap<i64, f64>,
) {
    if tsync.is_empty() {
        return;
    }

    let max_ts = tsync.values().copied().fold(f64::NEG_INFINITY, f64::max);
    let adjustments: HashMap<i64, f64> = tsync
        .iter()
        .map(|(&pid, &reference)| (pid, max_ts - reference))
        .collect();

    for event in events.iter_mut() {
        if let Some(adjustment) = adjustments.get(&event.pid) {
            event.ts += adjustment;
        }
    }

    for sample in samples.iter_mut() {
        if let Some(adjustment) = adjustments.get(&sample.pid) {
            sample.ts += adjustment;
        }
    }

    for reference in tsync.values_mut() {
        *reference = max_ts;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::schema::ThreadId;

    fn event(pid: i64, ts: f64) -> TraceEvent {
        TraceEvent::complete("r".to_string(), "region".to_string(), ts, 1.0, pid, ThreadId::Id(0))
    }

    #[test]
    fn test_aligns_to_latest_reference() {
        let mut events = vec![event(0, 100.0), event(1, 100.0), event(2, 100.0)];
        let mut samples = Vec::new();
        let mut tsync = HashMap::from([(0, 50.0), (1, 80.0)]);

        sync_timestamps(&mut events, &mut samples, &mut tsync);

        assert_eq!(events[0].ts, 130.0); // +30
        assert_eq!(events[1].ts, 100.0); // reference process
        assert_eq!(events[2].ts, 100.0); // no marker, no adjustment
    }

    #[test]
    fn test_second_pass_changes_nothing() {
        let mut events = vec![event(0, 100.0), event(1, 100.0)];
        let mut samples = Vec::new();
        let mut tsync = HashMap::from([(0, 50.0), (1, 80.0)]);

        sync_timestamps(&mut events, &mut samples, &mut tsync);
        let snapshot = events.clone();

        sync_timestamps(&mut events, &mut samples, &mut tsync);
        assert_eq!(events, snapshot);
    }

    #[test]
    fn test_noop_without_references() {
        let mut events = vec![event(0, 100.0)];
        let mut samples = Vec::new();
        let mut tsync = HashMap::new();

        sync_timestamps(&mut events, &mut samples, &mut tsync);
        assert_eq!(events[0].ts, 100.0);
    }
}
