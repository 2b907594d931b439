//! Configuration and constants for the converter.

/// Attributes that identify the process (rank) of a snapshot record.
/// Checked in order; the first one present wins.
pub const PID_ATTRIBUTES: &[&str] = &["mpi.rank"];

/// Attributes that identify the thread of a snapshot record.
pub const TID_ATTRIBUTES: &[&str] = &["omp.thread.id", "pthread.id"];

/// Recognized timestamp attributes with their to-microseconds scale.
/// TraceEvent timestamps are microseconds; Caliper's GPU and ns-resolution
/// timers report nanoseconds, time.offset is already in microseconds.
pub const TIMESTAMP_ATTRIBUTES: &[(&str, f64)] = &[
    ("cupti.timestamp", 1e-3),
    ("rocm.host.timestamp", 1e-3),
    ("time.offset.ns", 1e-3),
    ("time.offset", 1.0),
    ("gputrace.timestamp", 1e-3),
];

// Region event markers written by the Caliper event service.
pub const EVENT_BEGIN_PREFIX: &str = "event.begin#";
pub const EVENT_END_PREFIX: &str = "event.end#";

// CUDA activity records (cupti service).
pub const CUPTI_ACTIVITY_KIND: &str = "cupti.activity.kind";
pub const CUPTI_ACTIVITY_START: &str = "cupti.activity.start";
pub const CUPTI_ACTIVITY_DURATION: &str = "cupti.activity.duration";
pub const CUPTI_KERNEL_NAME: &str = "cupti.kernel.name";
pub const CUPTI_LANE: &str = "cuda";

// ROCm activity records (roctracer service).
pub const ROCM_ACTIVITY_KIND: &str = "rocm.activity";
pub const ROCM_ACTIVITY_START: &str = "rocm.starttime";
pub const ROCM_ACTIVITY_DURATION: &str = "rocm.activity.duration";
pub const ROCM_KERNEL_NAME: &str = "rocm.kernel.name";
pub const ROCM_LANE: &str = "rocm";

// Allocator statistics records (umpire service).
pub const UMPIRE_ALLOC_NAME: &str = "umpire.alloc.name";
pub const UMPIRE_ALLOC_CURRENT_SIZE: &str = "umpire.alloc.current.size";
pub const UMPIRE_ALLOC_HIGHWATERMARK: &str = "umpire.alloc.highwatermark";

// Call-stack sample records (sampler + symbollookup services).
pub const SAMPLER_PC: &str = "cali.sampler.pc";
pub const SAMPLE_CALLPATH: &str = "source.function#callpath.address";
pub const SAMPLE_FUNCTION: &str = "source.function#cali.sampler.pc";
pub const SAMPLE_CPU: &str = "cpuinfo.cpu";
pub const SAMPLE_CATEGORY: &str = "callstack";

// GPU trace block records.
pub const GPUTRACE_BEGIN: &str = "gputrace.begin";
pub const GPUTRACE_END: &str = "gputrace.end";
pub const GPUTRACE_BLOCK: &str = "gputrace.block";
pub const GPUTRACE_REGION: &str = "gputrace.region";
pub const GPUTRACE_CATEGORY: &str = "gpu";

/// Timestamp synchronization marker attribute.
pub const TS_SYNC: &str = "ts.sync";
