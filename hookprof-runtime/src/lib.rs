//! Call-level profiler driven by a host runtime's call/return hook.
//!
//! The host reports every call, return and tail call through
//! [`Profiler::dispatch`]. The profiler keeps one [`StatRecord`] per
//! definition site (closures from the same site are merged), samples call
//! durations and net heap deltas, counts collector cycles, and renders a
//! ranked fixed-width report.
#![allow(unsafe_code)]

mod alloc;
mod clock;
mod config;
#[cfg(feature = "cpu-time")]
mod cpu_clock;
mod error;
mod gc;
mod host;
mod pool;
mod profiler;
mod record;
mod registry;
mod render;
mod results;
mod samples;

pub use alloc::{live_heap_bytes, live_heap_kb, AllocatorHeap, TrackingAllocator};
pub use clock::{Clock, WallClock};
pub use config::ProfilerConfig;
#[cfg(feature = "cpu-time")]
pub use cpu_clock::CpuClock;
pub use error::{Error, Result};
pub use gc::{Collector, CycleSentinel};
pub use host::{
    CallableId, EventKind, Frame, HeapProbe, HookControl, HookEvent, Location, ManualHook,
    SourceLocation,
};
pub use profiler::Profiler;
pub use record::StatRecord;
pub use render::{fit, render, Column, Field, GcSummary, DEFAULT_COLUMNS};
pub use results::{decimals_for, quantize, ResultRow, SortKey};
pub use samples::SampleStore;
