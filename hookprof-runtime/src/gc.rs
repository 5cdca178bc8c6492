//! Garbage-collector cycle tracking through a self-renewing finalizer.
//!
//! The tracker hands the host's collector a `CycleSentinel`. The collector
//! drops it once its next cycle completes; the drop records the cycle and
//! the interval since the previous one, then arms a fresh sentinel, since a
//! finalizer only ever fires once. Sentinels hold a weak handle, so a
//! collector outliving the profiler just drops dead sentinels.
//!
//! Heap growth caused by the tracker's own bookkeeping is added to the
//! profiler's ignored-memory baseline so it never shows up in a profiled
//! function's memory delta.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::clock::SharedClock;
use crate::error::{Error, Result};
use crate::host::HeapProbe;
use crate::samples::SampleStore;

/// A runtime facility that runs finalizers after a collection cycle.
pub trait Collector {
    /// Keep `sentinel` alive until the next collection cycle completes, then
    /// drop it.
    fn defer_until_collected(&self, sentinel: CycleSentinel);
}

/// One-shot cycle observer. Dropping it counts as one completed cycle.
pub struct CycleSentinel {
    tracker: Weak<GcInner>,
}

impl Drop for CycleSentinel {
    fn drop(&mut self) {
        if let Some(inner) = self.tracker.upgrade() {
            fire(&inner);
        }
    }
}

impl std::fmt::Debug for CycleSentinel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CycleSentinel")
            .field("live", &(self.tracker.strong_count() > 0))
            .finish()
    }
}

struct GcState {
    cycles: u64,
    last_cycle_time: f64,
    intervals: SampleStore,
    armed: bool,
    /// A sentinel is currently held by the collector.
    pending: bool,
    failure: Option<Error>,
}

struct GcInner {
    state: RefCell<GcState>,
    collector: Rc<dyn Collector>,
    clock: SharedClock,
    heap: Rc<dyn HeapProbe>,
    ignored_kb: Rc<Cell<f64>>,
}

fn fire(inner: &Rc<GcInner>) {
    let mark = inner.heap.live_kb();
    let rearm = {
        let mut state = inner.state.borrow_mut();
        state.pending = false;
        if !state.armed {
            return;
        }
        let now = inner.clock.borrow().now();
        let interval = now - state.last_cycle_time;
        state.cycles += 1;
        state.last_cycle_time = now;
        if let Err(e) = state.intervals.record(interval) {
            log::warn!("gc interval sample lost: {e}");
            state.failure.get_or_insert(e);
        }
        state.pending = true;
        CycleSentinel {
            tracker: Rc::downgrade(inner),
        }
    };
    inner.collector.defer_until_collected(rearm);
    let used = inner.heap.live_kb() - mark;
    inner.ignored_kb.set(inner.ignored_kb.get() + used);
}

pub struct GcTracker {
    inner: Rc<GcInner>,
}

impl GcTracker {
    pub(crate) fn new(
        collector: Rc<dyn Collector>,
        clock: SharedClock,
        heap: Rc<dyn HeapProbe>,
        ignored_kb: Rc<Cell<f64>>,
        spill_chunk: usize,
    ) -> Self {
        let state = GcState {
            cycles: 0,
            last_cycle_time: 0.0,
            intervals: SampleStore::new(spill_chunk),
            armed: false,
            pending: false,
            failure: None,
        };
        Self {
            inner: Rc::new(GcInner {
                state: RefCell::new(state),
                collector,
                clock,
                heap,
                ignored_kb,
            }),
        }
    }

    /// Start counting cycles from now. Hands the collector a sentinel unless
    /// one is already outstanding.
    pub fn arm(&self) {
        let mark = self.inner.heap.live_kb();
        let sentinel = {
            let mut state = self.inner.state.borrow_mut();
            state.armed = true;
            state.last_cycle_time = self.inner.clock.borrow().now();
            if state.pending {
                None
            } else {
                state.pending = true;
                Some(CycleSentinel {
                    tracker: Rc::downgrade(&self.inner),
                })
            }
        };
        if let Some(sentinel) = sentinel {
            self.inner.collector.defer_until_collected(sentinel);
        }
        let used = self.inner.heap.live_kb() - mark;
        self.inner.ignored_kb.set(self.inner.ignored_kb.get() + used);
    }

    /// Stop counting. An outstanding sentinel fires silently and is not
    /// renewed.
    pub fn disarm(&self) {
        self.inner.state.borrow_mut().armed = false;
    }

    pub fn cycles(&self) -> u64 {
        self.inner.state.borrow().cycles
    }

    /// Mean time between observed cycles.
    pub fn mean_interval(&self) -> Result<f64> {
        self.inner.state.borrow_mut().intervals.average()
    }

    /// The first spill failure since the last call, if any. Sentinels fire
    /// from the collector, where an error has nowhere to go, so it is kept
    /// here until the next report.
    pub fn take_failure(&self) -> Option<Error> {
        self.inner.state.borrow_mut().failure.take()
    }

    pub fn reset(&self) {
        let mut state = self.inner.state.borrow_mut();
        state.cycles = 0;
        state.last_cycle_time = self.inner.clock.borrow().now();
        state.intervals.reopen();
        state.failure = None;
    }
}
