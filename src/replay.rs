//! Drive a profiler from a recorded trace.
//!
//! The replay acts as the host runtime: its clock and heap probe report the
//! trace's timestamps and heap sizes, and its collector releases pending
//! cycle sentinels whenever the trace records a `gc` line.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use hookprof_runtime::{
    Collector, CycleSentinel, HookEvent, ManualHook, Profiler, ProfilerConfig,
};

use crate::trace::{TraceEntry, TraceEvent};

/// Holds sentinels until the trace reports a collection.
#[derive(Default)]
struct TraceCollector {
    pending: RefCell<Vec<CycleSentinel>>,
}

impl TraceCollector {
    fn complete_cycle(&self) {
        let due = std::mem::take(&mut *self.pending.borrow_mut());
        drop(due);
    }
}

impl Collector for TraceCollector {
    fn defer_until_collected(&self, sentinel: CycleSentinel) {
        self.pending.borrow_mut().push(sentinel);
    }
}

pub struct Replay {
    time: Rc<Cell<f64>>,
    heap: Rc<Cell<f64>>,
    collector: Rc<TraceCollector>,
    profiler: Profiler,
}

impl Replay {
    /// A profiler wired to the replay host. The session is not started.
    pub fn new(config: ProfilerConfig) -> Self {
        let time = Rc::new(Cell::new(0.0));
        let heap = Rc::new(Cell::new(0.0));
        let collector = Rc::new(TraceCollector::default());

        let h = Rc::clone(&heap);
        let mut profiler = Profiler::new(config, ManualHook, Rc::new(move || h.get()))
            .with_collector(Rc::clone(&collector) as Rc<dyn Collector>);
        let t = Rc::clone(&time);
        profiler.set_clock(move || t.get());

        Self {
            time,
            heap,
            collector,
            profiler,
        }
    }

    fn advance(&self, entry: &TraceEntry) {
        self.time.set(entry.t);
        if let Some(kb) = entry.heap_kb {
            self.heap.set(kb);
        }
    }

    /// Start the session at `first`'s time and heap.
    pub fn start(&mut self, first: Option<&TraceEntry>) {
        if let Some(entry) = first {
            self.advance(entry);
        }
        self.profiler.start();
    }

    pub fn feed(&mut self, entry: &TraceEntry) -> hookprof_runtime::Result<()> {
        self.advance(entry);
        match &entry.event {
            TraceEvent::Call(frame) => self.profiler.dispatch(&HookEvent::call(frame.frame())),
            TraceEvent::Return(frame) => self.profiler.dispatch(&HookEvent::ret(frame.frame())),
            TraceEvent::TailCall { frame, caller } => self.profiler.dispatch(&HookEvent::tail_call(
                frame.frame(),
                caller.as_ref().map(|c| c.frame()),
            )),
            TraceEvent::Gc => {
                self.collector.complete_cycle();
                Ok(())
            }
        }
    }

    /// Stop the session and hand back the profiler for reporting.
    pub fn finish(mut self) -> hookprof_runtime::Result<Profiler> {
        self.profiler.stop()?;
        Ok(self.profiler)
    }
}

/// Replay every entry in one session.
pub fn replay(entries: &[TraceEntry], config: ProfilerConfig) -> hookprof_runtime::Result<Profiler> {
    let mut session = Replay::new(config);
    session.start(entries.first());
    for entry in entries {
        session.feed(entry)?;
    }
    log::debug!("replayed {} trace events", entries.len());
    session.finish()
}
