//! Hook dispatcher and session lifecycle.
//!
//! The host calls `Profiler::dispatch` synchronously from the monitored
//! program's own call path for every call, return and tail call. Each event
//! resolves to the statistics record of its definition (merging closures
//! that share a source location), closes that record's open call if there is
//! one, then either opens a new call, counts a completed one, or for a tail
//! call synthesizes the caller's return followed by the callee's call.
//!
//! Open calls are tracked per definition, not per stack frame. A recursive
//! call re-opens the same record, so only the innermost activation's time is
//! sampled and recursive self-time is undercounted.
//!
//! Only a first sighting allocates (a record from the pool, an owned source
//! location). The steady-state path does hash lookups, clock and heap reads,
//! and appends into fixed sample chunks.
//!
//! Memory is the live heap minus `ignored_kb`, the heap the profiler itself
//! grew while a call was open (sample spills, GC sentinels), so per-call
//! deltas never include the profiler's own bookkeeping.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use crate::clock::{Clock, SharedClock, WallClock};
use crate::config::ProfilerConfig;
use crate::error::Result;
use crate::gc::{Collector, GcTracker};
use crate::host::{CallableId, EventKind, HeapProbe, HookControl, HookEvent};
use crate::pool::RecordPool;
use crate::record::StatRecord;
use crate::registry::{Registry, Resolved};
use crate::render::{self, Column, GcSummary, DEFAULT_COLUMNS};
use crate::results::{self, ResultRow, SortKey};

pub struct Profiler {
    config: ProfilerConfig,
    hook: Box<dyn HookControl>,
    heap: Rc<dyn HeapProbe>,
    clock: SharedClock,
    ignored_kb: Rc<Cell<f64>>,
    registry: Registry,
    pool: RecordPool,
    /// The profiler's own callables; their events are dropped.
    internal: HashSet<CallableId>,
    gc: Option<GcTracker>,
    running: bool,
}

impl Profiler {
    pub fn new(
        config: ProfilerConfig,
        hook: impl HookControl + 'static,
        heap: Rc<dyn HeapProbe>,
    ) -> Self {
        let pool = RecordPool::new(config.pool_size, config.spill_chunk);
        log::debug!(
            "record pool warmed with {} records ({} samples per chunk)",
            config.pool_size,
            config.spill_chunk
        );
        Self {
            hook: Box::new(hook),
            heap,
            clock: Rc::new(RefCell::new(Box::new(WallClock::new()))),
            ignored_kb: Rc::new(Cell::new(0.0)),
            registry: Registry::new(),
            pool,
            internal: HashSet::new(),
            gc: None,
            running: false,
            config,
        }
    }

    /// Observe the host's collection cycles through `collector`.
    pub fn with_collector(mut self, collector: Rc<dyn Collector>) -> Self {
        let tracker = GcTracker::new(
            collector,
            Rc::clone(&self.clock),
            Rc::clone(&self.heap),
            Rc::clone(&self.ignored_kb),
            self.config.spill_chunk,
        );
        if self.running {
            tracker.arm();
        }
        self.gc = Some(tracker);
        self
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    /// Never record events for `id`. Hosts register the callables that
    /// expose the profiler's own API here.
    pub fn exclude(&mut self, id: CallableId) {
        self.internal.insert(id);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Replace the time source. Calls open at the moment of the switch are
    /// closed against the new clock, so switch between sessions.
    pub fn set_clock(&mut self, clock: impl Clock + 'static) {
        *self.clock.borrow_mut() = Box::new(clock);
    }

    pub fn now(&self) -> f64 {
        self.clock.borrow().now()
    }

    fn heap_kb(&self) -> f64 {
        self.heap.live_kb() - self.ignored_kb.get()
    }

    /// Install the hook and begin a session. Averages and samples from the
    /// previous session are dropped; counts and totals accumulate until
    /// `reset`.
    pub fn start(&mut self) {
        if self.running {
            log::warn!("profiler already running; reinstalling hook");
        } else {
            for record in self.registry.records_mut() {
                record.begin_session();
            }
        }
        self.hook.install();
        self.running = true;
        if let Some(gc) = &self.gc {
            gc.arm();
        }
        log::debug!("profiling session started");
    }

    /// Remove the hook, force-close every open call and compute averages.
    ///
    /// Force-closed calls contribute their time and memory so far but do not
    /// count as completed calls. Every record is finalized even if one
    /// fails; the first failure is returned.
    pub fn stop(&mut self) -> Result<()> {
        if !self.running {
            return Ok(());
        }
        self.hook.remove();
        self.running = false;
        if let Some(gc) = &self.gc {
            gc.disarm();
        }

        let now = self.now();
        let heap = self.heap_kb();
        let mut first_err = None;
        let mut forced = 0usize;
        for record in self.registry.records_mut() {
            if record.in_call() {
                forced += 1;
            }
            let result = record.close(now, heap).and_then(|_| record.finalize());
            if let Err(e) = result {
                first_err.get_or_insert(e);
            }
        }
        log::debug!(
            "profiling session stopped: {} definitions, {} open calls closed",
            self.registry.len(),
            forced
        );
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Discard every record, returning it to the pool, and clear GC history.
    pub fn reset(&mut self) {
        let definitions = self.registry.len();
        self.registry.release_all(&mut self.pool);
        self.ignored_kb.set(0.0);
        if let Some(gc) = &self.gc {
            gc.reset();
        }
        log::debug!("profiler reset: {definitions} records returned to pool");
    }

    /// Handle one hook event.
    ///
    /// Events for excluded or non-introspectable callables, and events
    /// arriving while no session is running, are ignored.
    pub fn dispatch(&mut self, event: &HookEvent<'_>) -> Result<()> {
        if !self.running {
            return Ok(());
        }
        let frame = event.frame;
        if self.internal.contains(&frame.id) {
            return Ok(());
        }
        let Some(location) = frame.location else {
            return Ok(());
        };

        let resolved = self.registry.resolve(frame.id, location, &mut self.pool);
        if let Resolved::Installed(_) = resolved {
            log::trace!(
                "new definition {}:{} ({})",
                location.unit,
                location.line,
                frame.name.unwrap_or("?")
            );
        }
        let slot = resolved.slot();

        let record = self.registry.get_mut(slot);
        if let Some(name) = frame.name {
            if record.label.as_deref() != Some(name) {
                record.label = Some(name.to_owned());
            }
        }

        if record.in_call() {
            // Clock before heap: the heap read is not part of the call.
            let now = self.clock.borrow().now();
            let mark = self.heap.live_kb();
            let heap = mark - self.ignored_kb.get();
            if record.close(now, heap)? {
                let grown = self.heap.live_kb() - mark;
                self.ignored_kb.set(self.ignored_kb.get() + grown);
            }
        }

        match event.kind {
            EventKind::TailCall => {
                if let Some(caller) = event.caller {
                    self.dispatch(&HookEvent::ret(caller))?;
                }
                self.dispatch(&HookEvent::call(frame))
            }
            EventKind::Call => {
                let heap = self.heap_kb();
                let now = self.clock.borrow().now();
                self.registry.get_mut(slot).open(now, heap);
                Ok(())
            }
            EventKind::Return => {
                self.registry.get_mut(slot).num_calls += 1;
                Ok(())
            }
        }
    }

    /// Ranked rows, filtered to called definitions and truncated to `limit`
    /// (the configured limit when `None`). Open calls are priced at the
    /// current time without being closed.
    pub fn results(&self, sort: SortKey, limit: Option<usize>) -> Vec<ResultRow> {
        results::rank(
            self.registry.records(),
            self.now(),
            sort,
            limit.unwrap_or(self.config.limit),
            self.config.precision,
        )
    }

    /// `results` rendered with the default columns.
    pub fn report(&self, sort: SortKey, limit: Option<usize>) -> Result<String> {
        self.report_with(DEFAULT_COLUMNS, sort, limit)
    }

    pub fn report_with(
        &self,
        columns: &[Column],
        sort: SortKey,
        limit: Option<usize>,
    ) -> Result<String> {
        let rows = self.results(sort, limit);
        let gc = match &self.gc {
            Some(gc) => {
                if let Some(e) = gc.take_failure() {
                    return Err(e);
                }
                match gc.cycles() {
                    cycles if cycles > 1 => Some(GcSummary {
                        cycles,
                        mean_interval: gc.mean_interval()?,
                    }),
                    _ => None,
                }
            }
            None => None,
        };
        let decimals = results::decimals_for(self.config.precision);
        Ok(render::render(&rows, columns, decimals, gc))
    }

    pub fn gc_cycles(&self) -> u64 {
        self.gc.as_ref().map_or(0, GcTracker::cycles)
    }

    /// Every merged definition seen since the last reset, in first-sighting
    /// order.
    pub fn records(&self) -> &[StatRecord] {
        self.registry.records()
    }

    pub fn record_for(&self, id: CallableId) -> Option<&StatRecord> {
        self.registry.lookup(id)
    }

    /// Distinct callables seen, counting every merged closure.
    pub fn identities(&self) -> usize {
        self.registry.identities()
    }

    /// Records waiting in the pool.
    pub fn pooled(&self) -> usize {
        self.pool.available()
    }
}

impl Drop for Profiler {
    fn drop(&mut self) {
        if self.running {
            self.hook.remove();
        }
    }
}
