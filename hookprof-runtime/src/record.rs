use crate::error::Result;
use crate::host::SourceLocation;
use crate::samples::SampleStore;

/// Aggregated statistics for one definition site, shared by every closure
/// created from it.
///
/// Times are in clock units (seconds), memory in kilobytes.
#[derive(Debug)]
pub struct StatRecord {
    /// Last name any call site used for this definition.
    pub label: Option<String>,
    pub location: Option<SourceLocation>,
    pub num_calls: u64,
    pub time_elapsed: f64,
    pub avg_time: Option<f64>,
    pub total_mem: f64,
    pub avg_mem: Option<f64>,
    /// Set only while a call is on the stack.
    pub(crate) time_called: Option<f64>,
    pub(crate) start_mem: Option<f64>,
    pub(crate) time_samples: SampleStore,
    pub(crate) mem_samples: SampleStore,
}

impl StatRecord {
    pub(crate) fn new(spill_chunk: usize) -> Self {
        Self {
            label: None,
            location: None,
            num_calls: 0,
            time_elapsed: 0.0,
            avg_time: None,
            total_mem: 0.0,
            avg_mem: None,
            time_called: None,
            start_mem: None,
            time_samples: SampleStore::new(spill_chunk),
            mem_samples: SampleStore::new(spill_chunk),
        }
    }

    /// Whether a call to this definition is currently open.
    pub fn in_call(&self) -> bool {
        self.time_called.is_some()
    }

    /// Number of closed calls whose duration was sampled this session.
    pub fn samples(&self) -> u64 {
        self.time_samples.len()
    }

    /// Accumulated time, counting an open call up to `now` without closing it.
    pub fn elapsed_at(&self, now: f64) -> f64 {
        match self.time_called {
            Some(called) => self.time_elapsed + (now - called),
            None => self.time_elapsed,
        }
    }

    pub(crate) fn open(&mut self, now: f64, heap_kb: f64) {
        self.time_called = Some(now);
        self.start_mem = Some(heap_kb);
    }

    /// Close the open call, if any. Returns `true` if either sample store
    /// spilled to its backing file.
    pub(crate) fn close(&mut self, now: f64, heap_kb: f64) -> Result<bool> {
        let Some(called) = self.time_called.take() else {
            return Ok(false);
        };
        let start_mem = self.start_mem.take().unwrap_or(heap_kb);
        let dt = now - called;
        let dm = heap_kb - start_mem;
        self.time_elapsed += dt;
        self.total_mem += dm;
        let spilled_time = self.time_samples.record(dt)?;
        let spilled_mem = self.mem_samples.record(dm)?;
        Ok(spilled_time || spilled_mem)
    }

    /// Compute the session averages from every sampled call. Records with no
    /// closed call keep whatever they had.
    pub(crate) fn finalize(&mut self) -> Result<()> {
        if !self.time_samples.is_empty() {
            self.avg_time = Some(self.time_samples.average()?);
        }
        if !self.mem_samples.is_empty() {
            self.avg_mem = Some(self.mem_samples.average()?);
        }
        Ok(())
    }

    /// Forget the previous session's samples and averages. Counters and
    /// totals carry over until `clear`.
    pub(crate) fn begin_session(&mut self) {
        self.avg_time = None;
        self.avg_mem = None;
        self.time_samples.reopen();
        self.mem_samples.reopen();
    }

    /// Back to the state of a freshly constructed record, releasing the
    /// sample stores' backing files.
    pub(crate) fn clear(&mut self) {
        self.label = None;
        self.location = None;
        self.num_calls = 0;
        self.time_elapsed = 0.0;
        self.avg_time = None;
        self.total_mem = 0.0;
        self.avg_mem = None;
        self.time_called = None;
        self.start_mem = None;
        self.time_samples.reopen();
        self.mem_samples.reopen();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_without_open_call_is_a_no_op() {
        let mut rec = StatRecord::new(4);
        assert!(!rec.close(1.0, 10.0).unwrap());
        assert_eq!(rec.time_elapsed, 0.0);
        assert_eq!(rec.samples(), 0);
    }

    #[test]
    fn open_close_accumulates_time_and_net_memory() {
        let mut rec = StatRecord::new(4);
        rec.open(1.0, 100.0);
        assert!(rec.in_call());
        rec.close(1.25, 112.0).unwrap();
        assert!(!rec.in_call());
        assert!((rec.time_elapsed - 0.25).abs() < 1e-12);
        assert!((rec.total_mem - 12.0).abs() < 1e-12);

        rec.open(2.0, 112.0);
        rec.close(2.75, 104.0).unwrap();
        assert!((rec.time_elapsed - 1.0).abs() < 1e-12);
        assert!((rec.total_mem - 4.0).abs() < 1e-12, "memory can shrink");

        rec.finalize().unwrap();
        assert!((rec.avg_time.unwrap() - 0.5).abs() < 1e-12);
        assert!((rec.avg_mem.unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn elapsed_at_includes_open_call_without_mutating() {
        let mut rec = StatRecord::new(4);
        rec.time_elapsed = 3.0;
        rec.open(10.0, 0.0);
        assert!((rec.elapsed_at(12.5) - 5.5).abs() < 1e-12);
        assert!(rec.in_call());
        assert_eq!(rec.time_elapsed, 3.0);
    }

    #[test]
    fn finalize_leaves_unsampled_record_without_averages() {
        let mut rec = StatRecord::new(4);
        rec.num_calls = 2;
        rec.finalize().unwrap();
        assert!(rec.avg_time.is_none());
        assert!(rec.avg_mem.is_none());
    }

    #[test]
    fn begin_session_drops_samples_but_keeps_totals() {
        let mut rec = StatRecord::new(2);
        rec.num_calls = 3;
        for i in 0..3 {
            rec.open(i as f64, 0.0);
            rec.close(i as f64 + 1.0, 4.0).unwrap();
        }
        rec.finalize().unwrap();
        rec.begin_session();
        assert_eq!(rec.samples(), 0);
        assert!(rec.avg_time.is_none());
        assert!(rec.avg_mem.is_none());
        assert_eq!(rec.num_calls, 3);
        assert!((rec.time_elapsed - 3.0).abs() < 1e-12);
        assert!((rec.total_mem - 12.0).abs() < 1e-12);
    }

    #[test]
    fn clear_resets_every_field() {
        let mut rec = StatRecord::new(2);
        rec.label = Some("f".into());
        rec.num_calls = 7;
        rec.open(0.0, 0.0);
        rec.close(1.0, 1.0).unwrap();
        rec.finalize().unwrap();
        rec.open(2.0, 0.0);
        rec.clear();
        assert!(rec.label.is_none());
        assert!(rec.location.is_none());
        assert_eq!(rec.num_calls, 0);
        assert_eq!(rec.time_elapsed, 0.0);
        assert_eq!(rec.total_mem, 0.0);
        assert!(rec.avg_time.is_none());
        assert!(!rec.in_call());
        assert_eq!(rec.samples(), 0);
    }
}
