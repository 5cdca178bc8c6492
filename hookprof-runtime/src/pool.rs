//! Pre-built statistics records, recycled across sessions so a first
//! sighting inside the hook rarely has to allocate.

use crate::record::StatRecord;

#[derive(Debug)]
pub struct RecordPool {
    free: Vec<StatRecord>,
    spill_chunk: usize,
}

impl RecordPool {
    /// A pool holding `warm` ready records.
    pub fn new(warm: usize, spill_chunk: usize) -> Self {
        let free = (0..warm).map(|_| StatRecord::new(spill_chunk)).collect();
        Self { free, spill_chunk }
    }

    /// A recycled record with zeroed counters and empty sample stores, or a
    /// new one when the pool has run dry.
    pub fn acquire(&mut self) -> StatRecord {
        self.free
            .pop()
            .unwrap_or_else(|| StatRecord::new(self.spill_chunk))
    }

    /// Clear `record` and keep it for a later `acquire`.
    pub fn release(&mut self, mut record: StatRecord) {
        record.clear();
        self.free.push(record);
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }
}
