//! Callable identity to statistics record, with closure merging.
//!
//! Several identities may share one record: a closure re-created on every
//! invocation of its enclosing function gets a new identity each time, but
//! all of them are defined at the same `(unit, line)` and are reported as
//! one definition. The identity seen first owns the record; later ones are
//! routed to it.

use std::collections::HashMap;

use crate::host::{CallableId, Location};
use crate::pool::RecordPool;
use crate::record::StatRecord;

#[derive(Debug, Default)]
pub struct Registry {
    records: Vec<StatRecord>,
    by_id: HashMap<CallableId, usize>,
    /// Definition line to candidate slots; the unit is compared on lookup so
    /// probing never allocates.
    by_line: HashMap<u32, Vec<usize>>,
}

/// Outcome of `Registry::resolve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    /// Identity already known.
    Known(usize),
    /// New identity routed to an existing definition.
    Merged(usize),
    /// First sighting of the definition; a record was taken from the pool.
    Installed(usize),
}

impl Resolved {
    pub fn slot(self) -> usize {
        match self {
            Resolved::Known(i) | Resolved::Merged(i) | Resolved::Installed(i) => i,
        }
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The record slot for `id`, creating or merging as needed.
    pub fn resolve(&mut self, id: CallableId, loc: Location<'_>, pool: &mut RecordPool) -> Resolved {
        if let Some(&slot) = self.by_id.get(&id) {
            return Resolved::Known(slot);
        }
        if let Some(slot) = self.find(&loc) {
            self.by_id.insert(id, slot);
            return Resolved::Merged(slot);
        }
        let mut record = pool.acquire();
        record.location = Some(loc.into());
        record.num_calls = 0;
        record.time_elapsed = 0.0;
        let slot = self.records.len();
        self.records.push(record);
        self.by_id.insert(id, slot);
        self.by_line.entry(loc.line).or_default().push(slot);
        Resolved::Installed(slot)
    }

    fn find(&self, loc: &Location<'_>) -> Option<usize> {
        self.by_line.get(&loc.line)?.iter().copied().find(|&slot| {
            self.records[slot]
                .location
                .as_ref()
                .is_some_and(|l| l.matches(loc))
        })
    }

    pub fn get_mut(&mut self, slot: usize) -> &mut StatRecord {
        &mut self.records[slot]
    }

    pub fn lookup(&self, id: CallableId) -> Option<&StatRecord> {
        self.by_id.get(&id).map(|&slot| &self.records[slot])
    }

    pub fn records(&self) -> &[StatRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut StatRecord> {
        self.records.iter_mut()
    }

    /// Number of distinct definitions.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Number of identities routed to some record.
    pub fn identities(&self) -> usize {
        self.by_id.len()
    }

    /// Forget every identity and hand all records back to `pool`.
    pub fn release_all(&mut self, pool: &mut RecordPool) {
        self.by_id.clear();
        self.by_line.clear();
        for record in self.records.drain(..) {
            pool.release(record);
        }
    }
}
