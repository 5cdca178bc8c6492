//! Time sources for call durations.
//!
//! Every reading is in seconds. A session must use one clock throughout;
//! readings only need to be non-decreasing and comparable to each other.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

pub trait Clock {
    fn now(&self) -> f64;
}

/// The active clock, shared by the dispatcher and the GC tracker so that
/// `set_clock` reaches both.
pub(crate) type SharedClock = Rc<RefCell<Box<dyn Clock>>>;

impl<F: Fn() -> f64> Clock for F {
    fn now(&self) -> f64 {
        self()
    }
}

/// Monotonic wall time since the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    epoch: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for WallClock {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}
