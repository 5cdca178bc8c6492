//! Thread CPU time as a profiler clock (feature `cpu-time`).
//!
//! Reads `CLOCK_THREAD_CPUTIME_ID` through a direct `clock_gettime`
//! declaration, so no `libc` dependency is needed.

use std::ffi::{c_int, c_long};

use crate::clock::Clock;

#[cfg(target_os = "linux")]
const THREAD_CPUTIME: c_int = 3;

#[cfg(target_os = "macos")]
const THREAD_CPUTIME: c_int = 16;

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
compile_error!("the cpu-time feature needs clock_gettime (Linux or macOS)");

/// `struct timespec` on LP64 targets.
#[repr(C)]
#[derive(Default)]
struct CpuTimespec {
    secs: c_long,
    nanos: c_long,
}

extern "C" {
    fn clock_gettime(clock: c_int, out: *mut CpuTimespec) -> c_int;
}

fn thread_cpu_seconds() -> f64 {
    let mut ts = CpuTimespec::default();
    // SAFETY: `ts` is a live, properly aligned out-parameter.
    let rc = unsafe { clock_gettime(THREAD_CPUTIME, &mut ts) };
    debug_assert_eq!(rc, 0, "thread CPU clock unavailable");
    ts.secs as f64 + ts.nanos as f64 * 1e-9
}

/// CPU time consumed by the calling thread, in seconds. Time spent blocked
/// (sleep, I/O waits) does not advance it, so a profiled function is charged
/// only for work it actually did.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuClock;

impl Clock for CpuClock {
    fn now(&self) -> f64 {
        thread_cpu_seconds()
    }
}
