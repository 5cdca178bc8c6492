use std::alloc::{GlobalAlloc, Layout};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::host::HeapProbe;

// Process-wide byte counters. Only touched through atomics so they are safe
// to update from inside `GlobalAlloc` without thread-local state.
static ALLOCATED: AtomicU64 = AtomicU64::new(0);
static FREED: AtomicU64 = AtomicU64::new(0);

/// A global allocator wrapper that keeps a running count of live heap bytes,
/// giving Rust hosts the live-heap query the profiler's memory columns use.
///
/// ```ignore
/// #[global_allocator]
/// static ALLOC: TrackingAllocator<std::alloc::System> =
///     TrackingAllocator::new(std::alloc::System);
/// ```
pub struct TrackingAllocator<A: GlobalAlloc> {
    inner: A,
}

impl<A: GlobalAlloc> TrackingAllocator<A> {
    pub const fn new(inner: A) -> Self {
        Self { inner }
    }
}

unsafe impl<A: GlobalAlloc> GlobalAlloc for TrackingAllocator<A> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { self.inner.alloc(layout) };
        if !ptr.is_null() {
            track_alloc(layout.size() as u64);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { self.inner.dealloc(ptr, layout) };
        track_dealloc(layout.size() as u64);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let old_size = layout.size() as u64;
        let result = unsafe { self.inner.realloc(ptr, layout, new_size) };
        if !result.is_null() {
            track_dealloc(old_size);
            track_alloc(new_size as u64);
        }
        result
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { self.inner.alloc_zeroed(layout) };
        if !ptr.is_null() {
            track_alloc(layout.size() as u64);
        }
        ptr
    }
}

fn track_alloc(bytes: u64) {
    ALLOCATED.fetch_add(bytes, Ordering::Relaxed);
}

fn track_dealloc(bytes: u64) {
    FREED.fetch_add(bytes, Ordering::Relaxed);
}

/// Bytes currently live through `TrackingAllocator`.
///
/// Zero when no tracking allocator is installed.
pub fn live_heap_bytes() -> u64 {
    let freed = FREED.load(Ordering::Relaxed);
    let allocated = ALLOCATED.load(Ordering::Relaxed);
    allocated.saturating_sub(freed)
}

pub fn live_heap_kb() -> f64 {
    live_heap_bytes() as f64 / 1024.0
}

/// `HeapProbe` backed by `TrackingAllocator`'s counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllocatorHeap;

impl HeapProbe for AllocatorHeap {
    fn live_kb(&self) -> f64 {
        live_heap_kb()
    }
}
