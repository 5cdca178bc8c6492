//! The seam between the profiler and the runtime it observes.
//!
//! A host runtime (bytecode VM hook, compiler-inserted prologue/epilogue
//! calls, dynamic instrumentation) reports every call, return and tail call
//! of an instrumented callable as a `HookEvent` and hands it to
//! `Profiler::dispatch`. Everything the event borrows lives only for the
//! duration of that call; the profiler copies what it keeps.

use std::fmt;

/// Opaque per-callable identity, stable for the lifetime of the callable.
///
/// Closures created from the same definition usually carry different ids;
/// the registry merges them by source location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallableId(pub u64);

/// Where a callable was defined, as reported by the host for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location<'a> {
    pub unit: &'a str,
    pub line: u32,
}

/// Owned definition site kept by a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceLocation {
    pub unit: String,
    pub line: u32,
}

impl SourceLocation {
    pub fn matches(&self, loc: &Location<'_>) -> bool {
        self.line == loc.line && self.unit == loc.unit
    }
}

impl From<Location<'_>> for SourceLocation {
    fn from(loc: Location<'_>) -> Self {
        Self {
            unit: loc.unit.to_owned(),
            line: loc.line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.unit, self.line)
    }
}

/// One activation as seen by the hook.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub id: CallableId,
    /// `None` when the callable is not introspectable (native code).
    pub location: Option<Location<'a>>,
    pub name: Option<&'a str>,
}

impl<'a> Frame<'a> {
    pub fn new(id: CallableId, unit: &'a str, line: u32) -> Self {
        Self {
            id,
            location: Some(Location { unit, line }),
            name: None,
        }
    }

    pub fn native(id: CallableId) -> Self {
        Self {
            id,
            location: None,
            name: None,
        }
    }

    pub fn named(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Call,
    Return,
    /// The callee replaces the caller's frame; `HookEvent::caller` names the
    /// frame that went away, if the host knows it.
    TailCall,
}

#[derive(Debug, Clone, Copy)]
pub struct HookEvent<'a> {
    pub kind: EventKind,
    pub frame: Frame<'a>,
    pub caller: Option<Frame<'a>>,
}

impl<'a> HookEvent<'a> {
    pub fn call(frame: Frame<'a>) -> Self {
        Self {
            kind: EventKind::Call,
            frame,
            caller: None,
        }
    }

    pub fn ret(frame: Frame<'a>) -> Self {
        Self {
            kind: EventKind::Return,
            frame,
            caller: None,
        }
    }

    pub fn tail_call(frame: Frame<'a>, caller: Option<Frame<'a>>) -> Self {
        Self {
            kind: EventKind::TailCall,
            frame,
            caller,
        }
    }
}

/// Install/uninstall of the single active instrumentation callback.
pub trait HookControl {
    fn install(&mut self);
    fn remove(&mut self);
}

/// Point-in-time live heap size, in kilobytes.
pub trait HeapProbe {
    fn live_kb(&self) -> f64;
}

impl<F: Fn() -> f64> HeapProbe for F {
    fn live_kb(&self) -> f64 {
        self()
    }
}

/// A host with no installable hook (events are pushed by hand).
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualHook;

impl HookControl for ManualHook {
    fn install(&mut self) {}
    fn remove(&mut self) {}
}
