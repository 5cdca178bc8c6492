//! Recorded hook traces.
//!
//! A trace is newline-delimited JSON, one hook event per line:
//!
//! ```text
//! {"t": 0.0, "heap_kb": 512, "event": "call", "id": 1, "unit": "main.lua", "line": 3, "name": "f"}
//! {"t": 0.01, "event": "return", "id": 1, "unit": "main.lua", "line": 3}
//! {"t": 0.02, "event": "tail_call", "id": 2, "unit": "main.lua", "line": 9, "caller": {"id": 1, "unit": "main.lua", "line": 3}}
//! {"t": 0.5, "event": "gc"}
//! ```
//!
//! `t` is in seconds and must not decrease. `heap_kb` is the live heap at
//! that instant and carries over to later lines until set again. A frame
//! without `unit` and `line` is native and is ignored by the profiler.

use std::path::Path;

use hookprof_runtime::{CallableId, Frame};
use serde::Deserialize;

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TraceFrame {
    pub id: u64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub name: Option<String>,
}

impl TraceFrame {
    pub fn frame(&self) -> Frame<'_> {
        let frame = match (&self.unit, self.line) {
            (Some(unit), Some(line)) => Frame::new(CallableId(self.id), unit, line),
            _ => Frame::native(CallableId(self.id)),
        };
        match &self.name {
            Some(name) => frame.named(name),
            None => frame,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum EventName {
    Call,
    Return,
    TailCall,
    Gc,
}

#[derive(Debug, Deserialize)]
struct RawLine {
    t: f64,
    #[serde(default)]
    heap_kb: Option<f64>,
    event: EventName,
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    line: Option<u32>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    caller: Option<TraceFrame>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    Call(TraceFrame),
    Return(TraceFrame),
    TailCall {
        frame: TraceFrame,
        caller: Option<TraceFrame>,
    },
    /// The host completed a collection cycle.
    Gc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    pub t: f64,
    pub heap_kb: Option<f64>,
    pub event: TraceEvent,
}

/// Parse one non-blank trace line.
pub fn parse_line(text: &str) -> Result<TraceEntry, String> {
    let raw: RawLine = serde_json::from_str(text).map_err(|e| e.to_string())?;
    let frame = || -> Result<TraceFrame, String> {
        let id = raw.id.ok_or("missing field `id`")?;
        Ok(TraceFrame {
            id,
            unit: raw.unit.clone(),
            line: raw.line,
            name: raw.name.clone(),
        })
    };
    let event = match raw.event {
        EventName::Call => TraceEvent::Call(frame()?),
        EventName::Return => TraceEvent::Return(frame()?),
        EventName::TailCall => TraceEvent::TailCall {
            frame: frame()?,
            caller: raw.caller.clone(),
        },
        EventName::Gc => TraceEvent::Gc,
    };
    Ok(TraceEntry {
        t: raw.t,
        heap_kb: raw.heap_kb,
        event,
    })
}

/// Parse a whole trace. Blank lines are skipped; line numbers in errors are
/// 1-based.
pub fn parse_trace(path: &Path, contents: &str) -> Result<Vec<TraceEntry>, Error> {
    let invalid = |line: usize, reason: String| Error::InvalidTrace {
        path: path.to_path_buf(),
        line,
        reason,
    };
    let mut entries = Vec::new();
    let mut last_t = f64::NEG_INFINITY;
    for (i, text) in contents.lines().enumerate() {
        if text.trim().is_empty() {
            continue;
        }
        let entry = parse_line(text).map_err(|reason| invalid(i + 1, reason))?;
        if entry.t < last_t {
            return Err(invalid(
                i + 1,
                format!("time went backwards ({} after {last_t})", entry.t),
            ));
        }
        last_t = entry.t;
        entries.push(entry);
    }
    Ok(entries)
}

/// Read and parse a trace file.
pub fn load_trace(path: &Path) -> Result<Vec<TraceEntry>, Error> {
    let contents = std::fs::read_to_string(path).map_err(|source| Error::TraceRead {
        path: path.to_path_buf(),
        source,
    })?;
    let entries = parse_trace(path, &contents)?;
    log::debug!("loaded {} trace events from {}", entries.len(), path.display());
    Ok(entries)
}
