//! Ranking accumulated records into report rows.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::host::SourceLocation;
use crate::record::StatRecord;

/// Ordering applied before truncation. Every key sorts descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Calls,
    /// Ties go to the definition with more calls.
    TotalTime,
    AvgTime,
    TotalMem,
    AvgMem,
}

impl SortKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Calls => "calls",
            SortKey::TotalTime => "time",
            SortKey::AvgTime => "avg_time",
            SortKey::TotalMem => "mem",
            SortKey::AvgMem => "avg_mem",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "calls" | "call" | "num_calls" => Ok(SortKey::Calls),
            "time" | "total_time" => Ok(SortKey::TotalTime),
            "avg_time" | "average_time" => Ok(SortKey::AvgTime),
            "mem" | "memory" | "total_mem" => Ok(SortKey::TotalMem),
            "avg_mem" | "average_mem" => Ok(SortKey::AvgMem),
            _ => Err(Error::UnknownSortKey(s.to_owned())),
        }
    }
}

/// One ranked definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    /// 1-based position after sorting.
    pub rank: usize,
    /// Last observed name, or `?`.
    pub label: String,
    pub location: SourceLocation,
    pub num_calls: u64,
    /// Total time, quantized to the configured precision. Includes the
    /// running portion of a call that is still open.
    pub time: f64,
    /// Present once a session has stopped with at least one closed call.
    pub avg_time: Option<f64>,
    /// Kilobytes, rounded.
    pub total_mem: f64,
    pub avg_mem: Option<f64>,
}

struct Candidate<'a> {
    record: &'a StatRecord,
    location: &'a SourceLocation,
    elapsed: f64,
}

fn desc_opt(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare(key: SortKey, a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    let (ra, rb) = (a.record, b.record);
    match key {
        SortKey::Calls => rb.num_calls.cmp(&ra.num_calls),
        SortKey::TotalTime => b
            .elapsed
            .total_cmp(&a.elapsed)
            .then_with(|| rb.num_calls.cmp(&ra.num_calls)),
        SortKey::AvgTime => desc_opt(ra.avg_time, rb.avg_time),
        SortKey::TotalMem => rb.total_mem.total_cmp(&ra.total_mem),
        SortKey::AvgMem => desc_opt(ra.avg_mem, rb.avg_mem),
    }
}

/// Round `value` to the nearest multiple of `step`.
pub fn quantize(value: f64, step: f64) -> f64 {
    if step > 0.0 {
        (value / step).round() * step
    } else {
        value
    }
}

/// Decimal places needed to print multiples of `step` exactly, taken from
/// the step's shortest decimal form.
pub fn decimals_for(step: f64) -> usize {
    if !(step > 0.0 && step.is_finite()) {
        return 0;
    }
    step.to_string()
        .split_once('.')
        .map_or(0, |(_, frac)| frac.len())
}

/// Filter to definitions with any activity (a completed call, an open call,
/// or a sampled forced close), sort by `key`, then keep the first `limit`.
/// `now` prices calls that are still open.
pub(crate) fn rank(
    records: &[StatRecord],
    now: f64,
    key: SortKey,
    limit: usize,
    precision: f64,
) -> Vec<ResultRow> {
    let mut candidates: Vec<Candidate<'_>> = records
        .iter()
        .filter(|r| r.num_calls > 0 || r.in_call() || r.samples() > 0)
        .filter_map(|record| {
            Some(Candidate {
                location: record.location.as_ref()?,
                elapsed: record.elapsed_at(now),
                record,
            })
        })
        .collect();
    candidates.sort_by(|a, b| compare(key, a, b));

    candidates
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, c)| ResultRow {
            rank: i + 1,
            label: c.record.label.clone().unwrap_or_else(|| "?".to_owned()),
            location: c.location.clone(),
            num_calls: c.record.num_calls,
            time: quantize(c.elapsed, precision),
            avg_time: c.record.avg_time.map(|t| quantize(t, precision)),
            total_mem: c.record.total_mem.round(),
            avg_mem: c.record.avg_mem.map(f64::round),
        })
        .collect()
}
