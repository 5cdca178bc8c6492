//! Profiler tunables, with environment overrides.

use std::str::FromStr;

use crate::error::{Error, Result};

/// Records constructed up front so first sightings rarely allocate.
pub const DEFAULT_POOL_SIZE: usize = 32;
/// Time columns are quantized to this step (seconds).
pub const DEFAULT_PRECISION: f64 = 1e-6;
/// Maximum number of result rows.
pub const DEFAULT_LIMIT: usize = 500;
/// Samples held in memory per store before spilling to disk.
pub const DEFAULT_SPILL_CHUNK: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct ProfilerConfig {
    pub pool_size: usize,
    pub precision: f64,
    pub limit: usize,
    pub spill_chunk: usize,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            precision: DEFAULT_PRECISION,
            limit: DEFAULT_LIMIT,
            spill_chunk: DEFAULT_SPILL_CHUNK,
        }
    }
}

impl ProfilerConfig {
    /// Defaults overridden by `HOOKPROF_POOL_SIZE`, `HOOKPROF_PRECISION`,
    /// `HOOKPROF_LIMIT` and `HOOKPROF_SPILL_CHUNK` when set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(v) = parse_var(&lookup, "HOOKPROF_POOL_SIZE")? {
            config.pool_size = v;
        }
        if let Some(v) = parse_var::<f64>(&lookup, "HOOKPROF_PRECISION")? {
            if !(v > 0.0 && v.is_finite()) {
                return Err(Error::InvalidConfig {
                    key: "HOOKPROF_PRECISION",
                    value: v.to_string(),
                });
            }
            config.precision = v;
        }
        if let Some(v) = parse_var(&lookup, "HOOKPROF_LIMIT")? {
            config.limit = v;
        }
        if let Some(v) = parse_var::<usize>(&lookup, "HOOKPROF_SPILL_CHUNK")? {
            config.spill_chunk = v.max(1);
        }
        Ok(config)
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::InvalidConfig { key, value: raw }),
    }
}
