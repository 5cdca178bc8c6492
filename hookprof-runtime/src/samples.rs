//! Append-only numeric sample storage with bounded memory.
//!
//! Samples land in a fixed in-memory chunk. When the chunk fills, it is
//! written out through a `BufWriter` to an anonymous temporary file and the
//! chunk is reused, so the working set stays constant no matter how many
//! calls are recorded. Readers flush the writer, rewind the file, stream it
//! back, then seek to the end again for further appends.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};

use crate::error::{Error, Result};

const SAMPLE_BYTES: usize = std::mem::size_of::<f64>();

pub struct SampleStore {
    chunk: Box<[f64]>,
    filled: usize,
    /// Created on the first spill; dropped (closing and deleting the file)
    /// by `reopen`.
    spill: Option<BufWriter<File>>,
    spilled: u64,
}

impl SampleStore {
    pub fn new(chunk: usize) -> Self {
        Self {
            chunk: vec![0.0; chunk.max(1)].into_boxed_slice(),
            filled: 0,
            spill: None,
            spilled: 0,
        }
    }

    /// Number of samples recorded since the last reset.
    pub fn len(&self) -> u64 {
        self.spilled + self.filled as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append one sample. Returns `true` when this call moved the full
    /// in-memory chunk to the backing file first.
    pub fn record(&mut self, value: f64) -> Result<bool> {
        let spilled = self.filled == self.chunk.len();
        if spilled {
            self.spill_chunk()?;
        }
        self.chunk[self.filled] = value;
        self.filled += 1;
        Ok(spilled)
    }

    fn spill_chunk(&mut self) -> Result<()> {
        let writer = match self.spill.take() {
            Some(w) => self.spill.insert(w),
            None => self.spill.insert(BufWriter::new(tempfile::tempfile()?)),
        };
        for value in &self.chunk[..self.filled] {
            writer.write_all(&value.to_le_bytes())?;
        }
        self.spilled += self.filled as u64;
        self.filled = 0;
        Ok(())
    }

    /// Arithmetic mean of every sample since the last reset. The store is
    /// left untouched.
    pub fn average(&mut self) -> Result<f64> {
        let count = self.len();
        if count == 0 {
            return Err(Error::NoSamples);
        }
        let mut sum = 0.0;
        self.for_each_spilled(|v| sum += v)?;
        sum += self.chunk[..self.filled].iter().sum::<f64>();
        Ok(sum / count as f64)
    }

    /// Every sample since the last reset, in recording order. Empties the
    /// store for new writes.
    pub fn drain(&mut self) -> Result<Vec<f64>> {
        let mut out = Vec::with_capacity(self.len() as usize);
        self.for_each_spilled(|v| out.push(v))?;
        out.extend_from_slice(&self.chunk[..self.filled]);
        self.clear()?;
        Ok(out)
    }

    /// Discard all samples but keep the backing file for reuse.
    pub fn clear(&mut self) -> Result<()> {
        if let Some(writer) = self.spill.as_mut() {
            writer.flush()?;
            let file = writer.get_mut();
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
        }
        self.spilled = 0;
        self.filled = 0;
        Ok(())
    }

    /// Discard all samples and release the backing file. The next spill
    /// opens a fresh one.
    pub fn reopen(&mut self) {
        self.spill = None;
        self.spilled = 0;
        self.filled = 0;
    }

    fn for_each_spilled(&mut self, mut f: impl FnMut(f64)) -> Result<()> {
        let Some(writer) = self.spill.as_mut() else {
            return Ok(());
        };
        writer.flush()?;
        let file = writer.get_mut();
        file.seek(SeekFrom::Start(0))?;
        let mut reader = BufReader::new(&mut *file);
        let mut bytes = [0u8; SAMPLE_BYTES];
        for _ in 0..self.spilled {
            reader.read_exact(&mut bytes)?;
            f(f64::from_le_bytes(bytes));
        }
        drop(reader);
        file.seek(SeekFrom::End(0))?;
        Ok(())
    }
}

impl std::fmt::Debug for SampleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleStore")
            .field("len", &self.len())
            .field("chunk", &self.chunk.len())
            .field("spilled", &self.spilled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_of_empty_store_is_an_error() {
        let mut store = SampleStore::new(8);
        assert!(store.is_empty());
        assert!(matches!(store.average(), Err(Error::NoSamples)));
    }

    #[test]
    fn average_within_one_chunk() {
        let mut store = SampleStore::new(8);
        for v in [0.010, 0.020, 0.030] {
            assert!(!store.record(v).unwrap());
        }
        assert_eq!(store.len(), 3);
        assert!((store.average().unwrap() - 0.020).abs() < 1e-12);
    }

    #[test]
    fn spills_when_chunk_fills_and_keeps_exact_mean() {
        let mut store = SampleStore::new(4);
        let mut spills = 0;
        for i in 1..=10 {
            if store.record(i as f64).unwrap() {
                spills += 1;
            }
        }
        assert_eq!(spills, 2, "10 samples through a 4-sample chunk spill twice");
        assert_eq!(store.len(), 10);
        assert!((store.average().unwrap() - 5.5).abs() < 1e-12);

        // Reading does not disturb later appends.
        store.record(11.0).unwrap();
        store.record(12.0).unwrap();
        assert_eq!(store.len(), 12);
        assert!((store.average().unwrap() - 6.5).abs() < 1e-12);
    }

    #[test]
    fn drain_returns_samples_in_order_and_resets() {
        let mut store = SampleStore::new(3);
        for i in 0..7 {
            store.record(i as f64).unwrap();
        }
        let drained = store.drain().unwrap();
        assert_eq!(drained, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(store.is_empty());

        store.record(42.0).unwrap();
        assert_eq!(store.drain().unwrap(), vec![42.0]);
    }

    #[test]
    fn reopen_discards_backing_file() {
        let mut store = SampleStore::new(2);
        for i in 0..5 {
            store.record(i as f64).unwrap();
        }
        store.reopen();
        assert!(store.is_empty());
        assert!(store.spill.is_none());
        store.record(3.0).unwrap();
        store.record(5.0).unwrap();
        assert!((store.average().unwrap() - 4.0).abs() < 1e-12);
    }
}
