//! Sparse line index built in a single streaming pass.
//!
//! Only every Nth line is sampled, so the index stays small for files of any size while still
//! bounding every later lookup to at most N lines of scanning.
//!
//! Sample semantics: the mandatory entry `1 -> 0` marks where line 1 starts. Every other key `k`
//! is a multiple of the interval and maps to the offset right after line `k`'s terminator, which
//! is where line `k + 1` starts.

use crate::error::{LineServerError, Result};
use crate::file_handler::scan::{self, READ_CHUNK_SIZE};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Smallest accepted interval. Key 1 is reserved for the start-of-file seed.
pub const MIN_INDEX_INTERVAL: u64 = 2;

/// Line count and size resolved by the indexing pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMetadata {
    pub total_lines: u64,
    pub byte_size: u64,
}

/// Ordered map from sampled line numbers to byte offsets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseIndex {
    interval: u64,
    samples: BTreeMap<u64, u64>,
}

impl SparseIndex {
    /// Create an index holding only the `1 -> 0` seed
    pub fn new(interval: u64) -> Result<Self> {
        if interval < MIN_INDEX_INTERVAL {
            return Err(LineServerError::config(format!(
                "index line interval must be at least {}, got {}",
                MIN_INDEX_INTERVAL, interval
            )));
        }
        let mut samples = BTreeMap::new();
        samples.insert(1, 0);
        Ok(Self { interval, samples })
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Offset recorded for `line`, if it was sampled
    pub fn get(&self, line: u64) -> Option<u64> {
        self.samples.get(&line).copied()
    }

    /// Number of entries, seed included
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Never true; the seed is always present
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Entries in increasing line order
    pub fn entries(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.samples.iter().map(|(line, offset)| (*line, *offset))
    }

    /// Highest sampled line and its offset
    pub fn last_entry(&self) -> (u64, u64) {
        self.samples
            .iter()
            .next_back()
            .map(|(line, offset)| (*line, *offset))
            .unwrap_or((1, 0))
    }

    /// First line of the scan window for `line` and the offset where it starts
    pub fn lower_bound(&self, line: u64) -> (u64, u64) {
        let key = (line.saturating_sub(1) / self.interval) * self.interval;
        if key == 0 {
            return (1, 0);
        }
        match self.get(key) {
            Some(offset) => (key + 1, offset),
            None => (1, 0),
        }
    }

    /// Last line of the scan window for `line` and the offset right after it
    pub fn upper_bound(&self, line: u64, metadata: &FileMetadata) -> (u64, u64) {
        let key = line.div_ceil(self.interval) * self.interval;
        match self.get(key) {
            Some(offset) => (key, offset),
            None => (metadata.total_lines, metadata.byte_size),
        }
    }

    fn record(&mut self, line: u64, offset: u64) {
        self.samples.insert(line, offset);
    }
}

/// Build the sparse index for the file at `path`
pub async fn build_index(path: &Path, interval: u64) -> Result<(SparseIndex, FileMetadata)> {
    build_index_with_progress(path, interval, None).await
}

/// Build the sparse index, reporting progress against `expected_lines` when known
///
/// # Errors
/// * `Config` for an interval below [`MIN_INDEX_INTERVAL`]
/// * `FileAccess` if the file cannot be opened or read
/// * `CountResolution` if the file holds no lines
pub async fn build_index_with_progress(
    path: &Path,
    interval: u64,
    expected_lines: Option<u64>,
) -> Result<(SparseIndex, FileMetadata)> {
    let mut index = SparseIndex::new(interval)?;
    log::info!(
        "Indexing {} at every {} lines",
        path.display(),
        interval
    );

    let mut file = File::open(path).await.map_err(|e| {
        LineServerError::file_access(
            format!("Cannot open file for reading: {}", path.display()),
            e,
        )
    })?;

    let mut buffer = vec![0u8; READ_CHUNK_SIZE];
    let mut bytes_read = 0u64;
    let mut completed_lines = 0u64;
    let mut last_byte = None;

    loop {
        let n = file.read(&mut buffer).await.map_err(|e| {
            LineServerError::file_access(format!("Failed to read {}", path.display()), e)
        })?;
        if n == 0 {
            break;
        }

        for newline in memchr::memchr_iter(b'\n', &buffer[..n]) {
            completed_lines += 1;
            if completed_lines % interval == 0 {
                let offset = bytes_read + newline as u64 + 1;
                index.record(completed_lines, offset);
                log_sample(completed_lines, offset, expected_lines);
            }
        }

        bytes_read += n as u64;
        last_byte = Some(buffer[n - 1]);
    }

    let metadata = FileMetadata {
        total_lines: scan::total_lines(completed_lines, last_byte),
        byte_size: bytes_read,
    };

    if metadata.total_lines == 0 {
        return Err(LineServerError::count_resolution(
            path,
            "file contains no lines",
        ));
    }

    log::info!(
        "File indexing complete: {} bytes read, {} lines indexed, {} datapoints within the index",
        metadata.byte_size,
        metadata.total_lines,
        index.len()
    );

    Ok((index, metadata))
}

fn log_sample(line: u64, offset: u64, expected_lines: Option<u64>) {
    match expected_lines {
        Some(total) if total > 0 => log::debug!(
            "Indexing line {}, bytes read: {} ({:.2}%)",
            line,
            offset,
            (line as f64 / total as f64 * 100.0).min(100.0)
        ),
        _ => log::debug!("Indexing line {}, bytes read: {}", line, offset),
    }
}
