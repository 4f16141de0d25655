//! Bounded line lookup over a sparse index.
//!
//! A lookup never reads more than the byte window between the two index samples that surround
//! the requested line, so its cost is bounded by the index interval no matter how large the file
//! is or where in it the line sits.

use crate::error::{LineServerError, Result};
use crate::file_handler::scan;
use crate::file_handler::sparse_index::{FileMetadata, SparseIndex};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, BufReader};

/// Byte window and line span scanned for one lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRange {
    /// Line that starts at `start`
    pub first_line: u64,
    /// Last line fully contained before `end`
    pub last_line: u64,
    /// Inclusive start offset
    pub start: u64,
    /// Exclusive end offset
    pub end: u64,
}

impl ScanRange {
    /// Number of lines covered by the window
    pub fn line_span(&self) -> u64 {
        self.last_line.saturating_sub(self.first_line) + 1
    }

    pub fn byte_len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }
}

/// Resolves line numbers to line text using a built index
#[derive(Debug)]
pub struct LineLocator {
    path: PathBuf,
    index: Arc<SparseIndex>,
    metadata: FileMetadata,
    scans: AtomicU64,
}

impl LineLocator {
    pub fn new(path: impl Into<PathBuf>, index: Arc<SparseIndex>, metadata: FileMetadata) -> Self {
        Self {
            path: path.into(),
            index,
            metadata,
            scans: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn index(&self) -> &SparseIndex {
        &self.index
    }

    pub fn metadata(&self) -> FileMetadata {
        self.metadata
    }

    /// Number of bounded scans performed so far
    pub fn scans(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }

    /// Check that `line` lies in `[1, total_lines)`
    ///
    /// The upper bound is exclusive, so the final line of the file is rejected.
    pub fn validate(&self, line: u64) -> Result<()> {
        if line == 0 || line >= self.metadata.total_lines {
            return Err(LineServerError::InvalidLineNumber {
                line,
                total: self.metadata.total_lines,
            });
        }
        Ok(())
    }

    /// Byte window that must contain `line`
    pub fn scan_range(&self, line: u64) -> Result<ScanRange> {
        self.validate(line)?;
        let (first_line, start) = self.index.lower_bound(line);
        let (last_line, end) = self.index.upper_bound(line, &self.metadata);
        Ok(ScanRange {
            first_line,
            last_line,
            start,
            end,
        })
    }

    /// Read the text of `line` without its terminator
    ///
    /// # Errors
    /// * `InvalidLineNumber` if `line` is out of range
    /// * `FileAccess` if the file cannot be opened, seeked or read
    /// * `LineNotFound` if the window ends before reaching `line`
    pub async fn locate(&self, line: u64) -> Result<String> {
        let range = self.scan_range(line)?;
        self.scans.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "Scanning lines {}..={} (bytes {}..{}) for line {}",
            range.first_line,
            range.last_line,
            range.start,
            range.end,
            line
        );

        let mut file = File::open(&self.path).await.map_err(|e| {
            LineServerError::file_access(
                format!("Cannot open file for reading: {}", self.path.display()),
                e,
            )
        })?;
        file.seek(SeekFrom::Start(range.start)).await.map_err(|e| {
            LineServerError::file_access(
                format!("Failed to seek to byte {}", range.start),
                e,
            )
        })?;
        let mut reader = BufReader::with_capacity(scan::READ_CHUNK_SIZE, file.take(range.byte_len()));

        // Skip the lines in front of the target without copying them
        let mut to_skip = line - range.first_line;
        while to_skip > 0 {
            let available = reader.fill_buf().await.map_err(|e| self.read_error(e))?;
            if available.is_empty() {
                break;
            }
            match memchr::memchr(b'\n', available) {
                Some(pos) => {
                    reader.consume(pos + 1);
                    to_skip -= 1;
                }
                None => {
                    let len = available.len();
                    reader.consume(len);
                }
            }
        }

        if to_skip == 0 {
            let mut raw = Vec::new();
            let n = reader
                .read_until(b'\n', &mut raw)
                .await
                .map_err(|e| self.read_error(e))?;
            if n > 0 {
                return Ok(scan::decode_line(&raw));
            }
        }

        log::error!(
            "Line {} not found between bytes {} and {} of {}; the index is inconsistent with the file",
            line,
            range.start,
            range.end,
            self.path.display()
        );
        Err(LineServerError::LineNotFound { line })
    }

    fn read_error(&self, e: std::io::Error) -> LineServerError {
        LineServerError::file_access(format!("Failed to read {}", self.path.display()), e)
    }
}
