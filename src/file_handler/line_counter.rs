//! Line count resolution.
//!
//! Two interchangeable strategies sit behind the [`LineCounter`] trait: an external `wc -l`
//! process, which counts without decoding anything in this process, and a pure streaming scan.
//! Neither loads the file into memory.

use crate::error::{LineServerError, Result};
use crate::file_handler::scan::{self, READ_CHUNK_SIZE};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Determines the total number of lines in a file
#[async_trait]
pub trait LineCounter: Send + Sync {
    /// Count the lines of the file at `path`
    ///
    /// # Errors
    /// * `FileAccess` if the file cannot be opened for reading
    /// * `CountResolution` if the count cannot be determined
    async fn count(&self, path: &Path) -> Result<u64>;

    /// True when this counter reads the file the same way the index builder does, so the engine
    /// can take the count from the index pass instead of reading the file twice.
    fn shares_index_pass(&self) -> bool {
        false
    }

    /// Short name used in log messages
    fn name(&self) -> &'static str;
}

/// Counts lines by running `wc -l`
#[derive(Debug, Clone)]
pub struct ExternalLineCounter {
    program: OsString,
}

impl ExternalLineCounter {
    pub fn new() -> Self {
        Self::with_program("wc")
    }

    /// Use a different `wc`-compatible executable
    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for ExternalLineCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LineCounter for ExternalLineCounter {
    async fn count(&self, path: &Path) -> Result<u64> {
        // Surface unreadable files as access errors rather than wc failures
        File::open(path).await.map_err(|e| {
            LineServerError::file_access(
                format!("Cannot open file for reading: {}", path.display()),
                e,
            )
        })?;

        let output = Command::new(&self.program)
            .arg("-l")
            .arg(path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                LineServerError::count_resolution(
                    path,
                    format!("failed to run {}: {}", self.program.to_string_lossy(), e),
                )
            })?;

        if !output.status.success() {
            return Err(LineServerError::count_resolution(
                path,
                format!(
                    "{} exited with {}: {}",
                    self.program.to_string_lossy(),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_wc_output(&stdout).ok_or_else(|| {
            LineServerError::count_resolution(
                path,
                format!("unparsable line count output: {:?}", stdout.trim()),
            )
        })
    }

    fn name(&self) -> &'static str {
        "external"
    }
}

/// Extract the first run of digits, e.g. `"  12000 /data/big.txt"` -> 12000
fn parse_wc_output(stdout: &str) -> Option<u64> {
    let start = stdout.find(|c: char| c.is_ascii_digit())?;
    let digits = &stdout[start..];
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse().ok()
}

/// Counts lines with a chunked newline scan
#[derive(Debug, Clone, Default)]
pub struct StreamingLineCounter;

impl StreamingLineCounter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LineCounter for StreamingLineCounter {
    async fn count(&self, path: &Path) -> Result<u64> {
        let mut file = File::open(path).await.map_err(|e| {
            LineServerError::file_access(
                format!("Cannot open file for reading: {}", path.display()),
                e,
            )
        })?;

        let mut buffer = vec![0u8; READ_CHUNK_SIZE];
        let mut newlines = 0u64;
        let mut last_byte = None;

        loop {
            let n = file.read(&mut buffer).await.map_err(|e| {
                LineServerError::file_access(format!("Failed to read {}", path.display()), e)
            })?;
            if n == 0 {
                break;
            }
            newlines += memchr::memchr_iter(b'\n', &buffer[..n]).count() as u64;
            last_byte = Some(buffer[n - 1]);
        }

        Ok(scan::total_lines(newlines, last_byte))
    }

    fn shares_index_pass(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "streaming"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_file(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content).expect("Failed to write test content");
        file.flush().expect("Failed to flush test file");
        file
    }

    #[test]
    fn test_parse_wc_output() {
        assert_eq!(parse_wc_output("12000 /tmp/file\n"), Some(12000));
        assert_eq!(parse_wc_output("     7 /tmp/file"), Some(7));
        assert_eq!(parse_wc_output("0\n"), Some(0));
        assert_eq!(parse_wc_output("no digits here"), None);
        assert_eq!(parse_wc_output(""), None);
    }

    #[tokio::test]
    async fn test_streaming_counts_unterminated_last_line() {
        let counter = StreamingLineCounter::new();

        let terminated = create_test_file(b"a\nb\nc\n");
        assert_eq!(counter.count(terminated.path()).await.unwrap(), 3);

        let unterminated = create_test_file(b"a\nb\nc");
        assert_eq!(counter.count(unterminated.path()).await.unwrap(), 3);

        let blank_lines = create_test_file(b"\n\n\n");
        assert_eq!(counter.count(blank_lines.path()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_streaming_counts_across_chunks() {
        let content = "x".repeat(100) + "\n";
        let file = create_test_file(content.repeat(2000).as_bytes());
        let counter = StreamingLineCounter::new();
        assert_eq!(counter.count(file.path()).await.unwrap(), 2000);
        assert!(counter.shares_index_pass());
    }

    #[tokio::test]
    async fn test_streaming_missing_file() {
        let result = StreamingLineCounter::new()
            .count(Path::new("/this/file/does/not/exist.txt"))
            .await;
        assert!(matches!(result, Err(LineServerError::FileAccess { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_external_counts_newlines() {
        let file = create_test_file(b"one\ntwo\nthree\n");
        let counter = ExternalLineCounter::new();
        assert_eq!(counter.count(file.path()).await.unwrap(), 3);
        assert!(!counter.shares_index_pass());
    }

    #[tokio::test]
    async fn test_external_missing_program() {
        let file = create_test_file(b"one\n");
        let counter = ExternalLineCounter::with_program("definitely-not-a-real-wc-binary");
        let result = counter.count(file.path()).await;
        assert!(matches!(
            result,
            Err(LineServerError::CountResolution { .. })
        ));
    }

    #[tokio::test]
    async fn test_external_missing_file() {
        let counter = ExternalLineCounter::new();
        let result = counter
            .count(Path::new("/this/file/does/not/exist.txt"))
            .await;
        assert!(matches!(result, Err(LineServerError::FileAccess { .. })));
    }
}
