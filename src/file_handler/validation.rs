//! File validation utilities for ensuring a file can be indexed and served.

use crate::error::{LineServerError, Result};
use std::path::Path;
use tokio::fs::{self, File};

/// Validate that a file path is accessible and suitable for indexing
///
/// # Validations Performed
/// - Path exists and is a regular file (not a directory)
/// - File is not empty
/// - File can be opened for reading by the current process
///
/// Every failure is reported as `LineServerError::FileAccess`.
pub async fn validate_file_path(path: &Path) -> Result<()> {
    let metadata = fs::metadata(path).await.map_err(|e| {
        let message = match e.kind() {
            std::io::ErrorKind::NotFound => format!("File does not exist: {}", path.display()),
            _ => format!("Failed to read file metadata: {}", path.display()),
        };
        LineServerError::file_access(message, e)
    })?;

    if !metadata.is_file() {
        return Err(LineServerError::file_access(
            format!("Path is not a file: {}", path.display()),
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "Not a file"),
        ));
    }

    if metadata.len() == 0 {
        return Err(LineServerError::file_access(
            format!("File is empty: {}", path.display()),
            std::io::Error::new(std::io::ErrorKind::InvalidData, "Empty file"),
        ));
    }

    // Metadata is readable even without read permission
    File::open(path).await.map_err(|e| {
        LineServerError::file_access(
            format!("Cannot open file for reading: {}", path.display()),
            e,
        )
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    /// Create a test file with specific content
    fn create_test_file(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content)
            .expect("Failed to write test content");
        file.flush().expect("Failed to flush test file");
        file
    }

    #[tokio::test]
    async fn test_validate_valid_file() {
        let test_file = create_test_file(b"line 1\nline 2\nline 3\n");
        assert!(validate_file_path(test_file.path()).await.is_ok());
    }

    #[tokio::test]
    async fn test_validate_nonexistent_file() {
        let non_existent = Path::new("/this/file/does/not/exist.txt");
        match validate_file_path(non_existent).await.unwrap_err() {
            LineServerError::FileAccess { message, .. } => {
                assert!(message.contains("File does not exist"));
            }
            other => panic!("Expected FileAccess for non-existent file, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_validate_empty_file() {
        let empty_file = create_test_file(&[]);
        match validate_file_path(empty_file.path()).await.unwrap_err() {
            LineServerError::FileAccess { message, .. } => {
                assert!(message.contains("File is empty"));
            }
            other => panic!("Expected FileAccess for empty file, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_validate_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        match validate_file_path(temp_dir.path()).await.unwrap_err() {
            LineServerError::FileAccess { message, .. } => {
                assert!(message.contains("Path is not a file"));
            }
            other => panic!("Expected FileAccess for directory, got {other:?}"),
        }
    }
}
