//! Identity of the file being served.

use crate::error::{LineServerError, Result};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Modification fingerprint captured when the file was indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub len: u64,
    /// Modification time in nanoseconds since the epoch, when the platform reports one
    pub modified_nanos: Option<u128>,
}

impl Fingerprint {
    fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        let modified_nanos = metadata
            .modified()
            .ok()
            .and_then(|time: SystemTime| time.duration_since(UNIX_EPOCH).ok())
            .map(|elapsed| elapsed.as_nanos());

        Self {
            len: metadata.len(),
            modified_nanos,
        }
    }
}

/// Path plus fingerprint of an indexed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    path: PathBuf,
    fingerprint: Fingerprint,
    identity: String,
}

impl FileHandle {
    /// Capture the current fingerprint of `path`
    pub async fn open(path: &Path) -> Result<Self> {
        let fingerprint = Self::read_fingerprint(path).await?;
        Ok(Self::with_fingerprint(path.to_path_buf(), fingerprint))
    }

    pub fn with_fingerprint(path: PathBuf, fingerprint: Fingerprint) -> Self {
        let identity = match fingerprint.modified_nanos {
            Some(nanos) => format!("{}@{}:{}", path.display(), fingerprint.len, nanos),
            None => format!("{}@{}", path.display(), fingerprint.len),
        };
        Self {
            path,
            fingerprint,
            identity,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Stable identity string used to namespace cache keys
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Whether the file on disk no longer matches the fingerprint taken at indexing time
    pub async fn is_stale(&self) -> Result<bool> {
        let current = Self::read_fingerprint(&self.path).await?;
        Ok(current != self.fingerprint)
    }

    async fn read_fingerprint(path: &Path) -> Result<Fingerprint> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            LineServerError::file_access(
                format!("Failed to read file metadata: {}", path.display()),
                e,
            )
        })?;
        Ok(Fingerprint::from_metadata(&metadata))
    }
}
