//! File access engine: the composition root of counting, indexing, lookup and caching.
//!
//! Lifecycle: `Uninitialized -> Indexing -> Ready`. Only a successful indexing pass reaches
//! `Ready`; a failed one drops back to `Uninitialized`. Lines are served only in `Ready`, and the
//! index is written exactly once before that transition, so reads need no locking afterwards.

use crate::cache::{CacheKey, CacheStats, Clock, LineCache, SystemClock};
use crate::config::{EngineConfig, LineCounterKind};
use crate::error::{LineServerError, Result};
use crate::file_handler::{
    build_index_with_progress, validate_file_path, ExternalLineCounter, FileHandle, FileMetadata,
    LineCounter, LineLocator, ScanRange, SparseIndex, StreamingLineCounter,
};
use parking_lot::Mutex;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Lifecycle state of a [`FileAccessEngine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Indexing,
    Ready,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Indexing => "indexing",
            Self::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Counters exposed for monitoring and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub cache: CacheStats,
    /// Bounded file scans performed
    pub scans: u64,
}

/// Everything produced by a successful indexing pass
#[derive(Debug)]
struct IndexedFile {
    handle: FileHandle,
    identity: Arc<str>,
    locator: LineLocator,
}

/// Serves lines of one file by number
pub struct FileAccessEngine {
    config: EngineConfig,
    counter: Arc<dyn LineCounter>,
    /// Fall back to the index pass count when the counter cannot resolve one
    count_fallback: bool,
    cache: Arc<LineCache>,
    state: watch::Sender<EngineState>,
    indexed: OnceLock<IndexedFile>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl FileAccessEngine {
    /// Create an uninitialized engine using the counter selected in `config`
    pub fn new(config: EngineConfig) -> Self {
        let counter: Arc<dyn LineCounter> = match config.line_counter {
            LineCounterKind::External | LineCounterKind::ExternalStrict => {
                Arc::new(ExternalLineCounter::new())
            }
            LineCounterKind::Streaming => Arc::new(StreamingLineCounter::new()),
        };
        let count_fallback = config.line_counter == LineCounterKind::External;
        let cache = Arc::new(LineCache::with_clock(&config.cache, Arc::new(SystemClock)));
        let (state, _) = watch::channel(EngineState::Uninitialized);

        Self {
            config,
            counter,
            count_fallback,
            cache,
            state,
            indexed: OnceLock::new(),
            sweeper: Mutex::new(None),
        }
    }

    /// Replace the line counter. Counting failures of a custom counter are fatal.
    pub fn with_line_counter(mut self, counter: Arc<dyn LineCounter>) -> Self {
        self.counter = counter;
        self.count_fallback = false;
        self
    }

    /// Replace the cache clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.cache = Arc::new(LineCache::with_clock(&self.config.cache, clock));
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == EngineState::Ready
    }

    /// Count and index the file at `path`, then start serving lines
    ///
    /// # Errors
    /// * `Config` if the engine configuration is unusable
    /// * `InvalidState` unless the engine is `Uninitialized`
    /// * `FileAccess` if the file is missing, not a regular file, empty or unreadable
    /// * `CountResolution` if the line count cannot be determined
    pub async fn initialize(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.config.validate()?;

        let started = self.state.send_if_modified(|state| {
            if *state == EngineState::Uninitialized {
                *state = EngineState::Indexing;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(LineServerError::invalid_state(format!(
                "cannot initialize an engine that is {}",
                self.state()
            )));
        }

        // Dropping this future mid-pass must not leave the engine stuck in Indexing
        let mut guard = IndexingGuard {
            state: &self.state,
            armed: true,
        };

        let indexed = match self.index_file(path).await {
            Ok(indexed) => indexed,
            Err(e) => {
                log::error!("Failed to index {}: {}", path.display(), e);
                return Err(e);
            }
        };
        let total_lines = indexed.locator.metadata().total_lines;

        self.indexed
            .set(indexed)
            .map_err(|_| LineServerError::invalid_state("engine was already indexed"))?;
        guard.armed = false;
        self.state.send_replace(EngineState::Ready);

        let sweeper = self.cache.spawn_sweeper(self.config.cache.check_period());
        if let Some(previous) = self.sweeper.lock().replace(sweeper) {
            previous.abort();
        }

        log::info!(
            "Successfully opened {} containing {} lines",
            path.display(),
            total_lines
        );
        Ok(())
    }

    /// Wait until the engine is `Ready`
    ///
    /// Returns `NotReady` if an indexing pass observed while waiting fails.
    pub async fn wait_ready(&self) -> Result<()> {
        let mut rx = self.state.subscribe();
        let mut saw_indexing = false;
        loop {
            let current = *rx.borrow_and_update();
            match current {
                EngineState::Ready => return Ok(()),
                EngineState::Indexing => saw_indexing = true,
                EngineState::Uninitialized if saw_indexing => {
                    return Err(LineServerError::NotReady)
                }
                EngineState::Uninitialized => {}
            }
            rx.changed().await.map_err(|_| LineServerError::NotReady)?;
        }
    }

    /// Text of line `line`, served from cache when possible
    ///
    /// # Errors
    /// * `NotReady` before indexing has completed
    /// * `InvalidLineNumber` for `line == 0` or `line >= total_lines`
    /// * `FileAccess` if the file cannot be read
    /// * `LineNotFound` if the index does not match the file
    pub async fn get_line(&self, line: u64) -> Result<String> {
        let indexed = self.indexed()?;
        indexed.locator.validate(line)?;

        let key = CacheKey::new(Arc::clone(&indexed.identity), line);
        if let Some(text) = self.cache.get(&key) {
            return Ok(text);
        }

        log::debug!("Retrieving line #{} from the file", line);
        let text = indexed.locator.locate(line).await?;
        self.cache.put(key, text.clone());
        Ok(text)
    }

    /// Byte window a lookup of `line` would scan
    pub fn scan_range(&self, line: u64) -> Result<ScanRange> {
        self.indexed()?.locator.scan_range(line)
    }

    pub fn metadata(&self) -> Option<FileMetadata> {
        self.indexed.get().map(|indexed| indexed.locator.metadata())
    }

    pub fn index(&self) -> Option<&SparseIndex> {
        self.indexed.get().map(|indexed| indexed.locator.index())
    }

    pub fn file_handle(&self) -> Option<&FileHandle> {
        self.indexed.get().map(|indexed| &indexed.handle)
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            cache: self.cache.stats(),
            scans: self
                .indexed
                .get()
                .map(|indexed| indexed.locator.scans())
                .unwrap_or(0),
        }
    }

    /// Stop background cache maintenance
    pub fn shutdown(&self) {
        if let Some(sweeper) = self.sweeper.lock().take() {
            sweeper.abort();
        }
    }

    fn indexed(&self) -> Result<&IndexedFile> {
        self.indexed.get().ok_or(LineServerError::NotReady)
    }

    async fn index_file(&self, path: &Path) -> Result<IndexedFile> {
        validate_file_path(path).await?;
        let handle = FileHandle::open(path).await?;

        let expected_lines = self.resolve_line_count(path).await?;
        let (index, metadata) =
            build_index_with_progress(path, self.config.index_line_interval, expected_lines)
                .await?;

        if let Some(counted) = expected_lines {
            if counted.abs_diff(metadata.total_lines) > 1 {
                log::warn!(
                    "Line counter reported {} lines but indexing found {}; the file may have changed",
                    counted,
                    metadata.total_lines
                );
            }
        }

        let identity: Arc<str> = Arc::from(handle.identity());
        Ok(IndexedFile {
            locator: LineLocator::new(path, Arc::new(index), metadata),
            handle,
            identity,
        })
    }

    /// Line count ahead of indexing, or `None` when the index pass provides it
    async fn resolve_line_count(&self, path: &Path) -> Result<Option<u64>> {
        if self.counter.shares_index_pass() {
            log::debug!(
                "Counting lines during the index pass ({} counter)",
                self.counter.name()
            );
            return Ok(None);
        }

        match self.counter.count(path).await {
            Ok(count) => {
                log::info!(
                    "Counted {} lines with the {} counter",
                    count,
                    self.counter.name()
                );
                Ok(Some(count))
            }
            Err(e @ LineServerError::CountResolution { .. }) if self.count_fallback => {
                log::warn!("{}; counting lines during the index pass instead", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

impl fmt::Debug for FileAccessEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileAccessEngine")
            .field("state", &self.state())
            .field("counter", &self.counter.name())
            .field("metadata", &self.metadata())
            .finish()
    }
}

impl Drop for FileAccessEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Resets the state to `Uninitialized` unless disarmed
struct IndexingGuard<'a> {
    state: &'a watch::Sender<EngineState>,
    armed: bool,
}

impl Drop for IndexingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.send_replace(EngineState::Uninitialized);
        }
    }
}
