//! File handling: validation, line counting, sparse indexing and bounded line lookup.
//!
//! Nothing in this module reads a whole file into memory. Counting and indexing stream the file
//! once in fixed-size chunks; lookups seek to an indexed offset and read only up to the next
//! index sample.

pub mod handle;
pub mod line_counter;
pub mod locator;
mod scan;
pub mod sparse_index;
pub mod validation;

pub use handle::{FileHandle, Fingerprint};
pub use line_counter::{ExternalLineCounter, LineCounter, StreamingLineCounter};
pub use locator::{LineLocator, ScanRange};
pub use sparse_index::{
    build_index, build_index_with_progress, FileMetadata, SparseIndex, MIN_INDEX_INTERVAL,
};
pub use validation::validate_file_path;
