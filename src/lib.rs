//! # lineserver - serve lines of large text files by number
//!
//! A file is indexed once with a sparse line index: every N-th line records the byte offset that
//! follows it. A lookup seeks to the nearest sample and reads at most N lines, so memory use stays
//! flat regardless of file size. Recently served lines are kept in a TTL cache.
//!
//! ## Architecture
//!
//! - [`error`] - Centralized error types and handling
//! - [`config`] - Runtime configuration with optional TOML loading
//! - [`file_handler`] - Validation, line counting, sparse indexing and bounded lookup
//! - [`cache`] - TTL line cache with a background sweeper
//! - [`engine`] - Lifecycle and composition of the pieces above
//! - [`server`] - HTTP transport on axum
//! - [`app`] - Wiring for the binary

// Core modules
pub mod config;
pub mod error;
pub mod file_handler;
pub mod logging;

// Core components
pub mod app;
pub mod cache;
pub mod engine;
pub mod server;

// Re-export commonly used types for convenience
pub use error::{LineServerError, Result};

// Public API surface for external usage
pub use app::Application;
pub use config::Config;
pub use engine::{EngineState, FileAccessEngine};
pub use server::LineServer;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
