//! Runtime configuration.
//!
//! Every option has a built-in default matching the classic line server setup: samples every
//! 5000 lines, cache entries live for 100 seconds and expired entries are swept every 200 seconds.
//! With the `config` feature enabled the same structure can be read from a TOML file:
//!
//! ```toml
//! [server]
//! hostname = "127.0.0.1"
//! port = 3000
//!
//! [engine]
//! index_line_interval = 5000
//! line_counter = "external"
//!
//! [engine.cache]
//! ttl_secs = 100
//! check_period_secs = 200
//! ```

use crate::error::{LineServerError, Result};
use crate::file_handler::MIN_INDEX_INTERVAL;
use std::time::Duration;

#[cfg(feature = "config")]
use serde::Deserialize;
#[cfg(feature = "config")]
use std::path::{Path, PathBuf};

/// Default spacing between sampled lines in the sparse index
pub const DEFAULT_INDEX_LINE_INTERVAL: u64 = 5000;
/// Default cache entry lifetime in seconds
pub const DEFAULT_CACHE_TTL_SECS: u64 = 100;
/// Default period of the expired-entry sweep in seconds
pub const DEFAULT_CACHE_CHECK_PERIOD_SECS: u64 = 200;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Deserialize))]
#[cfg_attr(feature = "config", serde(default, deny_unknown_fields))]
pub struct Config {
    pub server: ServerConfig,
    pub engine: EngineConfig,
}

/// Listener settings for the HTTP transport
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Deserialize))]
#[cfg_attr(feature = "config", serde(default, deny_unknown_fields))]
pub struct ServerConfig {
    pub hostname: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// How the engine determines the line count before indexing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "kebab-case"))]
pub enum LineCounterKind {
    /// `wc -l`, falling back to the index pass count when unavailable
    #[default]
    External,
    /// `wc -l`; failure aborts initialization
    ExternalStrict,
    /// No separate count; the index pass provides it
    Streaming,
}

/// Settings consumed by the file access engine
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Deserialize))]
#[cfg_attr(feature = "config", serde(default, deny_unknown_fields))]
pub struct EngineConfig {
    /// Lines between index samples
    pub index_line_interval: u64,
    pub line_counter: LineCounterKind,
    pub cache: CacheConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            index_line_interval: DEFAULT_INDEX_LINE_INTERVAL,
            line_counter: LineCounterKind::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// Line cache settings. Times are in seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Deserialize))]
#[cfg_attr(feature = "config", serde(default, deny_unknown_fields))]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub check_period_secs: u64,
    /// Optional upper bound on cached lines; unbounded when unset
    pub max_entries: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
            check_period_secs: DEFAULT_CACHE_CHECK_PERIOD_SECS,
            max_entries: None,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn check_period(&self) -> Duration {
        Duration::from_secs(self.check_period_secs)
    }
}

impl EngineConfig {
    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.index_line_interval < MIN_INDEX_INTERVAL {
            return Err(LineServerError::config(format!(
                "index_line_interval must be at least {}",
                MIN_INDEX_INTERVAL
            )));
        }
        if self.cache.check_period_secs == 0 {
            return Err(LineServerError::config(
                "cache.check_period_secs must be greater than zero",
            ));
        }
        if self.cache.max_entries == Some(0) {
            return Err(LineServerError::config(
                "cache.max_entries must be greater than zero when set",
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Reject values the server or the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        if self.server.hostname.trim().is_empty() {
            return Err(LineServerError::config("server.hostname must not be empty"));
        }
        Ok(())
    }
}

#[cfg(feature = "config")]
impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| LineServerError::config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit file path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LineServerError::file_access(
                format!("Failed to read configuration file: {}", path.display()),
                e,
            )
        })?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from the default location, falling back to defaults when the file
    /// does not exist
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from_path(&path),
            _ => {
                log::debug!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// `<config_dir>/lineserver/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("lineserver").join("config.toml"))
    }
}
