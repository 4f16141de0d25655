//! Application orchestration layer
//!
//! Wires the engine and the HTTP server together. The file is fully indexed before the listener
//! is bound, so the first accepted request can already be answered.

use crate::config::Config;
use crate::engine::FileAccessEngine;
use crate::error::Result;
use crate::server::LineServer;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

/// Application orchestrator - owns the engine and serves it over HTTP
pub struct Application {
    config: Config,
    engine: Arc<FileAccessEngine>,
}

impl Application {
    /// Create the engine and index `file_path`
    pub async fn new(file_path: &Path, config: Config) -> Result<Self> {
        config.validate()?;

        let engine = Arc::new(FileAccessEngine::new(config.engine.clone()));
        engine.initialize(file_path).await?;

        Ok(Self { config, engine })
    }

    pub fn engine(&self) -> &Arc<FileAccessEngine> {
        &self.engine
    }

    /// Serve until Ctrl-C
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serve until `shutdown` resolves, then stop background work
    pub async fn run_until(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let server = LineServer::bind(&self.config.server, Arc::clone(&self.engine)).await?;
        let result = server.run_until(shutdown).await;
        self.engine.shutdown();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LineCounterKind;
    use crate::engine::EngineState;
    use crate::error::LineServerError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.server.port = 0;
        config.engine.line_counter = LineCounterKind::Streaming;
        config
    }

    #[tokio::test]
    async fn test_new_indexes_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"first\nsecond\nthird\n").unwrap();
        file.flush().unwrap();

        let app = Application::new(file.path(), test_config()).await.unwrap();
        assert_eq!(app.engine().state(), EngineState::Ready);
        assert_eq!(app.engine().get_line(2).await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let mut config = test_config();
        config.engine.index_line_interval = 0;

        let result = Application::new(Path::new("/unused"), config).await;
        assert!(matches!(result, Err(LineServerError::Config { .. })));
    }

    #[tokio::test]
    async fn test_run_until_stops() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"only\nlines\n").unwrap();
        file.flush().unwrap();

        let app = Application::new(file.path(), test_config()).await.unwrap();
        app.run_until(async {}).await.unwrap();
    }
}
