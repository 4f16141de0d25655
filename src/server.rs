//! HTTP transport exposing `GET /lines/<n>`, built on `axum`.
//!
//! Status mapping:
//!
//! | Outcome | Status |
//! |---|---|
//! | line text | 200 |
//! | `<n>` is not all digits, unknown path or method | 404 |
//! | line out of range | 413 |
//! | index still building | 503 + `Retry-After` |
//! | anything else | 500 |
//!
//! Path segments are percent-decoded before the digit check. `HEAD` is answered like `GET`
//! without a body. Malformed requests are rejected with 400 by the HTTP layer.

use crate::config::ServerConfig;
use crate::engine::FileAccessEngine;
use crate::error::{LineServerError, Result};
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Seconds a client should wait before retrying while indexing runs
const RETRY_AFTER_SECS: u64 = 1;

/// Plain text response produced by [`route`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineResponse {
    pub status: StatusCode,
    pub body: String,
    pub retry_after: Option<u64>,
}

impl LineResponse {
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            retry_after: None,
        }
    }
}

impl IntoResponse for LineResponse {
    fn into_response(self) -> Response {
        let mut response = (
            self.status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.body,
        )
            .into_response();
        if let Some(secs) = self.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Map a request for line `param` to a response using `engine`
///
/// `param` is the already decoded path segment after `/lines/`.
pub async fn route(engine: &FileAccessEngine, method: &Method, param: &str) -> LineResponse {
    if *method != Method::GET && *method != Method::HEAD {
        return not_found();
    }

    if param.is_empty() || !param.bytes().all(|b| b.is_ascii_digit()) {
        return LineResponse::text(
            StatusCode::NOT_FOUND,
            format!("Invalid line requested: {}", param),
        );
    }

    log::info!("Processing request for line: {}", param);

    // All digits, so parsing only fails on overflow, which is out of range for any file
    let Ok(line) = param.parse::<u64>() else {
        return invalid_line(param);
    };

    match engine.get_line(line).await {
        Ok(text) => LineResponse::text(StatusCode::OK, text),
        Err(e) if e.is_client_error() => {
            log::debug!("Rejected request for line {}: {}", line, e);
            invalid_line(param)
        }
        Err(e) if e.is_retryable() => LineResponse {
            retry_after: Some(RETRY_AFTER_SECS),
            ..LineResponse::text(StatusCode::SERVICE_UNAVAILABLE, "File index is not ready yet")
        },
        Err(e) => {
            log::error!("Failed to serve line {}: {}", line, e);
            LineResponse::text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

fn invalid_line(param: &str) -> LineResponse {
    LineResponse::text(
        StatusCode::PAYLOAD_TOO_LARGE,
        format!("Invalid line requested: {}", param),
    )
}

fn not_found() -> LineResponse {
    LineResponse::text(StatusCode::NOT_FOUND, "Not Found")
}

/// Router serving lines from `engine`
pub fn router(engine: Arc<FileAccessEngine>) -> Router {
    Router::new()
        .route("/lines/{line}", any(lines_handler))
        .fallback(|| async { not_found() })
        .with_state(engine)
}

async fn lines_handler(
    State(engine): State<Arc<FileAccessEngine>>,
    method: Method,
    Path(param): Path<String>,
) -> LineResponse {
    route(&engine, &method, &param).await
}

/// TCP listener serving lines from a shared engine
pub struct LineServer {
    listener: TcpListener,
    engine: Arc<FileAccessEngine>,
}

impl LineServer {
    /// Bind `hostname:port` from `config`. Port 0 picks a free port.
    pub async fn bind(config: &ServerConfig, engine: Arc<FileAccessEngine>) -> Result<Self> {
        let address = format!("{}:{}", config.hostname, config.port);
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| LineServerError::network(format!("Unable to bind {}", address), e))?;
        Ok(Self { listener, engine })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| LineServerError::network("Failed to read listener address", e))
    }

    /// Accept connections forever
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves, then drain open connections
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        log::info!("HTTP server listening on {}", self.local_addr()?);

        axum::serve(self.listener, router(self.engine))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| LineServerError::network("HTTP server failed", e))?;

        log::info!("HTTP server shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, LineCounterKind};
    use std::io::Write;
    use tempfile::NamedTempFile;

    async fn ready_engine(content: &[u8]) -> (NamedTempFile, FileAccessEngine) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();

        let engine = FileAccessEngine::new(EngineConfig {
            index_line_interval: 2,
            line_counter: LineCounterKind::Streaming,
            ..EngineConfig::default()
        });
        engine.initialize(file.path()).await.unwrap();
        (file, engine)
    }

    #[tokio::test]
    async fn test_route_success() {
        let (_file, engine) = ready_engine(b"zero\none\ntwo\n").await;
        assert_eq!(
            route(&engine, &Method::GET, "2").await,
            LineResponse::text(StatusCode::OK, "one")
        );
        assert_eq!(
            route(&engine, &Method::HEAD, "1").await,
            LineResponse::text(StatusCode::OK, "zero")
        );
    }

    #[tokio::test]
    async fn test_route_rejections() {
        let (_file, engine) = ready_engine(b"zero\none\ntwo\n").await;

        assert_eq!(
            route(&engine, &Method::GET, "abc").await,
            LineResponse::text(StatusCode::NOT_FOUND, "Invalid line requested: abc")
        );
        assert_eq!(route(&engine, &Method::GET, "-1").await.status, StatusCode::NOT_FOUND);
        assert_eq!(route(&engine, &Method::GET, "").await.status, StatusCode::NOT_FOUND);
        assert_eq!(
            route(&engine, &Method::POST, "1").await,
            LineResponse::text(StatusCode::NOT_FOUND, "Not Found")
        );

        assert_eq!(
            route(&engine, &Method::GET, "0").await,
            LineResponse::text(StatusCode::PAYLOAD_TOO_LARGE, "Invalid line requested: 0")
        );
        assert_eq!(
            route(&engine, &Method::GET, "3").await.status,
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            route(&engine, &Method::GET, "99999999999999999999999").await.status,
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[tokio::test]
    async fn test_route_not_ready() {
        let engine = FileAccessEngine::new(EngineConfig::default());
        let response = route(&engine, &Method::GET, "1").await;
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.retry_after, Some(1));
    }

    #[test]
    fn test_into_response_headers() {
        let response = LineResponse {
            retry_after: Some(1),
            ..LineResponse::text(StatusCode::SERVICE_UNAVAILABLE, "later")
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], "1");
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
    }
}
