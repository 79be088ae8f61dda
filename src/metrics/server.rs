//! HTTP server for the Prometheus metrics endpoint.

use crate::metrics::ExporterMetrics;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Errors that can occur during metrics server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Listener could not be bound.
    #[error("failed to bind to address: {0}")]
    Bind(#[from] std::io::Error),

    /// Serving failed after the listener was bound.
    #[error("server error: {0}")]
    Server(String),
}

/// Configuration for the metrics server.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    /// Address to bind the server to.
    pub bind_addr: SocketAddr,
}

/// HTTP server for exposing Prometheus metrics.
pub struct MetricsServer {
    config: MetricsServerConfig,
    metrics: Arc<ExporterMetrics>,
}

impl MetricsServer {
    /// Creates a new metrics server.
    pub fn new(config: MetricsServerConfig, metrics: Arc<ExporterMetrics>) -> Self {
        Self { config, metrics }
    }

    /// Builds the router serving `/metrics` and `/health`.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(&self.metrics))
    }

    /// Binds the configured address and serves until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` fires.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "Metrics server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| ServerError::Server(e.to_string()))?;

        tracing::info!("Metrics server stopped");
        Ok(())
    }
}

/// Handler for the /metrics endpoint.
async fn metrics_handler(State(metrics): State<Arc<ExporterMetrics>>) -> impl IntoResponse {
    match metrics.encode() {
        Ok(output) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain; charset=utf-8")],
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

/// Handler for the /health endpoint.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricsConfig;
    use crate::generator::{self, Sampler};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::task::JoinHandle;

    fn test_metrics(seed: u64) -> Arc<ExporterMetrics> {
        let metrics = ExporterMetrics::new(&MetricsConfig::default(), Sampler::from_seed(seed));
        Arc::new(metrics.unwrap())
    }

    async fn http_get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            path, addr
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    async fn start(
        metrics: Arc<ExporterMetrics>,
        shutdown: &CancellationToken,
    ) -> (SocketAddr, JoinHandle<Result<(), ServerError>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = MetricsServer::new(MetricsServerConfig { bind_addr: addr }, metrics);
        let handle = tokio::spawn(server.serve(listener, shutdown.clone()));
        (addr, handle)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let metrics = test_metrics(1);
        let shutdown = CancellationToken::new();
        let (addr, handle) = start(metrics, &shutdown).await;

        let response = http_get(addr, "/health").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("OK"));

        shutdown.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_scrape_after_one_cycle() {
        let metrics = test_metrics(2);
        let shutdown = CancellationToken::new();

        // Long interval: only the immediate first step runs.
        let mut sampler = Sampler::from_seed(3);
        let generators = generator::spawn_all(
            Arc::clone(&metrics),
            &mut sampler,
            Duration::from_secs(3600),
            &shutdown,
        );
        while metrics.count.get() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let (addr, handle) = start(Arc::clone(&metrics), &shutdown).await;
        let response = http_get(addr, "/metrics").await;

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("text/plain; version=0.0.4"));
        assert!(response.contains("example_count_total 1\n"));
        assert!(response.contains("example_gauge_value{example=\"test\"} 10\n"));
        assert!(response.contains("test1{demo=\"hello\"} "));
        assert!(response.contains("example_histogram_seconds_bucket{le=\"+Inf\"}"));

        shutdown.cancel();
        handle.await.unwrap().unwrap();
        generators.join().await;
    }

    #[tokio::test]
    async fn test_bind_conflict_reported() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = occupied.local_addr().unwrap();
        let metrics = test_metrics(4);

        let server = MetricsServer::new(MetricsServerConfig { bind_addr: addr }, metrics);
        let result = server.run(CancellationToken::new()).await;
        assert!(matches!(result, Err(ServerError::Bind(_))));
    }
}
