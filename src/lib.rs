//! Exporter Demo Library
//!
//! A demonstration Prometheus exporter. Background generators produce
//! synthetic counter, gauge, summary and histogram observations; an HTTP
//! endpoint serves them in the Prometheus text exposition format.
//!
//! # Architecture
//!
//! ```text
//! generators ──mutate──▶ ExporterMetrics ◀──gather── GET /metrics
//!                             │
//!                      DemoCollector (value drawn per scrape)
//! ```
//!
//! # Design Principles
//!
//! - **Pull model**: nothing is pushed; every scrape gathers all collectors
//! - **Process-scoped state**: metrics are built once and shared by `Arc`
//! - **Cancellable**: generators and server stop on a shared token
//! - **Reproducible**: a seed makes every sample sequence deterministic
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use exporter_demo::{
//!     config::FileConfig,
//!     generator::{self, Sampler},
//!     metrics::{ExporterMetrics, MetricsServer, MetricsServerConfig},
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FileConfig::default();
//! let mut sampler = Sampler::new(config.generator.seed);
//! let metrics = Arc::new(ExporterMetrics::new(&config.metrics, sampler.fork())?);
//!
//! let shutdown = CancellationToken::new();
//! let generators = generator::spawn_all(
//!     Arc::clone(&metrics),
//!     &mut sampler,
//!     config.generator.interval(),
//!     &shutdown,
//! );
//!
//! let server_config = MetricsServerConfig {
//!     bind_addr: config.server.socket_addr()?,
//! };
//! MetricsServer::new(server_config, metrics).run(shutdown.clone()).await?;
//! generators.join().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod generator;
pub mod metrics;

// Re-export commonly used types at crate root
pub use config::{Cli, ConfigError, FileConfig};
pub use generator::{Generator, Sampler};
pub use metrics::{DemoCollector, ExporterMetrics, MetricsError, MetricsServer, ServerError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
