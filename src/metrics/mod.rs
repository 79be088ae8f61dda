//! Prometheus metrics served by the exporter.
//!
//! All metrics live in one [`ExporterMetrics`] registry, created once at
//! startup and exposed in Prometheus text format via an HTTP endpoint.
//!
//! # Metrics Exposed
//!
//! - `example_count_total` - Counter, +1 per generator cycle
//! - `example_gauge_value{example="test"}` - Gauge, +10 per generator cycle
//! - `example_summary_seconds{service}` - Summary of uniform, normal and
//!   exponential samples; quantiles 0.5, 0.9 and 0.99
//! - `example_histogram_seconds` - Histogram of normal samples, 20 linear
//!   buckets of width 5 starting at 0, with `dummyID` exemplars
//! - `test1{demo}` - Gauge regenerated on every scrape by [`DemoCollector`]
//! - `exporter_demo_build_info{name, version}` - Constant 1
//! - `process_*` - Process metrics (Linux only)
//!
//! # Example
//!
//! ```no_run
//! use exporter_demo::config::MetricsConfig;
//! use exporter_demo::generator::Sampler;
//! use exporter_demo::metrics::ExporterMetrics;
//!
//! let metrics = ExporterMetrics::new(&MetricsConfig::default(), Sampler::from_os_entropy())
//!     .expect("Failed to create registry");
//!
//! metrics.count.inc();
//! metrics.summary.with_label_values(&["uniform"]).observe(0.3);
//!
//! println!("{}", metrics.encode().unwrap());
//! ```

mod demo;
mod exemplar;
mod quantile;
mod registry;
mod server;
mod summary;

pub use demo::{DemoCollector, DEMO_LABEL, DEMO_METRIC_NAME};
pub use exemplar::{Exemplar, ExemplarHistogram, EXEMPLAR_MAX_RUNES};
pub use quantile::{QuantileStream, Target};
pub use registry::{ExporterMetrics, MetricsError, SUMMARY_LABEL, SUMMARY_OBJECTIVES};
pub use server::{MetricsServer, MetricsServerConfig, ServerError};
pub use summary::{Summary, SummaryOpts, SummaryVec, MAX_AGE_BUCKETS};
