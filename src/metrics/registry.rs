//! Metrics registry for the exporter.

use prometheus::{
    linear_buckets, Encoder, Gauge, HistogramOpts, IntCounter, IntGauge, Opts, Registry,
    TextEncoder,
};
use thiserror::Error;

use super::demo::DemoCollector;
use super::exemplar::ExemplarHistogram;
use super::summary::{SummaryOpts, SummaryVec};
use crate::config::MetricsConfig;
use crate::generator::Sampler;

/// Label distinguishing the summary's sample distributions.
pub const SUMMARY_LABEL: &str = "service";

/// Quantile objectives of `example_summary_seconds` as `(quantile, error)`.
pub const SUMMARY_OBJECTIVES: [(f64, f64); 3] = [(0.5, 0.05), (0.9, 0.01), (0.99, 0.001)];

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Error reported by the `prometheus` crate.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    /// Summary objective outside `[0, 1]`.
    #[error("invalid summary objective {quantile} (error {error}); both must be in [0, 1]")]
    InvalidObjective {
        /// Target quantile.
        quantile: f64,
        /// Allowed absolute error.
        error: f64,
    },

    /// Summary window cannot rotate with the given length and bucket count.
    #[error("invalid summary window: {0}")]
    InvalidWindow(String),

    /// Variable label name collides with a label the summary emits itself.
    #[error("label name {0:?} is reserved")]
    ReservedLabel(String),

    /// Wrong number of label values for a vector metric.
    #[error("inconsistent label cardinality: expected {expected} values, got {got}")]
    InconsistentCardinality {
        /// Number of variable labels declared.
        expected: usize,
        /// Number of values supplied.
        got: usize,
    },

    /// Exemplar label name invalid or label set too long.
    #[error("invalid exemplar: {0}")]
    InvalidExemplar(String),
}

/// Every metric the exporter serves, registered with one registry.
///
/// Built once at startup and shared behind an `Arc` by the generators
/// and the HTTP handler.
pub struct ExporterMetrics {
    registry: Registry,

    /// `example_count_total`
    pub count: IntCounter,
    /// `example_gauge_value{example="test"}`
    pub gauge: Gauge,
    /// `example_summary_seconds{service}`
    pub summary: SummaryVec,
    /// `example_histogram_seconds`
    pub histogram: ExemplarHistogram,

    demo_arg: String,
}

impl ExporterMetrics {
    /// Creates and registers all exporter metrics.
    ///
    /// `sampler` drives the values of the `test1` demo collector.
    pub fn new(config: &MetricsConfig, sampler: Sampler) -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let count = IntCounter::new("example_count_total", "The total number of exporter-demo")?;

        let gauge = Gauge::with_opts(
            Opts::new("example_gauge_value", "The current number of exporter-demo")
                .const_label("example", "test"),
        )?;

        let summary = SummaryVec::new(
            SummaryOpts::new(
                "example_summary_seconds",
                "The latency distributions Summary of exporter-demo",
            )
            .objectives(SUMMARY_OBJECTIVES.to_vec())
            .max_age(config.summary_max_age())
            .age_buckets(config.summary_age_buckets),
            &[SUMMARY_LABEL],
        )?;

        let histogram = ExemplarHistogram::with_opts(
            HistogramOpts::new(
                "example_histogram_seconds",
                "The latency distributions histogram of exporter-demo",
            )
            .buckets(linear_buckets(0.0, 5.0, 20)?),
        )?;

        let demo = DemoCollector::new(config.demo_arg.clone(), sampler)?;

        let build_info = IntGauge::with_opts(
            Opts::new(
                "exporter_demo_build_info",
                "Build information of the exporter, constant 1",
            )
            .const_label("name", env!("CARGO_PKG_NAME"))
            .const_label("version", crate::VERSION),
        )?;
        build_info.set(1);

        registry.register(Box::new(count.clone()))?;
        registry.register(Box::new(gauge.clone()))?;
        registry.register(Box::new(summary.clone()))?;
        registry.register(Box::new(histogram.clone()))?;
        registry.register(Box::new(demo))?;
        registry.register(Box::new(build_info))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        tracing::debug!(demo_arg = %config.demo_arg, "exporter metrics registered");

        Ok(Self {
            registry,
            count,
            gauge,
            summary,
            histogram,
            demo_arg: config.demo_arg.clone(),
        })
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Label value of the `test1` demo gauge.
    pub fn demo_arg(&self) -> &str {
        &self.demo_arg
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
