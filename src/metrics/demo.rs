//! Custom pull-based collector.
//!
//! [`DemoCollector`] does not keep a value between scrapes. Each call to
//! [`Collector::collect`] draws a fresh random value, stores it in the
//! internal `test1` gauge under the configured argument and emits it.

use std::sync::{Mutex, PoisonError};

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{GaugeVec, Opts};

use crate::generator::Sampler;

/// Metric name of the generated gauge.
pub const DEMO_METRIC_NAME: &str = "test1";
/// Variable label carrying the collector argument.
pub const DEMO_LABEL: &str = "demo";

/// Collector that regenerates its gauge value on every scrape.
pub struct DemoCollector {
    gauge: GaugeVec,
    arg: String,
    sampler: Mutex<Sampler>,
}

impl DemoCollector {
    /// Creates a collector reporting under `demo="<arg>"`.
    pub fn new(arg: impl Into<String>, sampler: Sampler) -> Result<Self, prometheus::Error> {
        let gauge = GaugeVec::new(
            Opts::new(DEMO_METRIC_NAME, "This is test1"),
            &[DEMO_LABEL],
        )?;
        Ok(Self {
            gauge,
            arg: arg.into(),
            sampler: Mutex::new(sampler),
        })
    }

    /// The configured label value.
    pub fn arg(&self) -> &str {
        &self.arg
    }
}

impl Collector for DemoCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.gauge.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let value = self
            .sampler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .non_negative_int();
        self.gauge
            .with_label_values(&[self.arg.as_str()])
            .set(value as f64);
        tracing::trace!(arg = %self.arg, value, "demo gauge regenerated");
        self.gauge.collect()
    }
}
