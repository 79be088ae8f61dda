//! Histogram with per-bucket exemplars.
//!
//! An exemplar is a small label set (typically a trace or request ID)
//! attached to one observation. [`ExemplarHistogram`] keeps the most
//! recent exemplar of every bucket next to a regular
//! [`prometheus::Histogram`].
//!
//! The 0.0.4 text exposition format has no exemplar syntax, so
//! exemplars are not part of the scraped output; read them through
//! [`ExemplarHistogram::exemplars`].

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Histogram, HistogramOpts};

use super::MetricsError;

/// Maximum combined character length of exemplar label names and values.
pub const EXEMPLAR_MAX_RUNES: usize = 128;

/// A labeled sample attached to a histogram observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Exemplar {
    /// Exemplar labels, sorted by name.
    pub labels: BTreeMap<String, String>,
    /// The observed value.
    pub value: f64,
    /// Wall-clock time of the observation.
    pub timestamp: SystemTime,
}

/// A histogram that remembers the latest exemplar of each bucket.
#[derive(Clone)]
pub struct ExemplarHistogram {
    histogram: Histogram,
    upper_bounds: Arc<[f64]>,
    // One slot per upper bound plus the implicit +Inf bucket.
    exemplars: Arc<Mutex<Vec<Option<Exemplar>>>>,
}

impl ExemplarHistogram {
    /// Creates the histogram. Empty buckets fall back to
    /// [`prometheus::DEFAULT_BUCKETS`].
    pub fn with_opts(mut opts: HistogramOpts) -> Result<Self, MetricsError> {
        if opts.buckets.is_empty() {
            opts.buckets = prometheus::DEFAULT_BUCKETS.to_vec();
        }
        let upper_bounds: Arc<[f64]> = opts.buckets.clone().into();
        let histogram = Histogram::with_opts(opts)?;

        Ok(Self {
            histogram,
            exemplars: Arc::new(Mutex::new(vec![None; upper_bounds.len() + 1])),
            upper_bounds,
        })
    }

    /// Observes `value` without an exemplar.
    pub fn observe(&self, value: f64) {
        self.histogram.observe(value);
    }

    /// Observes `value` and records `labels` as the bucket's exemplar.
    ///
    /// Invalid exemplars are rejected and the value is not observed.
    pub fn observe_with_exemplar(
        &self,
        value: f64,
        labels: &[(&str, &str)],
    ) -> Result<(), MetricsError> {
        let labels = validate_exemplar_labels(labels)?;
        self.histogram.observe(value);

        let idx = self.bucket_index(value);
        let exemplar = Exemplar {
            labels,
            value,
            timestamp: SystemTime::now(),
        };
        self.exemplars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)[idx] = Some(exemplar);
        Ok(())
    }

    /// Snapshot of the latest exemplar per bucket; the last slot belongs
    /// to the `+Inf` bucket.
    pub fn exemplars(&self) -> Vec<Option<Exemplar>> {
        self.exemplars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the wrapped histogram.
    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    fn bucket_index(&self, value: f64) -> usize {
        self.upper_bounds.partition_point(|&bound| bound < value)
    }
}

impl Collector for ExemplarHistogram {
    fn desc(&self) -> Vec<&Desc> {
        self.histogram.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.histogram.collect()
    }
}

fn validate_exemplar_labels(
    labels: &[(&str, &str)],
) -> Result<BTreeMap<String, String>, MetricsError> {
    let mut runes = 0;
    let mut validated = BTreeMap::new();
    for &(name, value) in labels {
        if !is_valid_label_name(name) {
            return Err(MetricsError::InvalidExemplar(format!(
                "invalid label name {:?}",
                name
            )));
        }
        runes += name.chars().count() + value.chars().count();
        validated.insert(name.to_string(), value.to_string());
    }
    if runes > EXEMPLAR_MAX_RUNES {
        return Err(MetricsError::InvalidExemplar(format!(
            "labels have {} characters, limit is {}",
            runes, EXEMPLAR_MAX_RUNES
        )));
    }
    Ok(validated)
}

fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    !name.starts_with("__") && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
