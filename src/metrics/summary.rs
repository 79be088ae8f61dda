//! Label-partitioned summary metric.
//!
//! The `prometheus` crate ships counters, gauges and histograms but no
//! client-side summary. [`SummaryVec`] fills that gap: it implements
//! [`Collector`] and emits `SUMMARY` metric families with a cumulative
//! sum and count plus quantile estimates over a sliding time window.
//!
//! # Sliding window
//!
//! Each child keeps `age_buckets` quantile streams. Every observation is
//! inserted into all of them. The streams are reset in rotation, one every
//! `max_age / age_buckets`, and queries are answered by the oldest live
//! stream (the head), so estimates cover roughly the last `max_age`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use prometheus::core::{Collector, Desc};
use prometheus::proto::{LabelPair, Metric, MetricFamily, MetricType, Quantile};

use super::quantile::{QuantileStream, Target};
use super::MetricsError;

/// Default duration for which observations stay relevant.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(10 * 60);
/// Default number of streams the window is split into.
pub const DEFAULT_AGE_BUCKETS: u32 = 5;
/// Default insert buffer size of each stream.
pub const DEFAULT_BUF_CAP: usize = 500;
/// Upper bound on the number of window buckets.
pub const MAX_AGE_BUCKETS: u32 = 100;

const QUANTILE_LABEL: &str = "quantile";

/// Options for creating a [`SummaryVec`].
#[derive(Debug, Clone)]
pub struct SummaryOpts {
    /// Fully-qualified metric name.
    pub name: String,
    /// Help text.
    pub help: String,
    /// `(quantile, absolute error)` pairs to estimate.
    pub objectives: Vec<(f64, f64)>,
    /// Duration covered by the sliding window.
    pub max_age: Duration,
    /// Number of rotating streams in the window.
    pub age_buckets: u32,
    /// Insert buffer size of each stream.
    pub buf_cap: usize,
}

impl SummaryOpts {
    /// Creates options with no objectives and the default window.
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            objectives: Vec::new(),
            max_age: DEFAULT_MAX_AGE,
            age_buckets: DEFAULT_AGE_BUCKETS,
            buf_cap: DEFAULT_BUF_CAP,
        }
    }

    /// Sets the quantile objectives.
    pub fn objectives(mut self, objectives: Vec<(f64, f64)>) -> Self {
        self.objectives = objectives;
        self
    }

    /// Sets the window length.
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Sets the number of window buckets.
    pub fn age_buckets(mut self, age_buckets: u32) -> Self {
        self.age_buckets = age_buckets;
        self
    }

    /// Validates objectives and window parameters.
    pub fn validate(&self) -> Result<(), MetricsError> {
        for &(quantile, error) in &self.objectives {
            if !(0.0..=1.0).contains(&quantile) || !(0.0..=1.0).contains(&error) {
                return Err(MetricsError::InvalidObjective { quantile, error });
            }
        }
        if self.age_buckets == 0 || self.age_buckets > MAX_AGE_BUCKETS {
            return Err(MetricsError::InvalidWindow(format!(
                "age_buckets must be between 1 and {}",
                MAX_AGE_BUCKETS
            )));
        }
        if self.max_age.is_zero() {
            return Err(MetricsError::InvalidWindow(
                "max_age must be positive".to_string(),
            ));
        }
        // Rotation advances by this step; it must not truncate to zero.
        if (self.max_age / self.age_buckets).is_zero() {
            return Err(MetricsError::InvalidWindow(format!(
                "max_age {:?} is too short for {} age buckets",
                self.max_age, self.age_buckets
            )));
        }
        Ok(())
    }

    fn targets(&self) -> Vec<Target> {
        self.objectives
            .iter()
            .map(|&(quantile, error)| Target { quantile, error })
            .collect()
    }

    fn sorted_quantiles(&self) -> Vec<f64> {
        let mut quantiles: Vec<f64> = self.objectives.iter().map(|&(q, _)| q).collect();
        quantiles.sort_by(f64::total_cmp);
        quantiles
    }
}

/// Rotating set of quantile streams.
#[derive(Debug)]
struct Window {
    streams: Vec<QuantileStream>,
    head: usize,
    head_expires: Instant,
    bucket_duration: Duration,
}

impl Window {
    fn new(opts: &SummaryOpts, now: Instant) -> Self {
        let bucket_duration = opts.max_age / opts.age_buckets;
        let targets = opts.targets();
        let streams = (0..opts.age_buckets)
            .map(|_| QuantileStream::new(targets.clone(), opts.buf_cap))
            .collect();
        Self {
            streams,
            head: 0,
            head_expires: now + bucket_duration,
            bucket_duration,
        }
    }

    /// Resets every stream whose turn has passed by `now`.
    fn rotate(&mut self, now: Instant) {
        if now < self.head_expires {
            return;
        }
        let step = self.bucket_duration.as_nanos();
        let expired = (now - self.head_expires).as_nanos() / step + 1;
        // Past a full cycle every stream is empty anyway.
        let resets = expired.min(self.streams.len() as u128) as usize;
        for _ in 0..resets {
            self.streams[self.head].reset();
            self.head = (self.head + 1) % self.streams.len();
        }
        let skipped = (expired * step).min(u64::MAX as u128) as u64;
        self.head_expires += Duration::from_nanos(skipped);
    }

    fn insert(&mut self, value: f64, now: Instant) {
        self.rotate(now);
        for stream in &mut self.streams {
            stream.insert(value);
        }
    }

    fn query(&mut self, q: f64, now: Instant) -> f64 {
        self.rotate(now);
        self.streams[self.head].query(q).unwrap_or(f64::NAN)
    }
}

#[derive(Debug)]
struct SummaryCore {
    sum: f64,
    count: u64,
    window: Window,
}

/// A single summary child, identified by its label values.
///
/// Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct Summary {
    core: Arc<Mutex<SummaryCore>>,
    quantiles: Arc<[f64]>,
    label_pairs: Arc<[LabelPair]>,
}

impl Summary {
    fn new(opts: &SummaryOpts, label_pairs: Vec<LabelPair>) -> Self {
        Self {
            core: Arc::new(Mutex::new(SummaryCore {
                sum: 0.0,
                count: 0,
                window: Window::new(opts, Instant::now()),
            })),
            quantiles: opts.sorted_quantiles().into(),
            label_pairs: label_pairs.into(),
        }
    }

    /// Records one observation.
    pub fn observe(&self, value: f64) {
        self.observe_at(value, Instant::now());
    }

    fn observe_at(&self, value: f64, now: Instant) {
        let mut core = self.core.lock().unwrap_or_else(PoisonError::into_inner);
        core.sum += value;
        core.count += 1;
        core.window.insert(value, now);
    }

    /// Total number of observations.
    pub fn get_sample_count(&self) -> u64 {
        self.core
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .count
    }

    /// Sum of all observations.
    pub fn get_sample_sum(&self) -> f64 {
        self.core.lock().unwrap_or_else(PoisonError::into_inner).sum
    }

    /// Current estimate for quantile `q` over the window; `NaN` when the
    /// window is empty.
    pub fn quantile(&self, q: f64) -> f64 {
        let mut core = self.core.lock().unwrap_or_else(PoisonError::into_inner);
        core.window.query(q, Instant::now())
    }

    fn metric_at(&self, now: Instant) -> Metric {
        let mut core = self.core.lock().unwrap_or_else(PoisonError::into_inner);

        let mut summary = prometheus::proto::Summary::default();
        summary.set_sample_count(core.count);
        summary.set_sample_sum(core.sum);
        for &q in self.quantiles.iter() {
            let mut quantile = Quantile::default();
            quantile.set_quantile(q);
            quantile.set_value(core.window.query(q, now));
            summary.mut_quantile().push(quantile);
        }
        drop(core);

        let mut metric = Metric::default();
        for pair in self.label_pairs.iter() {
            metric.mut_label().push(pair.clone());
        }
        metric.set_summary(summary);
        metric
    }
}

struct SummaryVecCore {
    desc: Desc,
    opts: SummaryOpts,
    label_names: Vec<String>,
    children: RwLock<HashMap<Vec<String>, Summary>>,
}

/// A summary partitioned by variable labels.
#[derive(Clone)]
pub struct SummaryVec {
    core: Arc<SummaryVecCore>,
}

impl SummaryVec {
    /// Creates a summary vector. Fails on invalid options, invalid metric
    /// or label names, or a `quantile` label.
    pub fn new(opts: SummaryOpts, label_names: &[&str]) -> Result<Self, MetricsError> {
        opts.validate()?;
        if label_names.contains(&QUANTILE_LABEL) {
            return Err(MetricsError::ReservedLabel(QUANTILE_LABEL.to_string()));
        }

        let label_names: Vec<String> = label_names.iter().map(|s| s.to_string()).collect();
        let desc = Desc::new(
            opts.name.clone(),
            opts.help.clone(),
            label_names.clone(),
            HashMap::new(),
        )?;

        Ok(Self {
            core: Arc::new(SummaryVecCore {
                desc,
                opts,
                label_names,
                children: RwLock::new(HashMap::new()),
            }),
        })
    }

    /// Returns the child for `values`, creating it on first use.
    pub fn get_metric_with_label_values(&self, values: &[&str]) -> Result<Summary, MetricsError> {
        if values.len() != self.core.label_names.len() {
            return Err(MetricsError::InconsistentCardinality {
                expected: self.core.label_names.len(),
                got: values.len(),
            });
        }
        let key: Vec<String> = values.iter().map(|s| s.to_string()).collect();

        if let Some(summary) = self
            .core
            .children
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(summary.clone());
        }

        let mut children = self
            .core
            .children
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let summary = children
            .entry(key)
            .or_insert_with_key(|key| Summary::new(&self.core.opts, self.label_pairs(key)))
            .clone();
        Ok(summary)
    }

    /// Like [`get_metric_with_label_values`](Self::get_metric_with_label_values)
    /// but panics on a label count mismatch.
    pub fn with_label_values(&self, values: &[&str]) -> Summary {
        match self.get_metric_with_label_values(values) {
            Ok(summary) => summary,
            Err(e) => panic!("{}", e),
        }
    }

    fn label_pairs(&self, values: &[String]) -> Vec<LabelPair> {
        let mut pairs: Vec<LabelPair> = self
            .core
            .label_names
            .iter()
            .zip(values)
            .map(|(name, value)| {
                let mut pair = LabelPair::default();
                pair.set_name(name.clone());
                pair.set_value(value.clone());
                pair
            })
            .collect();
        pairs.sort_by(|a, b| a.get_name().cmp(b.get_name()));
        pairs
    }

    fn collect_at(&self, now: Instant) -> MetricFamily {
        let children = self
            .core
            .children
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<&Vec<String>> = children.keys().collect();
        keys.sort();

        let mut family = MetricFamily::default();
        family.set_name(self.core.opts.name.clone());
        family.set_help(self.core.opts.help.clone());
        family.set_field_type(MetricType::SUMMARY);
        for key in keys {
            family.mut_metric().push(children[key].metric_at(now));
        }
        family
    }
}

impl Collector for SummaryVec {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.core.desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        vec![self.collect_at(Instant::now())]
    }
}
