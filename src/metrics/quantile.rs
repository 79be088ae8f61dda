//! Targeted quantile estimation over a stream of observations.
//!
//! Implements the biased-quantile algorithm of Cormode, Korn,
//! Muthukrishnan and Srivastava ("Effective Computation of Biased
//! Quantiles over Data Streams"), restricted to a fixed set of target
//! quantiles. For every target `(q, e)` a query for `q` returns a value
//! whose rank lies within `e * n` of `q * n`.
//!
//! Incoming values are buffered and merged into the compressed sample
//! list in sorted batches.

/// A compressed sample: `width` is the rank gap to the previous sample,
/// `delta` the uncertainty of this sample's rank.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample {
    value: f64,
    width: f64,
    delta: f64,
}

/// A quantile target with its allowed rank error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    /// Quantile rank in `[0, 1]`.
    pub quantile: f64,
    /// Allowed absolute error on the rank, in `[0, 1]`.
    pub error: f64,
}

/// Streaming estimator for a fixed set of target quantiles.
#[derive(Debug, Clone)]
pub struct QuantileStream {
    targets: Vec<Target>,
    samples: Vec<Sample>,
    buffer: Vec<f64>,
    buf_cap: usize,
    count: f64,
}

impl QuantileStream {
    /// Creates a stream for the given targets with an insert buffer of
    /// `buf_cap` values.
    pub fn new(targets: Vec<Target>, buf_cap: usize) -> Self {
        let buf_cap = buf_cap.max(1);
        Self {
            targets,
            samples: Vec::new(),
            buffer: Vec::with_capacity(buf_cap),
            buf_cap,
            count: 0.0,
        }
    }

    /// Inserts a single observation.
    pub fn insert(&mut self, value: f64) {
        self.buffer.push(value);
        if self.buffer.len() >= self.buf_cap {
            self.flush();
        }
    }

    /// Number of observations seen since the last reset.
    pub fn count(&self) -> u64 {
        self.count as u64 + self.buffer.len() as u64
    }

    /// Drops every observation.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.buffer.clear();
        self.count = 0.0;
    }

    /// Estimates the value at quantile `q`. Returns `None` on an empty
    /// stream.
    pub fn query(&mut self, q: f64) -> Option<f64> {
        if self.samples.is_empty() {
            // Nothing merged yet: answer exactly from the buffer.
            if self.buffer.is_empty() {
                return None;
            }
            self.sort_buffer();
            let len = self.buffer.len();
            let mut idx = (len as f64 * q).ceil() as usize;
            idx = idx.saturating_sub(1).min(len - 1);
            return Some(self.buffer[idx]);
        }

        self.flush();
        Some(self.query_samples(q))
    }

    fn sort_buffer(&mut self) {
        self.buffer.sort_by(f64::total_cmp);
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        self.sort_buffer();
        let batch = std::mem::take(&mut self.buffer);
        self.merge(&batch);
        self.buffer = batch;
        self.buffer.clear();
    }

    /// Maximum rank gap allowed around rank `r`.
    fn invariant(&self, r: f64) -> f64 {
        let n = self.count;
        let mut min = f64::MAX;
        for t in &self.targets {
            let f = if t.quantile * n <= r {
                (2.0 * t.error * r) / t.quantile
            } else {
                (2.0 * t.error * (n - r)) / (1.0 - t.quantile)
            };
            if f < min {
                min = f;
            }
        }
        min
    }

    /// Merges a sorted batch into the sample list.
    fn merge(&mut self, batch: &[f64]) {
        let mut r = 0.0;
        let mut i = 0;
        for &value in batch {
            let mut inserted = false;
            while i < self.samples.len() {
                let current = self.samples[i];
                if current.value > value {
                    let delta = (self.invariant(r).floor() - 1.0).max(0.0);
                    self.samples.insert(
                        i,
                        Sample {
                            value,
                            width: 1.0,
                            delta,
                        },
                    );
                    i += 1;
                    inserted = true;
                    break;
                }
                r += current.width;
                i += 1;
            }
            if !inserted {
                self.samples.push(Sample {
                    value,
                    width: 1.0,
                    delta: 0.0,
                });
                i += 1;
            }
            self.count += 1.0;
            r += 1.0;
        }
        self.compress();
    }

    fn compress(&mut self) {
        if self.samples.len() < 2 {
            return;
        }
        let mut xi = self.samples.len() - 1;
        let mut x = self.samples[xi];
        let mut r = self.count - 1.0 - x.width;

        for i in (0..self.samples.len() - 1).rev() {
            let c = self.samples[i];
            if c.width + x.width + x.delta <= self.invariant(r) {
                x.width += c.width;
                self.samples[xi] = x;
                self.samples.remove(i);
                xi -= 1;
            } else {
                x = c;
                xi = i;
            }
            r -= c.width;
        }
    }

    fn query_samples(&self, q: f64) -> f64 {
        let mut t = (q * self.count).ceil();
        t += (self.invariant(t) / 2.0).ceil();

        let mut prev = self.samples[0];
        let mut r = 0.0;
        for &c in &self.samples[1..] {
            r += prev.width;
            if r + c.width + c.delta > t {
                return prev.value;
            }
            prev = c;
        }
        prev.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn example_targets() -> Vec<Target> {
        vec![
            Target { quantile: 0.5, error: 0.05 },
            Target { quantile: 0.9, error: 0.01 },
            Target { quantile: 0.99, error: 0.001 },
        ]
    }

    /// Rank of `value` in a sorted slice, as a fraction of its length.
    fn rank_bounds(sorted: &[f64], value: f64) -> (f64, f64) {
        let lo = sorted.partition_point(|&v| v < value);
        let hi = sorted.partition_point(|&v| v <= value);
        let n = sorted.len() as f64;
        (lo as f64 / n, hi as f64 / n)
    }

    #[test]
    fn test_empty_stream_has_no_estimate() {
        let mut stream = QuantileStream::new(example_targets(), 500);
        assert_eq!(stream.query(0.5), None);
        assert_eq!(stream.count(), 0);
    }

    #[test]
    fn test_buffered_query_is_exact() {
        let mut stream = QuantileStream::new(example_targets(), 500);
        for v in [5.0, 1.0, 3.0, 2.0, 4.0] {
            stream.insert(v);
        }
        assert_eq!(stream.query(0.5), Some(3.0));
        assert_eq!(stream.query(0.99), Some(5.0));
        assert_eq!(stream.query(0.0), Some(1.0));
    }

    #[test]
    fn test_sequential_values_within_error() {
        let mut stream = QuantileStream::new(example_targets(), 500);
        for v in 1..=10_000 {
            stream.insert(v as f64);
        }
        assert_eq!(stream.count(), 10_000);

        for t in example_targets() {
            let estimate = stream.query(t.quantile).unwrap();
            let rank = estimate / 10_000.0;
            assert!(
                (rank - t.quantile).abs() <= t.error + 5e-4,
                "q={} estimate={} rank={}",
                t.quantile,
                estimate,
                rank
            );
        }
    }

    #[test]
    fn test_compression_bounds_sample_count() {
        let mut stream = QuantileStream::new(example_targets(), 100);
        for v in 0..50_000 {
            stream.insert(((v * 7919) % 50_000) as f64);
        }
        stream.query(0.5);
        assert!(stream.samples.len() < 5_000);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut stream = QuantileStream::new(example_targets(), 10);
        for v in 0..100 {
            stream.insert(v as f64);
        }
        stream.reset();
        assert_eq!(stream.count(), 0);
        assert_eq!(stream.query(0.9), None);
    }

    proptest! {
        #[test]
        fn prop_estimates_within_rank_error(
            values in prop::collection::vec(-1.0e6f64..1.0e6, 1000..3000)
        ) {
            let mut stream = QuantileStream::new(example_targets(), 50);
            for &v in &values {
                stream.insert(v);
            }
            let mut sorted = values.clone();
            sorted.sort_by(f64::total_cmp);

            for t in example_targets() {
                let estimate = stream.query(t.quantile).unwrap();
                let (lo, hi) = rank_bounds(&sorted, estimate);
                let slack = t.error + 2.0 / sorted.len() as f64;
                prop_assert!(
                    lo - slack <= t.quantile && t.quantile <= hi + slack,
                    "q={} rank=[{}, {}]", t.quantile, lo, hi
                );
            }
        }
    }
}
