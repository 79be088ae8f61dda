//! Background generators of synthetic observations.
//!
//! Four independent loops mutate the exporter metrics on a fixed
//! interval. Each loop performs its first step immediately, then one step
//! per interval, until its cancellation token fires.
//!
//! | generator | effect |
//! |---|---|
//! | `counter_gauge` | `example_count_total` += 1, `example_gauge_value` += 10 |
//! | `uniform` | uniform `[0, 1)` sample into the summary (`service="uniform"`) |
//! | `normal` | normal sample into the summary (`service="normal"`) and the histogram, with a `dummyID` exemplar |
//! | `exponential` | exponential sample / 1e6 into the summary (`service="exponential"`) |

mod sampler;

pub use sampler::Sampler;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

use crate::metrics::ExporterMetrics;

/// Amount added to `example_gauge_value` per step.
pub const GAUGE_STEP: f64 = 10.0;
/// Exemplar IDs are drawn from `[0, EXEMPLAR_ID_RANGE)`.
pub const EXEMPLAR_ID_RANGE: u32 = 100_000;
/// Divisor applied to exponential samples.
pub const EXPONENTIAL_SCALE: f64 = 1e6;

/// One of the background generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generator {
    /// Increments the counter and raises the gauge.
    CounterGauge,
    /// Uniform summary samples.
    Uniform,
    /// Normal summary and histogram samples.
    Normal,
    /// Exponential summary samples.
    Exponential,
}

impl Generator {
    /// All generators, in spawn order.
    pub const ALL: [Generator; 4] = [
        Generator::CounterGauge,
        Generator::Uniform,
        Generator::Normal,
        Generator::Exponential,
    ];

    /// Name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Generator::CounterGauge => "counter_gauge",
            Generator::Uniform => "uniform",
            Generator::Normal => "normal",
            Generator::Exponential => "exponential",
        }
    }

    /// Performs a single iteration against `metrics`.
    pub fn step(&self, metrics: &ExporterMetrics, sampler: &mut Sampler) {
        match self {
            Generator::CounterGauge => {
                metrics.count.inc();
                metrics.gauge.add(GAUGE_STEP);
                trace!(count = metrics.count.get(), "counter and gauge updated");
            }
            Generator::Uniform => {
                let v = sampler.uniform();
                metrics.summary.with_label_values(&["uniform"]).observe(v);
                trace!(value = v, "uniform sample observed");
            }
            Generator::Normal => {
                let v = sampler.normal();
                metrics.summary.with_label_values(&["normal"]).observe(v);

                let id = sampler.int_below(EXEMPLAR_ID_RANGE).to_string();
                if let Err(e) = metrics
                    .histogram
                    .observe_with_exemplar(v, &[("dummyID", id.as_str())])
                {
                    warn!(error = %e, "histogram observation rejected");
                }
                trace!(value = v, dummy_id = %id, "normal sample observed");
            }
            Generator::Exponential => {
                let v = sampler.exponential() / EXPONENTIAL_SCALE;
                metrics.summary.with_label_values(&["exponential"]).observe(v);
                trace!(value = v, "exponential sample observed");
            }
        }
    }

    /// Runs this generator until `shutdown` is cancelled.
    pub async fn run(
        self,
        metrics: Arc<ExporterMetrics>,
        mut sampler: Sampler,
        interval: Duration,
        shutdown: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => self.step(&metrics, &mut sampler),
            }
        }
        info!(generator = self.name(), "generator stopped");
    }
}

/// Handles of the spawned generator tasks.
pub struct GeneratorHandles {
    handles: Vec<JoinHandle<()>>,
}

impl GeneratorHandles {
    /// Number of running tasks.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no task was spawned.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Waits for every task to finish. Call after cancelling their token.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "generator task failed");
            }
        }
    }
}

/// Spawns every generator on the current runtime.
///
/// Each task gets its own sampler forked from `sampler` and a child of
/// `shutdown`.
pub fn spawn_all(
    metrics: Arc<ExporterMetrics>,
    sampler: &mut Sampler,
    interval: Duration,
    shutdown: &CancellationToken,
) -> GeneratorHandles {
    let handles = Generator::ALL
        .iter()
        .map(|generator| {
            tokio::spawn(generator.run(
                Arc::clone(&metrics),
                sampler.fork(),
                interval,
                shutdown.child_token(),
            ))
        })
        .collect();

    info!(
        generators = Generator::ALL.len(),
        interval_secs = interval.as_secs_f64(),
        "generators started"
    );
    GeneratorHandles { handles }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricsConfig;

    fn test_metrics() -> Arc<ExporterMetrics> {
        Arc::new(ExporterMetrics::new(&MetricsConfig::default(), Sampler::from_seed(5)).unwrap())
    }

    #[test]
    fn test_counter_gauge_step() {
        let metrics = test_metrics();
        let mut sampler = Sampler::from_seed(1);
        for _ in 0..4 {
            Generator::CounterGauge.step(&metrics, &mut sampler);
        }
        assert_eq!(metrics.count.get(), 4);
        assert_eq!(metrics.gauge.get(), 40.0);
    }

    #[test]
    fn test_uniform_samples_in_unit_interval() {
        let metrics = test_metrics();
        let mut sampler = Sampler::from_seed(2);
        for _ in 0..1000 {
            Generator::Uniform.step(&metrics, &mut sampler);
        }

        let summary = metrics.summary.with_label_values(&["uniform"]);
        assert_eq!(summary.get_sample_count(), 1000);
        let mean = summary.get_sample_sum() / 1000.0;
        assert!((0.0..1.0).contains(&mean));
        assert!((0.0..1.0).contains(&summary.quantile(0.99)));
        assert!((0.0..1.0).contains(&summary.quantile(0.5)));
    }

    #[test]
    fn test_normal_step_feeds_summary_and_histogram() {
        let metrics = test_metrics();
        let mut sampler = Sampler::from_seed(3);
        for _ in 0..10 {
            Generator::Normal.step(&metrics, &mut sampler);
        }

        assert_eq!(metrics.summary.with_label_values(&["normal"]).get_sample_count(), 10);
        assert_eq!(metrics.histogram.histogram().get_sample_count(), 10);

        let exemplars: Vec<_> = metrics.histogram.exemplars().into_iter().flatten().collect();
        assert!(!exemplars.is_empty());
        for exemplar in exemplars {
            let id: u32 = exemplar.labels["dummyID"].parse().unwrap();
            assert!(id < EXEMPLAR_ID_RANGE);
        }
    }

    #[test]
    fn test_exponential_step_scaled() {
        let metrics = test_metrics();
        let mut sampler = Sampler::from_seed(4);
        for _ in 0..100 {
            Generator::Exponential.step(&metrics, &mut sampler);
        }

        let summary = metrics.summary.with_label_values(&["exponential"]);
        let sum = summary.get_sample_sum();
        assert!(sum >= 0.0);
        // Mean of Exp(1) / 1e6 is 1e-6.
        assert!(sum / 100.0 < 1e-5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_counter_follows_interval() {
        let metrics = test_metrics();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(Generator::CounterGauge.run(
            Arc::clone(&metrics),
            Sampler::from_seed(6),
            Duration::from_secs(5),
            shutdown.clone(),
        ));

        // Steps at t = 0, 5, 10.
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(metrics.count.get(), 3);
        assert_eq!(metrics.gauge.get(), 30.0);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_generators_stop_on_cancel() {
        let metrics = test_metrics();
        let mut sampler = Sampler::from_seed(7);
        let shutdown = CancellationToken::new();
        let handles = spawn_all(
            Arc::clone(&metrics),
            &mut sampler,
            Duration::from_secs(5),
            &shutdown,
        );
        assert_eq!(handles.len(), 4);

        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown.cancel();
        handles.join().await;

        let count = metrics.count.get();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(metrics.count.get(), count);
        assert_eq!(count, 1);
    }
}
