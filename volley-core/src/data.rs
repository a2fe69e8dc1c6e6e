use pdatastructs::tdigest::{TDigest, K1};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, SystemTime};

const TDIGEST_BACKLOG_SIZE: usize = 100;
const TDIGEST_COMPRESSION: f64 = 100.;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

/// A single measured request.
///
/// Produced by a scenario iteration, handed to the recorder and then dropped; only the
/// [`Aggregate`] outlives it.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: SystemTime,
    pub latency: Duration,
    pub outcome: Outcome,
    pub checks: BTreeMap<String, bool>,
}

impl Sample {
    pub fn new(latency: Duration, outcome: Outcome) -> Self {
        Self {
            timestamp: SystemTime::now(),
            latency,
            outcome,
            checks: BTreeMap::new(),
        }
    }

    pub fn success(latency: Duration) -> Self {
        Self::new(latency, Outcome::Success)
    }

    pub fn failure(latency: Duration) -> Self {
        Self::new(latency, Outcome::Failure)
    }

    /// Attach the result of a named check to this sample.
    pub fn check(mut self, name: impl Into<String>, passed: bool) -> Self {
        self.checks.insert(name.into(), passed);
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct CheckCounts {
    pub passes: u64,
    pub fails: u64,
}

impl CheckCounts {
    pub fn total(&self) -> u64 {
        self.passes + self.fails
    }

    pub fn pass_rate(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(self.passes as f64 / total as f64),
        }
    }
}

/// Summary of every sample recorded during a run.
///
/// Latencies are folded into a t-digest so memory stays bounded regardless of run length;
/// percentile queries are therefore approximate, while min/max/mean are exact.
#[derive(Debug, Clone)]
pub struct Aggregate {
    pub count: u64,
    pub error_count: u64,
    pub iterations: u64,
    pub elapsed: Duration,
    latency: TDigest<K1>,
    latency_min: Option<Duration>,
    latency_max: Option<Duration>,
    latency_total: Duration,
    checks: BTreeMap<String, CheckCounts>,
}

impl Default for Aggregate {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregate {
    pub fn new() -> Self {
        Self {
            count: 0,
            error_count: 0,
            iterations: 0,
            elapsed: Duration::ZERO,
            latency: default_tdigest(),
            latency_min: None,
            latency_max: None,
            latency_total: Duration::ZERO,
            checks: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, sample: &Sample) {
        self.count += 1;
        if !sample.is_success() {
            self.error_count += 1;
        }

        let latency = sample.latency;
        self.latency.insert(latency.as_secs_f64());
        self.latency_total += latency;
        self.latency_min = Some(self.latency_min.map_or(latency, |min| min.min(latency)));
        self.latency_max = Some(self.latency_max.map_or(latency, |max| max.max(latency)));

        for (name, passed) in &sample.checks {
            let counts = self.checks.entry(name.clone()).or_default();
            if *passed {
                counts.passes += 1;
            } else {
                counts.fails += 1;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn success_count(&self) -> u64 {
        self.count - self.error_count
    }

    pub fn error_rate(&self) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(self.error_count as f64 / self.count as f64)
        }
    }

    /// Requests per second over the run's elapsed time.
    pub fn request_rate(&self) -> Option<f64> {
        if self.is_empty() || self.elapsed.is_zero() {
            None
        } else {
            Some(self.count as f64 / self.elapsed.as_secs_f64())
        }
    }

    pub fn iteration_rate(&self) -> Option<f64> {
        if self.elapsed.is_zero() {
            None
        } else {
            Some(self.iterations as f64 / self.elapsed.as_secs_f64())
        }
    }

    pub fn latency(&self, quantile: f64) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }

        let secs = self.latency.quantile(quantile.clamp(0., 1.));
        // NOTE: The t-digest can hand back NaN on degenerate inputs.
        if !secs.is_finite() {
            return None;
        }

        // Stay inside the observed range, the digest interpolates between centroids.
        let latency = Duration::from_secs_f64(secs.max(0.));
        match (self.latency_min, self.latency_max) {
            (Some(min), Some(max)) => Some(latency.clamp(min, max)),
            _ => Some(latency),
        }
    }

    pub fn latency_mean(&self) -> Option<Duration> {
        if self.is_empty() {
            None
        } else {
            Some(self.latency_total.div_f64(self.count as f64))
        }
    }

    pub fn latency_min(&self) -> Option<Duration> {
        self.latency_min
    }

    pub fn latency_max(&self) -> Option<Duration> {
        self.latency_max
    }

    pub fn checks(&self) -> &BTreeMap<String, CheckCounts> {
        &self.checks
    }

    /// Passed checks over evaluated checks, across every check name.
    pub fn check_rate(&self) -> Option<f64> {
        let totals = self
            .checks
            .values()
            .fold(CheckCounts::default(), |acc, c| CheckCounts {
                passes: acc.passes + c.passes,
                fails: acc.fails + c.fails,
            });
        totals.pass_rate()
    }

    pub fn summary(&self) -> AggregateSummary {
        AggregateSummary {
            requests: self.count,
            failures: self.error_count,
            iterations: self.iterations,
            elapsed_ms: self.elapsed.as_secs_f64() * 1e3,
            error_rate: self.error_rate(),
            request_rate: self.request_rate(),
            latency_ms: LatencySummary {
                avg: self.latency_mean().map(as_millis),
                min: self.latency_min.map(as_millis),
                med: self.latency(0.5).map(as_millis),
                p90: self.latency(0.9).map(as_millis),
                p95: self.latency(0.95).map(as_millis),
                p99: self.latency(0.99).map(as_millis),
                max: self.latency_max.map(as_millis),
            },
            checks: self.checks.clone(),
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Requests={}, Failures={}, ErrorRate={:.4}, p50={:?}, p95={:?}, p99={:?}",
            self.count,
            self.error_count,
            self.error_rate().unwrap_or(0.),
            self.latency(0.5).unwrap_or_default(),
            self.latency(0.95).unwrap_or_default(),
            self.latency(0.99).unwrap_or_default(),
        )
    }
}

/// Serializable view of an [`Aggregate`], latencies in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateSummary {
    pub requests: u64,
    pub failures: u64,
    pub iterations: u64,
    pub elapsed_ms: f64,
    pub error_rate: Option<f64>,
    pub request_rate: Option<f64>,
    pub latency_ms: LatencySummary,
    pub checks: BTreeMap<String, CheckCounts>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencySummary {
    pub avg: Option<f64>,
    pub min: Option<f64>,
    pub med: Option<f64>,
    pub p90: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
    pub max: Option<f64>,
}

fn as_millis(dur: Duration) -> f64 {
    dur.as_secs_f64() * 1e3
}

fn default_tdigest() -> TDigest<K1> {
    TDigest::new(K1::new(TDIGEST_COMPRESSION), TDIGEST_BACKLOG_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregate_of(latencies_ms: &[u64], failures: usize) -> Aggregate {
        let mut agg = Aggregate::new();
        for (idx, ms) in latencies_ms.iter().enumerate() {
            let latency = Duration::from_millis(*ms);
            let sample = if idx < failures {
                Sample::failure(latency)
            } else {
                Sample::success(latency)
            };
            agg.push(&sample);
        }
        agg
    }

    #[test]
    fn empty_aggregate_has_no_statistics() {
        let agg = Aggregate::new();
        assert!(agg.is_empty());
        assert_eq!(agg.error_rate(), None);
        assert_eq!(agg.latency(0.95), None);
        assert_eq!(agg.latency_mean(), None);
        assert_eq!(agg.check_rate(), None);
    }

    #[test]
    fn counts_and_error_rate() {
        let agg = aggregate_of(&[10; 1000], 30);
        assert_eq!(agg.count, 1000);
        assert_eq!(agg.error_count, 30);
        assert_eq!(agg.success_count(), 970);
        assert!((agg.error_rate().unwrap() - 0.03).abs() < f64::EPSILON);
    }

    #[test]
    fn exact_min_max_mean() {
        let agg = aggregate_of(&[10, 20, 30, 40], 0);
        assert_eq!(agg.latency_min(), Some(Duration::from_millis(10)));
        assert_eq!(agg.latency_max(), Some(Duration::from_millis(40)));
        assert_eq!(agg.latency_mean(), Some(Duration::from_millis(25)));
    }

    #[test]
    fn percentiles_are_close() {
        let latencies: Vec<u64> = (1..=1000).collect();
        let agg = aggregate_of(&latencies, 0);

        let p50 = agg.latency(0.5).unwrap().as_secs_f64() * 1e3;
        let p95 = agg.latency(0.95).unwrap().as_secs_f64() * 1e3;
        assert!((p50 - 500.).abs() < 25., "p50 = {p50}");
        assert!((p95 - 950.).abs() < 25., "p95 = {p95}");
    }

    #[test]
    fn percentile_of_constant_latency() {
        let agg = aggregate_of(&[2500; 200], 0);
        let p95 = agg.latency(0.95).unwrap();
        assert_eq!(p95, Duration::from_millis(2500));
    }

    #[test]
    fn check_counts() {
        let mut agg = Aggregate::new();
        agg.push(
            &Sample::success(Duration::from_millis(5))
                .check("status is 200", true)
                .check("has content", false),
        );
        agg.push(&Sample::success(Duration::from_millis(5)).check("status is 200", false));

        let checks = agg.checks();
        assert_eq!(
            checks["status is 200"],
            CheckCounts {
                passes: 1,
                fails: 1
            }
        );
        assert_eq!(checks["has content"].pass_rate(), Some(0.));
        assert!((agg.check_rate().unwrap() - 1. / 3.).abs() < 1e-9);
    }

    #[test]
    fn request_rate_uses_elapsed() {
        let mut agg = aggregate_of(&[1; 50], 0);
        assert_eq!(agg.request_rate(), None);
        agg.elapsed = Duration::from_secs(10);
        assert_eq!(agg.request_rate(), Some(5.));
    }
}
