//! Threshold evaluation
use std::collections::BTreeMap;
use std::time::Duration;
use volley_core::{
    Aggregate, Aggregation, InsufficientData, Metric, Threshold, ThresholdResult, Thresholds,
    Verdict,
};

/// Judge an aggregate against every threshold.
///
/// Pure: the same aggregate and thresholds always produce the same verdict. A run without a single
/// sample cannot be judged and yields [`InsufficientData::NoSamples`].
pub fn evaluate(
    aggregate: &Aggregate,
    thresholds: &Thresholds,
) -> Result<Verdict, InsufficientData> {
    if aggregate.is_empty() {
        return Err(InsufficientData::NoSamples);
    }

    let mut results = BTreeMap::new();
    for threshold in thresholds.iter() {
        let observed = observe(aggregate, threshold)?;
        results.insert(
            threshold.id(),
            ThresholdResult {
                metric: threshold.metric.to_string(),
                expression: threshold.expression(),
                observed,
                passed: threshold.comparator.holds(observed, threshold.value),
            },
        );
    }

    Ok(Verdict::new(results))
}

/// Value of the threshold's metric/aggregation pair, latencies in milliseconds.
pub fn observe(aggregate: &Aggregate, threshold: &Threshold) -> Result<f64, InsufficientData> {
    let no_samples = || InsufficientData::NoSamples;

    let observed = match (threshold.metric, threshold.aggregation) {
        (Metric::RequestDuration, Aggregation::Avg) => {
            millis(aggregate.latency_mean().ok_or_else(no_samples)?)
        }
        (Metric::RequestDuration, Aggregation::Min) => {
            millis(aggregate.latency_min().ok_or_else(no_samples)?)
        }
        (Metric::RequestDuration, Aggregation::Max) => {
            millis(aggregate.latency_max().ok_or_else(no_samples)?)
        }
        (Metric::RequestDuration, Aggregation::Med) => {
            millis(aggregate.latency(0.5).ok_or_else(no_samples)?)
        }
        (Metric::RequestDuration, Aggregation::Percentile(p)) => {
            millis(aggregate.latency(p / 100.).ok_or_else(no_samples)?)
        }
        (Metric::RequestFailed, _) => aggregate.error_rate().ok_or_else(no_samples)?,
        (Metric::Requests | Metric::RequestDuration, Aggregation::Count) => aggregate.count as f64,
        (Metric::Requests | Metric::RequestDuration, _) => {
            aggregate.request_rate().ok_or_else(no_samples)?
        }
        (Metric::Iterations, Aggregation::Count) => aggregate.iterations as f64,
        (Metric::Iterations, _) => aggregate.iteration_rate().ok_or_else(no_samples)?,
        (Metric::Checks, _) => aggregate
            .check_rate()
            .ok_or_else(|| InsufficientData::NoChecks(threshold.id()))?,
    };

    Ok(observed)
}

fn millis(dur: Duration) -> f64 {
    dur.as_secs_f64() * 1e3
}
