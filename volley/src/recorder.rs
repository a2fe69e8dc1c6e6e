//! Concurrent sample aggregation
//!
//! Workers push samples into a lock-free [`AtomicBucket`]; a single reducer drains the bucket
//! into the [`Aggregate`] under a mutex. Recording therefore never contends with other workers,
//! and every sample is folded in exactly once.
use metrics_util::AtomicBucket;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
#[allow(unused)]
use tracing::{debug, error, trace, warn};
use volley_core::{Aggregate, Sample};

#[cfg(feature = "metrics")]
mod labels {
    pub const REQUESTS: &str = "volley_http_reqs";
    pub const FAILED: &str = "volley_http_req_failed";
    pub const DURATION: &str = "volley_http_req_duration";
    pub const ITERATIONS: &str = "volley_iterations";
}

/// Thread-safe sample aggregator shared by every virtual user of a run.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MetricsRecorder {
    inner: Arc<Inner>,
}

struct Inner {
    queue: AtomicBucket<Sample>,
    recorded: AtomicU64,
    iterations: AtomicU64,
    aggregate: Mutex<Aggregate>,
    start: Instant,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                queue: AtomicBucket::new(),
                recorded: AtomicU64::new(0),
                iterations: AtomicU64::new(0),
                aggregate: Mutex::new(Aggregate::new()),
                start: Instant::now(),
            }),
        }
    }

    pub fn record(&self, sample: Sample) {
        #[cfg(feature = "metrics")]
        {
            metrics::counter!(labels::REQUESTS).increment(1);
            if !sample.is_success() {
                metrics::counter!(labels::FAILED).increment(1);
            }
            metrics::histogram!(labels::DURATION).record(sample.latency.as_secs_f64() * 1e3);
        }

        // NOTE: Counted before it is queued so a flush can never see more than `recorded`.
        self.inner.recorded.fetch_add(1, Ordering::Relaxed);
        self.inner.queue.push(sample);
    }

    pub fn record_all(&self, samples: impl IntoIterator<Item = Sample>) {
        for sample in samples {
            self.record(sample);
        }
    }

    /// Mark one scenario iteration as completed.
    pub fn record_iteration(&self) {
        #[cfg(feature = "metrics")]
        metrics::counter!(labels::ITERATIONS).increment(1);

        self.inner.iterations.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of `record` calls so far, flushed or not.
    pub fn recorded(&self) -> u64 {
        self.inner.recorded.load(Ordering::Relaxed)
    }

    /// Fold every queued sample into the aggregate.
    ///
    /// Called once per scheduler tick so the queue never grows with run length.
    pub fn flush(&self) {
        let mut aggregate = self.lock_aggregate();
        let mut drained = 0;
        self.inner.queue.clear_with(|samples| {
            drained += samples.len();
            for sample in samples {
                aggregate.push(sample);
            }
        });
        trace!("Flushed {drained} samples");
    }

    /// Consistent point-in-time view of everything recorded so far.
    pub fn snapshot(&self) -> Aggregate {
        self.flush();
        let mut aggregate = self.lock_aggregate().clone();
        aggregate.iterations = self.inner.iterations.load(Ordering::Relaxed);
        aggregate.elapsed = self.inner.start.elapsed();
        aggregate
    }

    fn lock_aggregate(&self) -> std::sync::MutexGuard<'_, Aggregate> {
        // NOTE: Aggregate::push cannot leave the aggregate half-updated in a way that matters
        // to readers, so a poisoned lock is recovered rather than propagated.
        self.inner.aggregate.lock().unwrap_or_else(|poisoned| {
            error!("Aggregate mutex was poisoned; recovering.");
            poisoned.into_inner()
        })
    }
}
