use crate::error::ScenarioError;
use crate::recorder::MetricsRecorder;
use futures_util::FutureExt;
use governor::DefaultDirectRateLimiter;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};
use volley_core::Sample;

/// Handed to the scenario on every iteration.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VirtualUser {
    /// Unique within a run; ids are never reused.
    pub id: usize,
    /// Zero-based iteration count of this virtual user.
    pub iteration: u64,
}

pub(crate) struct WorkerContext {
    pub recorder: MetricsRecorder,
    pub pause: Duration,
    pub grace_period: Duration,
    pub limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

/// Loop a single virtual user until its token is cancelled.
pub(crate) async fn worker_loop<T, F>(
    id: usize,
    scenario: T,
    token: CancellationToken,
    ctx: Arc<WorkerContext>,
) where
    T: Fn(VirtualUser) -> F + Send + Sync + 'static + Clone,
    F: Future<Output = Vec<Sample>> + Send + 'static,
{
    trace!("Virtual user {id} started");
    let mut iteration = 0;

    while !token.is_cancelled() {
        if let Some(limiter) = &ctx.limiter {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = limiter.until_ready() => {}
            }
        }

        let vu = VirtualUser { id, iteration };
        let start = Instant::now();
        let fut = run_iteration(&scenario, vu);
        tokio::pin!(fut);

        let res = tokio::select! {
            biased;
            res = &mut fut => res,
            _ = token.cancelled() => {
                match tokio::time::timeout(ctx.grace_period, &mut fut).await {
                    Ok(res) => res,
                    Err(_) => Err(ScenarioError::Abandoned),
                }
            }
        };

        match res {
            Ok(samples) => {
                ctx.recorder.record_all(samples);
                ctx.recorder.record_iteration();
            }
            Err(err @ ScenarioError::Abandoned) => {
                debug!("Virtual user {id}: {err}");
                break;
            }
            Err(err) => {
                warn!("Virtual user {id}, iteration {iteration}: {err}");
                ctx.recorder.record(Sample::failure(start.elapsed()));
            }
        }

        iteration += 1;

        if ctx.pause.is_zero() {
            // NOTE: Scenarios which never await would otherwise starve the runtime.
            tokio::task::yield_now().await;
        } else {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(ctx.pause) => {}
            }
        }
    }

    trace!("Virtual user {id} stopped after {iteration} iterations");
}

async fn run_iteration<T, F>(scenario: &T, vu: VirtualUser) -> Result<Vec<Sample>, ScenarioError>
where
    T: Fn(VirtualUser) -> F,
    F: Future<Output = Vec<Sample>>,
{
    let fut = std::panic::catch_unwind(AssertUnwindSafe(|| scenario(vu))).map_err(panicked)?;
    AssertUnwindSafe(fut).catch_unwind().await.map_err(panicked)
}

fn panicked(payload: Box<dyn Any + Send>) -> ScenarioError {
    let msg = if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    };
    ScenarioError::Panicked(msg)
}
