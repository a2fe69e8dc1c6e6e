mod worker;

pub use worker::VirtualUser;

use crate::error::RunError;
use crate::recorder::MetricsRecorder;
use futures_util::future::join_all;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn, Instrument};
use volley_core::{RunConfig, Sample};
use worker::{worker_loop, WorkerContext};

/// Extra time given to stopped workers on shutdown before their tasks are aborted.
const SHUTDOWN_SLACK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub pause: Duration,
    pub grace_period: Duration,
    pub max_rps: Option<NonZeroU32>,
}

impl From<&RunConfig> for PoolSettings {
    fn from(config: &RunConfig) -> Self {
        Self {
            pause: config.pause,
            grace_period: config.grace_period,
            max_rps: config.max_rps,
        }
    }
}

struct Worker {
    id: usize,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Dynamic set of virtual users, each looping the scenario on its own tokio task.
///
/// The number of workers only changes through [`VirtualUserPool::reconcile`], which takes
/// `&mut self` and so can never race with itself.
pub struct VirtualUserPool<T> {
    scenario: T,
    workers: Vec<Worker>,
    retiring: Vec<Worker>,
    next_id: usize,
    cancel: CancellationToken,
    ctx: Arc<WorkerContext>,
}

impl<T, F> VirtualUserPool<T>
where
    T: Fn(VirtualUser) -> F + Send + Sync + 'static + Clone,
    F: Future<Output = Vec<Sample>> + Send + 'static,
{
    /// Workers observe child tokens of `cancel`; cancelling it stops the whole pool.
    pub fn new(
        scenario: T,
        recorder: MetricsRecorder,
        settings: PoolSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            scenario,
            workers: vec![],
            retiring: vec![],
            next_id: 0,
            cancel,
            ctx: Arc::new(WorkerContext {
                recorder,
                pause: settings.pause,
                grace_period: settings.grace_period,
                limiter: settings.max_rps.map(|rps| Arc::new(rate_limiter(rps))),
            }),
        }
    }

    /// Spawn or stop workers until exactly `target` are live.
    ///
    /// Workers are stopped newest first. Stopped workers finish their current iteration (within
    /// the grace period) in the background and no longer count as live.
    pub fn reconcile(&mut self, target: usize) -> Result<(), RunError> {
        self.reap()?;

        if self.workers.len() > target {
            trace!("Stopping {} virtual users", self.workers.len() - target);
            for worker in self.workers.drain(target..).rev() {
                worker.token.cancel();
                self.retiring.push(worker);
            }
        } else {
            while self.workers.len() < target {
                self.spawn();
            }
        }

        Ok(())
    }

    /// Number of live (not stopping) virtual users.
    pub fn concurrency(&self) -> usize {
        self.workers.len()
    }

    /// Number of stopped virtual users still finishing an iteration.
    pub fn retiring(&self) -> usize {
        self.retiring.len()
    }

    /// Stop every worker, wait up to the grace period for in-flight iterations and abort the rest.
    ///
    /// Returns the number of workers which had to be aborted.
    pub async fn shutdown(mut self) -> usize {
        self.cancel.cancel();
        let mut workers: Vec<_> = self.workers.drain(..).chain(self.retiring.drain(..)).collect();
        debug!("Shutting down {} virtual users", workers.len());

        let deadline = self.ctx.grace_period + SHUTDOWN_SLACK;
        let joined = tokio::time::timeout(
            deadline,
            join_all(workers.iter_mut().map(|w| &mut w.handle)),
        )
        .await;

        if joined.is_ok() {
            return 0;
        }

        let mut aborted = 0;
        for worker in workers.iter().filter(|w| !w.handle.is_finished()) {
            warn!("Aborting virtual user {} after the grace period", worker.id);
            worker.handle.abort();
            aborted += 1;
        }
        aborted
    }

    fn spawn(&mut self) {
        let id = self.next_id;
        self.next_id += 1;

        let token = self.cancel.child_token();
        let handle = tokio::spawn(
            worker_loop(id, self.scenario.clone(), token.clone(), self.ctx.clone())
                .in_current_span(),
        );

        self.workers.push(Worker { id, token, handle });
    }

    /// Drop retired workers which have finished and detect live workers which died.
    fn reap(&mut self) -> Result<(), RunError> {
        self.retiring.retain(|w| !w.handle.is_finished());

        match self.workers.iter().find(|w| w.handle.is_finished()) {
            Some(worker) if !worker.token.is_cancelled() => Err(RunError::WorkerExited(worker.id)),
            _ => Ok(()),
        }
    }
}

fn rate_limiter(max_rps: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(max_rps).allow_burst(NonZeroU32::MIN))
}
