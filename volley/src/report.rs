//! Run report output
use serde::Serialize;
use std::fmt;
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};
use volley_core::{Aggregate, AggregateSummary, Verdict};

/// Process exit status for a run which met every threshold.
pub const EXIT_PASSED: i32 = 0;
/// The run completed but at least one threshold failed.
pub const EXIT_THRESHOLDS_FAILED: i32 = 99;
/// The run never started because its configuration is invalid.
pub const EXIT_INVALID_CONFIG: i32 = 104;
/// The run was cancelled from the outside (e.g. Ctrl+C).
pub const EXIT_CANCELLED: i32 = 105;
/// The run could not complete: setup failure, fatal error or nothing to evaluate.
pub const EXIT_ABORTED: i32 = 107;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RunState {
    Idle,
    SettingUp,
    Running,
    TearingDown,
    Evaluated,
    Passed,
    Failed,
    Aborted,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Passed | RunState::Failed | RunState::Aborted)
    }
}

/// Why the scheduling loop stopped generating load.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    StagesComplete,
    MaxDuration,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "camelCase")]
pub enum AbortReason {
    InvalidConfig(String),
    SetupFailed(String),
    Cancelled,
    Fatal(String),
    InsufficientData(String),
}

impl AbortReason {
    pub fn exit_code(&self) -> i32 {
        match self {
            AbortReason::InvalidConfig(_) => EXIT_INVALID_CONFIG,
            AbortReason::Cancelled => EXIT_CANCELLED,
            AbortReason::SetupFailed(_)
            | AbortReason::Fatal(_)
            | AbortReason::InsufficientData(_) => EXIT_ABORTED,
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            AbortReason::SetupFailed(msg) => write!(f, "{msg}"),
            AbortReason::Cancelled => write!(f, "cancelled by operator"),
            AbortReason::Fatal(msg) => write!(f, "fatal error: {msg}"),
            AbortReason::InsufficientData(msg) => write!(f, "nothing to evaluate: {msg}"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RunOutcome {
    Passed,
    Failed,
    Aborted,
}

/// Everything known about a finished run.
///
/// Serializes to a stable JSON document (one record per threshold plus an aggregate summary);
/// `Display` renders the human readable summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub name: String,
    pub outcome: RunOutcome,
    pub abort_reason: Option<AbortReason>,
    pub stop_reason: Option<StopReason>,
    pub states: Vec<RunState>,
    pub verdict: Option<Verdict>,
    pub summary: Option<AggregateSummary>,
    #[serde(skip)]
    pub aggregate: Option<Aggregate>,
}

impl RunReport {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            outcome: RunOutcome::Aborted,
            abort_reason: None,
            stop_reason: None,
            states: vec![RunState::Idle],
            verdict: None,
            summary: None,
            aggregate: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.states.last().copied().unwrap_or(RunState::Idle)
    }

    pub fn passed(&self) -> bool {
        self.outcome == RunOutcome::Passed
    }

    pub fn exit_code(&self) -> i32 {
        match (&self.outcome, &self.abort_reason) {
            (RunOutcome::Passed, _) => EXIT_PASSED,
            (RunOutcome::Failed, _) => EXIT_THRESHOLDS_FAILED,
            (RunOutcome::Aborted, Some(reason)) => reason.exit_code(),
            (RunOutcome::Aborted, None) => EXIT_ABORTED,
        }
    }

    pub(crate) fn transition(&mut self, to: RunState) {
        info!("{:?} -> {:?}", self.state(), to);
        self.states.push(to);
    }

    pub(crate) fn set_aggregate(&mut self, aggregate: Aggregate) {
        self.summary = Some(aggregate.summary());
        self.aggregate = Some(aggregate);
    }

    pub(crate) fn abort(mut self, reason: AbortReason) -> Self {
        error!("Run aborted: {reason}");
        self.transition(RunState::Aborted);
        self.outcome = RunOutcome::Aborted;
        self.abort_reason = Some(reason);
        self
    }

    pub(crate) fn conclude(mut self, verdict: Verdict) -> Self {
        self.transition(RunState::Evaluated);
        if verdict.passed {
            self.transition(RunState::Passed);
            self.outcome = RunOutcome::Passed;
        } else {
            for (id, result) in verdict.failures() {
                warn!("Threshold `{id}` failed (observed {:.4})", result.observed);
            }
            self.transition(RunState::Failed);
            self.outcome = RunOutcome::Failed;
        }
        self.verdict = Some(verdict);
        self
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.outcome {
            RunOutcome::Passed => "PASSED",
            RunOutcome::Failed => "FAILED",
            RunOutcome::Aborted => "ABORTED",
        };
        writeln!(f, "load test `{}`: {status}", self.name)?;

        if let Some(reason) = &self.abort_reason {
            writeln!(f, "  reason: {reason}")?;
        }

        if let Some(summary) = &self.summary {
            let elapsed = Duration::from_millis(summary.elapsed_ms as u64);
            writeln!(
                f,
                "  duration: {}, iterations: {}",
                humantime::format_duration(elapsed),
                summary.iterations
            )?;
            writeln!(
                f,
                "  requests: {} ({} failed, {:.2}%)",
                summary.requests,
                summary.failures,
                summary.error_rate.unwrap_or(0.) * 100.
            )?;

            let latency = &summary.latency_ms;
            let ms = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.2}ms"));
            writeln!(
                f,
                "  latency: avg={} min={} med={} p(90)={} p(95)={} max={}",
                ms(latency.avg),
                ms(latency.min),
                ms(latency.med),
                ms(latency.p90),
                ms(latency.p95),
                ms(latency.max),
            )?;

            if !summary.checks.is_empty() {
                writeln!(f, "  checks:")?;
                for (name, counts) in &summary.checks {
                    let mark = if counts.fails == 0 { "✓" } else { "✗" };
                    writeln!(
                        f,
                        "    {mark} {name}: {:.2}% ({}/{})",
                        counts.pass_rate().unwrap_or(0.) * 100.,
                        counts.passes,
                        counts.total()
                    )?;
                }
            }
        }

        if let Some(verdict) = &self.verdict {
            if !verdict.results.is_empty() {
                writeln!(f, "  thresholds:")?;
                write!(f, "{verdict}")?;
            }
        }

        Ok(())
    }
}
