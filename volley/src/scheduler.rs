//! Staged concurrency ramp
use std::time::Duration;
use volley_core::{stage_duration_sum, AfterLastStage, ConfigError, RunConfig, Stage};

/// Piecewise-linear concurrency profile.
///
/// Each stage ramps linearly from the previous stage's target (or `start_target` for the first
/// stage) to its own target over its duration. The schedule holds no mutable state:
/// [`Schedule::target_concurrency`] depends only on the elapsed time.
#[derive(Debug, Clone)]
pub struct Schedule {
    start_target: usize,
    stages: Vec<Stage>,
    after_last_stage: AfterLastStage,
    total: Duration,
}

impl Schedule {
    pub fn new(
        start_target: usize,
        stages: Vec<Stage>,
        after_last_stage: AfterLastStage,
    ) -> Result<Self, ConfigError> {
        if stages.is_empty() {
            return Err(ConfigError::NoStages);
        }

        let total = stage_duration_sum(&stages).ok_or(ConfigError::DurationOverflow)?;
        Ok(Self {
            start_target,
            stages,
            after_last_stage,
            total,
        })
    }

    pub fn from_config(config: &RunConfig) -> Result<Self, ConfigError> {
        Self::new(
            config.start_target,
            config.stages.clone(),
            config.after_last_stage,
        )
    }

    /// Sum of every stage's duration.
    pub fn total_duration(&self) -> Duration {
        self.total
    }

    pub fn is_finished(&self, elapsed: Duration) -> bool {
        elapsed >= self.total
    }

    /// Index of the stage active at `elapsed`, `None` once the schedule is over.
    pub fn stage_index(&self, elapsed: Duration) -> Option<usize> {
        let mut stage_end = Duration::ZERO;
        for (idx, stage) in self.stages.iter().enumerate() {
            stage_end += stage.duration;
            if elapsed < stage_end {
                return Some(idx);
            }
        }
        None
    }

    pub fn target_concurrency(&self, elapsed: Duration) -> usize {
        let mut from = self.start_target;
        let mut stage_start = Duration::ZERO;

        for stage in &self.stages {
            let stage_end = stage_start + stage.duration;
            // NOTE: A zero-duration stage is skipped over here, which makes it an instant jump.
            if elapsed < stage_end {
                return interpolate(from, stage.target, elapsed - stage_start, stage.duration);
            }
            from = stage.target;
            stage_start = stage_end;
        }

        match self.after_last_stage {
            AfterLastStage::Idle => 0,
            AfterLastStage::Hold => from,
        }
    }
}

fn interpolate(from: usize, to: usize, into_stage: Duration, stage: Duration) -> usize {
    if from == to {
        return to;
    }

    let progress = (into_stage.as_secs_f64() / stage.as_secs_f64()).clamp(0., 1.);
    let value = from as f64 + (to as f64 - from as f64) * progress;
    let (lo, hi) = (from.min(to), from.max(to));
    (value.round() as usize).clamp(lo, hi)
}
