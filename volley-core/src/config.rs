use crate::{
    ConfigError, Thresholds, DEFAULT_BASE_URL, DEFAULT_GRACE_PERIOD, DEFAULT_PAUSE,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_TICK, DEFAULT_USER_AGENT,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::path::Path;
use std::time::Duration;

/// One segment of the concurrency ramp.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: usize,
}

impl Stage {
    pub fn new(duration: Duration, target: usize) -> Self {
        Self { duration, target }
    }
}

/// What the schedule asks for once every stage has elapsed.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AfterLastStage {
    /// Ramp down to zero virtual users.
    #[default]
    Idle,
    /// Keep the last stage's target. The run goes on at that level until `max_duration`, so
    /// `Hold` only matters when `max_duration` is longer than the stages.
    Hold,
}

/// Validated, immutable configuration of a single run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub stages: Vec<Stage>,
    pub start_target: usize,
    pub after_last_stage: AfterLastStage,
    pub max_duration: Duration,
    pub pause: Duration,
    pub tick: Duration,
    pub grace_period: Duration,
    pub max_rps: Option<NonZeroU32>,
    pub thresholds: Thresholds,
}

impl RunConfig {
    /// Config with default pacing whose hard cutoff is the sum of the stage durations.
    pub fn new(stages: Vec<Stage>) -> Self {
        let max_duration = stage_duration_sum(&stages).unwrap_or(Duration::MAX);
        Self {
            stages,
            start_target: 0,
            after_last_stage: AfterLastStage::default(),
            max_duration,
            pause: DEFAULT_PAUSE,
            tick: DEFAULT_TICK,
            grace_period: DEFAULT_GRACE_PERIOD,
            max_rps: None,
            thresholds: Thresholds::default(),
        }
    }

    pub fn max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }

    pub fn pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn start_target(mut self, start_target: usize) -> Self {
        self.start_target = start_target;
        self
    }

    pub fn after_last_stage(mut self, after_last_stage: AfterLastStage) -> Self {
        self.after_last_stage = after_last_stage;
        self
    }

    pub fn max_rps(mut self, max_rps: NonZeroU32) -> Self {
        self.max_rps = Some(max_rps);
        self
    }

    pub fn thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Sum of every stage's duration, `DurationOverflow` if it does not fit in a `Duration`.
    pub fn total_stage_duration(&self) -> Result<Duration, ConfigError> {
        stage_duration_sum(&self.stages).ok_or(ConfigError::DurationOverflow)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stages.is_empty() {
            return Err(ConfigError::NoStages);
        }
        self.total_stage_duration()?;
        if self.max_duration.is_zero() {
            return Err(ConfigError::ZeroDuration("maxDuration"));
        }
        if self.tick.is_zero() {
            return Err(ConfigError::ZeroDuration("tick"));
        }
        Ok(())
    }
}

/// Where and how the built-in HTTP scenario sends its requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestConfig {
    pub base_url: String,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            headers: default_headers(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

fn default_headers() -> Vec<(String, String)> {
    vec![
        ("Accept".to_string(), "*/*".to_string()),
        ("User-Agent".to_string(), DEFAULT_USER_AGENT.to_string()),
    ]
}

/// On-disk form of a run definition.
///
/// Durations are humantime strings (`"5m"`, `"1s"`, `"250ms"`) and targets are signed so that a
/// negative value is reported as a [`ConfigError`] rather than a generic parse failure.
///
/// ```json
/// {
///   "stages": [{ "duration": "5m", "target": 50 }],
///   "maxDuration": "20m",
///   "thresholds": { "http_req_duration": ["p(95)<2000"] }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RunConfigFile {
    pub stages: Vec<StageFile>,
    #[serde(default)]
    pub start_target: i64,
    #[serde(default)]
    pub after_last_stage: AfterLastStage,
    pub max_duration: Option<String>,
    pub pause: Option<String>,
    pub tick: Option<String>,
    pub grace_period: Option<String>,
    pub max_rps: Option<u32>,
    #[serde(default)]
    pub thresholds: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub request: RequestFile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageFile {
    pub duration: String,
    pub target: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RequestFile {
    pub base_url: Option<String>,
    pub headers: Option<BTreeMap<String, String>>,
    pub timeout: Option<String>,
}

impl RunConfigFile {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path.as_ref()).map_err(serde_json::Error::io)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    pub fn validate(&self) -> Result<RunConfig, ConfigError> {
        let stages = self
            .stages
            .iter()
            .enumerate()
            .map(|(index, stage)| {
                if stage.duration.trim_start().starts_with('-') {
                    return Err(ConfigError::NegativeStageDuration {
                        index,
                        duration: stage.duration.clone(),
                    });
                }
                let field = format!("stages[{index}].duration");
                let duration = parse_duration(&field, &stage.duration)?;
                let target = usize::try_from(stage.target).map_err(|_| ConfigError::NegativeTarget {
                    index,
                    target: stage.target,
                })?;
                Ok(Stage::new(duration, target))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let start_target = usize::try_from(self.start_target)
            .map_err(|_| ConfigError::NegativeStartTarget(self.start_target))?;

        let mut config = RunConfig::new(stages)
            .start_target(start_target)
            .after_last_stage(self.after_last_stage)
            .thresholds(Thresholds::parse(&self.thresholds)?);

        if let Some(max_duration) = &self.max_duration {
            config.max_duration = parse_duration("maxDuration", max_duration)?;
        }
        if let Some(pause) = &self.pause {
            config.pause = parse_duration("pause", pause)?;
        }
        if let Some(tick) = &self.tick {
            config.tick = parse_duration("tick", tick)?;
        }
        if let Some(grace_period) = &self.grace_period {
            config.grace_period = parse_duration("gracePeriod", grace_period)?;
        }
        if let Some(max_rps) = self.max_rps {
            config.max_rps = Some(NonZeroU32::new(max_rps).ok_or(ConfigError::ZeroMaxRps)?);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn request(&self) -> Result<RequestConfig, ConfigError> {
        let mut request = RequestConfig::default();
        if let Some(base_url) = &self.request.base_url {
            request.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(headers) = &self.request.headers {
            for name in headers.keys() {
                if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c == ':') {
                    return Err(ConfigError::InvalidHeader(name.clone()));
                }
            }
            request.headers = headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
        }
        if let Some(timeout) = &self.request.timeout {
            request.timeout = parse_duration("request.timeout", timeout)?;
        }
        Ok(request)
    }
}

/// Checked sum of the stage durations.
pub fn stage_duration_sum(stages: &[Stage]) -> Option<Duration> {
    stages
        .iter()
        .try_fold(Duration::ZERO, |total, stage| total.checked_add(stage.duration))
}

fn parse_duration(field: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|source| ConfigError::InvalidDuration {
        field: field.to_string(),
        value: value.to_string(),
        source,
    })
}
