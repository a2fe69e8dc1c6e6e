use thiserror::Error;

/// Invalid stage, threshold or run definitions. Detected before any load is generated.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("At least one stage is required")]
    NoStages,

    #[error("Stage {index} has a negative duration ({duration})")]
    NegativeStageDuration { index: usize, duration: String },

    #[error("Stage {index} has a negative target concurrency ({target})")]
    NegativeTarget { index: usize, target: i64 },

    #[error("Start target must not be negative ({0})")]
    NegativeStartTarget(i64),

    #[error("Invalid duration for `{field}`: {value:?} ({source})")]
    InvalidDuration {
        field: String,
        value: String,
        #[source]
        source: humantime::DurationError,
    },

    #[error("Total stage duration is too large")]
    DurationOverflow,

    #[error("`{0}` must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("`maxRps` must be greater than zero")]
    ZeroMaxRps,

    #[error("Unknown metric `{0}` in thresholds")]
    UnknownMetric(String),

    #[error("Invalid threshold expression {expression:?}: {reason}")]
    InvalidThreshold { expression: String, reason: String },

    #[error("Aggregation `{aggregation}` is not supported for metric `{metric}`")]
    UnsupportedAggregation { metric: String, aggregation: String },

    #[error("Invalid header `{0}`")]
    InvalidHeader(String),

    #[error("Error parsing configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Raised when a verdict is requested for a run which produced nothing to judge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InsufficientData {
    #[error("No samples were recorded")]
    NoSamples,

    #[error("No checks were recorded for threshold `{0}`")]
    NoChecks(String),
}
