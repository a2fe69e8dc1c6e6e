use std::time::Duration;

/// How often the scheduling loop recomputes the target concurrency.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Pause between two iterations of the same virtual user.
pub const DEFAULT_PAUSE: Duration = Duration::from_secs(1);

/// Time an in-flight iteration is given to finish once its worker is stopped.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Per-request timeout used by the HTTP capability when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_BASE_URL: &str = "http://localhost:9090";
pub const DEFAULT_USER_AGENT: &str = "volley-performance-test";

// Metric names understood by threshold expressions.
pub const METRIC_REQ_DURATION: &str = "http_req_duration";
pub const METRIC_REQ_FAILED: &str = "http_req_failed";
pub const METRIC_REQS: &str = "http_reqs";
pub const METRIC_CHECKS: &str = "checks";
pub const METRIC_ITERATIONS: &str = "iterations";
