//! Threshold expressions
//!
//! Thresholds are written the way load-test configs usually spell them, one list of expressions
//! per metric:
//!
//! ```json
//! { "http_req_duration": ["p(95)<2000", "avg<500"], "http_req_failed": ["rate<0.05"] }
//! ```
//!
//! Each expression is parsed once, at configuration time, into a [`Threshold`]. Evaluation never
//! interprets strings.
use crate::{
    ConfigError, METRIC_CHECKS, METRIC_ITERATIONS, METRIC_REQS, METRIC_REQ_DURATION,
    METRIC_REQ_FAILED,
};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    /// Request latency, in milliseconds.
    RequestDuration,
    /// Share of requests which failed.
    RequestFailed,
    /// Number of requests.
    Requests,
    /// Share of checks which passed.
    Checks,
    /// Number of completed scenario iterations.
    Iterations,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::RequestDuration => METRIC_REQ_DURATION,
            Metric::RequestFailed => METRIC_REQ_FAILED,
            Metric::Requests => METRIC_REQS,
            Metric::Checks => METRIC_CHECKS,
            Metric::Iterations => METRIC_ITERATIONS,
        }
    }

    fn supports(&self, aggregation: Aggregation) -> bool {
        use Aggregation::*;
        match self {
            Metric::RequestDuration => {
                matches!(aggregation, Avg | Min | Max | Med | Percentile(_))
            }
            Metric::RequestFailed | Metric::Checks => matches!(aggregation, Rate),
            Metric::Requests | Metric::Iterations => matches!(aggregation, Count | Rate),
        }
    }
}

impl FromStr for Metric {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            METRIC_REQ_DURATION => Ok(Metric::RequestDuration),
            METRIC_REQ_FAILED => Ok(Metric::RequestFailed),
            METRIC_REQS => Ok(Metric::Requests),
            METRIC_CHECKS => Ok(Metric::Checks),
            METRIC_ITERATIONS => Ok(Metric::Iterations),
            other => Err(ConfigError::UnknownMetric(other.to_string())),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Aggregation {
    Avg,
    Min,
    Max,
    Med,
    /// Percentile in `[0, 100]`.
    Percentile(f64),
    Rate,
    Count,
}

impl FromStr for Aggregation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "avg" => Ok(Aggregation::Avg),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            "med" => Ok(Aggregation::Med),
            "rate" => Ok(Aggregation::Rate),
            "count" => Ok(Aggregation::Count),
            _ => {
                let inner = s
                    .strip_prefix("p(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .ok_or_else(|| format!("unknown aggregation `{s}`"))?;
                let pct: f64 = inner
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid percentile `{inner}`"))?;
                if !(0. ..=100.).contains(&pct) {
                    return Err(format!("percentile {pct} is outside 0..=100"));
                }
                Ok(Aggregation::Percentile(pct))
            }
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Avg => f.write_str("avg"),
            Aggregation::Min => f.write_str("min"),
            Aggregation::Max => f.write_str("max"),
            Aggregation::Med => f.write_str("med"),
            Aggregation::Percentile(p) => write!(f, "p({p})"),
            Aggregation::Rate => f.write_str("rate"),
            Aggregation::Count => f.write_str("count"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Comparator {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparator {
    pub fn holds(&self, observed: f64, bound: f64) -> bool {
        match self {
            Comparator::Lt => observed < bound,
            Comparator::Le => observed <= bound,
            Comparator::Gt => observed > bound,
            Comparator::Ge => observed >= bound,
            Comparator::Eq => observed == bound,
            Comparator::Ne => observed != bound,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
            Comparator::Eq => "==",
            Comparator::Ne => "!=",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A pass/fail predicate over one aggregated metric, e.g. `http_req_duration: p(95)<2000`.
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub metric: Metric,
    pub aggregation: Aggregation,
    pub comparator: Comparator,
    pub value: f64,
}

impl Threshold {
    pub fn new(
        metric: Metric,
        aggregation: Aggregation,
        comparator: Comparator,
        value: f64,
    ) -> Self {
        Self {
            metric,
            aggregation,
            comparator,
            value,
        }
    }

    /// Parse a single expression such as `p(95)<2000` for the given metric.
    pub fn parse(metric: Metric, expression: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidThreshold {
            expression: expression.to_string(),
            reason,
        };

        let op_start = expression
            .find(['<', '>', '=', '!'])
            .ok_or_else(|| invalid("missing comparator".to_string()))?;
        let (lhs, rest) = expression.split_at(op_start);

        let (comparator, rhs) = [
            ("<=", Comparator::Le),
            (">=", Comparator::Ge),
            ("==", Comparator::Eq),
            ("!=", Comparator::Ne),
            ("<", Comparator::Lt),
            (">", Comparator::Gt),
        ]
        .into_iter()
        .find_map(|(symbol, cmp)| rest.strip_prefix(symbol).map(|rhs| (cmp, rhs)))
        .ok_or_else(|| invalid(format!("unknown comparator in `{rest}`")))?;

        let aggregation: Aggregation = lhs.parse().map_err(invalid)?;
        let value: f64 = rhs
            .trim()
            .parse()
            .map_err(|_| invalid(format!("`{}` is not a number", rhs.trim())))?;
        if !value.is_finite() {
            return Err(invalid("bound must be finite".to_string()));
        }

        if !metric.supports(aggregation) {
            return Err(ConfigError::UnsupportedAggregation {
                metric: metric.to_string(),
                aggregation: aggregation.to_string(),
            });
        }

        Ok(Self::new(metric, aggregation, comparator, value))
    }

    /// Stable identifier used as the key in a verdict.
    pub fn id(&self) -> String {
        self.to_string()
    }

    pub fn expression(&self) -> String {
        format!("{}{}{}", self.aggregation, self.comparator, self.value)
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.metric, self.expression())
    }
}

/// Every threshold of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Thresholds(Vec<Threshold>);

impl Thresholds {
    pub fn new(thresholds: Vec<Threshold>) -> Self {
        Self(thresholds)
    }

    /// Parse the `{ metric: [expression, ..] }` map of a configuration file.
    ///
    /// Thresholds come out sorted by metric name, then in the order listed for each metric.
    pub fn parse(definitions: &BTreeMap<String, Vec<String>>) -> Result<Self, ConfigError> {
        let mut thresholds = vec![];
        for (metric, expressions) in definitions {
            let metric: Metric = metric.parse()?;
            for expression in expressions {
                thresholds.push(Threshold::parse(metric, expression)?);
            }
        }
        Ok(Self(thresholds))
    }

    /// Convenience for building thresholds in code: `[("http_req_failed", "rate<0.05")]`.
    ///
    /// Keeps the order of `pairs`.
    pub fn from_pairs<'a>(
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, ConfigError> {
        pairs
            .into_iter()
            .map(|(metric, expression)| Threshold::parse(metric.parse()?, expression))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn push(&mut self, threshold: Threshold) {
        self.0.push(threshold);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Threshold> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
