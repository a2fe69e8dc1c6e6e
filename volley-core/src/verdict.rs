use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Outcome of a single threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdResult {
    pub metric: String,
    pub expression: String,
    pub observed: f64,
    pub passed: bool,
}

/// Final pass/fail determination of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub results: BTreeMap<String, ThresholdResult>,
    pub passed: bool,
}

impl Verdict {
    pub fn new(results: BTreeMap<String, ThresholdResult>) -> Self {
        let passed = results.values().all(|r| r.passed);
        Self { results, passed }
    }

    pub fn failures(&self) -> impl Iterator<Item = (&String, &ThresholdResult)> {
        self.results.iter().filter(|(_, r)| !r.passed)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, result) in &self.results {
            let mark = if result.passed { "✓" } else { "✗" };
            writeln!(f, "  {mark} {id} (observed {:.4})", result.observed)?;
        }
        Ok(())
    }
}
