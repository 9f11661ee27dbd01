//! Result types of collection runs and analytics queries.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Counters of one collection run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectStats {
    pub windows: usize,
    pub strategies_run: usize,
    pub pages_fetched: usize,
    pub records_seen: usize,
    pub new_records: usize,
    pub duplicates_skipped: usize,
    pub rate_limited: usize,
    pub transient_failures: usize,
    pub pages_skipped: usize,
    pub record_failures: usize,
    pub unique_questions: usize,
    pub interrupted: bool,
}

impl fmt::Display for CollectStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pages, {} records ({} new, {} duplicate), {} rate-limited, {} skipped pages, {} failed records",
            self.pages_fetched,
            self.records_seen,
            self.new_records,
            self.duplicates_skipped,
            self.rate_limited,
            self.pages_skipped,
            self.record_failures
        )
    }
}

/// Timing wrapper around [`CollectStats`].
#[derive(Debug, Clone, Serialize)]
pub struct CollectSummary {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub stats: CollectStats,
}

/// Month label to question count.
pub type TrendSeries = BTreeMap<String, usize>;

/// A ranked label with its count (tag or `"a + b"` pair).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedCount {
    pub label: String,
    pub count: usize,
}

impl RankedCount {
    pub fn new(label: impl Into<String>, count: usize) -> Self {
        Self {
            label: label.into(),
            count,
        }
    }
}

/// Metric value of one solvability partition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Count(u64),
    Mean(f64),
}

impl MetricValue {
    fn is_fractional(&self) -> bool {
        matches!(self, MetricValue::Mean(_))
    }

    fn as_f64(&self) -> f64 {
        match *self {
            MetricValue::Count(n) => n as f64,
            MetricValue::Mean(v) => v,
        }
    }
}

/// Render `solvable_hard`, with two decimals when either side is fractional.
pub fn format_pair(solvable: MetricValue, hard: MetricValue) -> String {
    if solvable.is_fractional() || hard.is_fractional() {
        format!("{:.2}_{:.2}", solvable.as_f64(), hard.as_f64())
    } else {
        format!("{}_{}", solvable.as_f64() as u64, hard.as_f64() as u64)
    }
}

/// Comparison of solvable and hard questions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolvabilityReport {
    pub solvable_count: usize,
    pub hard_count: usize,
    /// Metric name to `"solvable_hard"`
    pub metrics: BTreeMap<String, String>,
}
