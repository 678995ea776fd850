use serde::{Deserialize, Serialize};

use super::labels::Labels;

/// Inclusive millisecond time range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub min: i64,
    pub max: i64,
}

impl TimeRange {
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    /// Raise the lower bound, never lowering it and never touching the upper bound
    pub fn with_min_at_least(self, min: i64) -> Self {
        Self {
            min: self.min.max(min),
            max: self.max,
        }
    }

    /// Check whether `[min_time, max_time]` intersects this range
    pub fn overlaps(&self, min_time: i64, max_time: i64) -> bool {
        min_time <= self.max && max_time >= self.min
    }
}

/// A single (timestamp, value) point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp_ms: i64,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp_ms: i64, value: f64) -> Self {
        Self {
            timestamp_ms,
            value,
        }
    }
}

/// A trace-linked annotation attached to an observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exemplar {
    pub labels: Labels,
    pub value: f64,
    pub timestamp_ms: i64,
}

/// Exemplars of one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExemplarResult {
    pub series_labels: Labels,
    pub exemplars: Vec<Exemplar>,
}
