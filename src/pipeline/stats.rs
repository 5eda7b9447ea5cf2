//! Target statistics shared by the solvers, the binner and the reports
//!
//! Every bin is summarized by the count, sum and sum of squares of the target
//! values that fell into it. All derived quantities (aggregate, encoded value,
//! separation) are pure functions of these sums and the dataset totals.

use serde::{Deserialize, Serialize};

use super::encoding::EncodingStrategy;
use super::quality::separation_term;

/// Kind of target the process was fitted against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// Target values are all 0 or 1; the aggregate is an event rate
    Binary,
    /// Any finite target; the aggregate is a mean
    Continuous,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetKind::Binary => write!(f, "binary"),
            TargetKind::Continuous => write!(f, "continuous"),
        }
    }
}

/// Running target sums for a group of rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentStats {
    pub count: usize,
    pub sum: f64,
    pub sum_sq: f64,
}

impl SegmentStats {
    #[inline]
    pub fn push(&mut self, y: f64) {
        self.count += 1;
        self.sum += y;
        self.sum_sq += y * y;
    }

    #[inline]
    pub fn merge(&self, other: &SegmentStats) -> SegmentStats {
        SegmentStats {
            count: self.count + other.count,
            sum: self.sum + other.sum,
            sum_sq: self.sum_sq + other.sum_sq,
        }
    }

    /// Target mean (event rate for binary targets), or 0 for an empty segment
    #[inline]
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    pub fn from_targets<'a>(targets: impl IntoIterator<Item = &'a f64>) -> SegmentStats {
        let mut stats = SegmentStats::default();
        for &y in targets {
            stats.push(y);
        }
        stats
    }
}

/// Dataset-level target totals (missing-value rows included)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetTotals {
    pub kind: TargetKind,
    pub stats: SegmentStats,
}

impl TargetTotals {
    pub fn new(kind: TargetKind, target: &[f64]) -> Self {
        Self {
            kind,
            stats: SegmentStats::from_targets(target),
        }
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.stats.count
    }

    #[inline]
    pub fn mean(&self) -> f64 {
        self.stats.mean()
    }

    /// Total events (target = 1) for a binary target
    #[inline]
    pub fn events(&self) -> f64 {
        self.stats.sum
    }

    /// Total non-events (target = 0) for a binary target
    #[inline]
    pub fn non_events(&self) -> f64 {
        self.stats.count as f64 - self.stats.sum
    }

    /// Total sum of squares around the overall mean
    pub fn total_ss(&self) -> f64 {
        if self.stats.count == 0 {
            return 0.0;
        }
        let n = self.stats.count as f64;
        (self.stats.sum_sq - self.stats.sum * self.stats.sum / n).max(0.0)
    }
}

/// Statistics of a single fitted bin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinStats {
    /// Number of rows in this bin
    pub count: usize,
    /// Sum of target values (event count for binary targets)
    pub target_sum: f64,
    /// Sum of squared target values
    pub target_sum_sq: f64,
    /// Mean target (event rate for binary targets); 0 for an empty bin
    pub target_aggregate: f64,
    /// Value substituted for raw values falling in this bin
    pub encoded_value: f64,
    /// Contribution of this bin to the variable's separation
    pub separation: f64,
    /// Percentage of all records in this bin
    pub population_pct: f64,
}

impl BinStats {
    pub fn from_segment(
        segment: &SegmentStats,
        totals: &TargetTotals,
        encoding: EncodingStrategy,
    ) -> Self {
        let population_pct = if totals.count() > 0 {
            segment.count as f64 / totals.count() as f64 * 100.0
        } else {
            0.0
        };

        Self {
            count: segment.count,
            target_sum: segment.sum,
            target_sum_sq: segment.sum_sq,
            target_aggregate: segment.mean(),
            encoded_value: encoding.encode(segment, totals),
            separation: separation_term(segment, totals),
            population_pct,
        }
    }

    pub fn segment(&self) -> SegmentStats {
        SegmentStats {
            count: self.count,
            sum: self.target_sum,
            sum_sq: self.target_sum_sq,
        }
    }

    /// Event count for a binary target
    #[inline]
    pub fn events(&self) -> f64 {
        self.target_sum
    }

    /// Non-event count for a binary target
    #[inline]
    pub fn non_events(&self) -> f64 {
        self.count as f64 - self.target_sum
    }
}
