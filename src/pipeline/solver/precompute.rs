//! Precomputation of segment statistics for all contiguous group ranges
//!
//! The dynamic program evaluates every candidate bin `i..=j` many times, so
//! the merged sums, aggregate and separation of each range are computed once
//! up front.

use crate::pipeline::quality::separation_term;
use crate::pipeline::stats::{SegmentStats, TargetTotals};

/// Precomputed statistics for a potential merged bin
#[derive(Debug, Clone)]
pub struct PrecomputedSegment {
    /// Merged target sums of groups `start..=end`
    pub stats: SegmentStats,
    /// Target aggregate (mean or event rate) of the merged bin
    pub aggregate: f64,
    /// Separation contribution of the merged bin
    pub separation: f64,
}

/// Triangular matrix of every contiguous range of ordered groups
#[derive(Debug, Clone)]
pub struct SegmentMatrix {
    rows: Vec<Vec<PrecomputedSegment>>,
    /// `prefix[j]` is the number of rows in groups `0..j`
    prefix: Vec<usize>,
}

impl SegmentMatrix {
    /// Precompute every range of `groups`.
    ///
    /// Uses running sums per start index for O(n^2) work instead of O(n^3).
    #[allow(clippy::needless_range_loop)]
    pub fn new(groups: &[SegmentStats], totals: &TargetTotals) -> Self {
        let n = groups.len();
        let mut rows = Vec::with_capacity(n);

        for i in 0..n {
            let mut row = Vec::with_capacity(n - i);
            let mut cumulative = SegmentStats::default();

            for j in i..n {
                cumulative = cumulative.merge(&groups[j]);
                row.push(PrecomputedSegment {
                    stats: cumulative,
                    aggregate: cumulative.mean(),
                    separation: separation_term(&cumulative, totals),
                });
            }
            rows.push(row);
        }

        let mut prefix = Vec::with_capacity(n + 1);
        prefix.push(0);
        for group in groups {
            let last = prefix.last().copied().unwrap_or(0);
            prefix.push(last + group.count);
        }

        Self { rows, prefix }
    }

    /// Number of ordered groups
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Statistics of the merged groups `start..=end`
    #[inline]
    pub fn get(&self, start: usize, end: usize) -> &PrecomputedSegment {
        &self.rows[start][end - start]
    }

    /// Total rows across all groups
    #[inline]
    pub fn total_count(&self) -> usize {
        self.prefix.last().copied().unwrap_or(0)
    }

    /// Fraction of rows in groups `0..=end`
    #[inline]
    pub fn cumulative_fraction(&self, end: usize) -> f64 {
        let total = self.total_count();
        if total == 0 {
            0.0
        } else {
            self.prefix[end + 1] as f64 / total as f64
        }
    }
}
