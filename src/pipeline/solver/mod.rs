//! Optimal partition search over ordered groups
//!
//! Numerical values are prebinned into at most `max_n_prebins` quantile
//! groups; categorical levels are ordered by target aggregate. Either way the
//! ordered groups are merged into contiguous bins by an exact dynamic program
//! that maximizes the additive separation criterion subject to bin count,
//! minimum bin size and an optional monotonic trend.

mod model;
mod monotonicity;
mod prebin;
mod precompute;

use serde::{Deserialize, Serialize};

use super::config::BinningConstraints;
use super::dataset::is_missing_number;
use super::quality::{quality_from_separation, separation_term};
use super::stats::{SegmentStats, TargetTotals};

pub use model::{Budget, Partition, SearchSettings, SEPARATION_TOLERANCE};
pub use monotonicity::MonotonicTrend;
pub use prebin::{
    bounded_ranges, equal_frequency_ranges, prebin_buckets, split_between, unique_value_groups,
    Prebin,
};
pub use precompute::{PrecomputedSegment, SegmentMatrix};

/// Outcome status of a variable's fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FitStatus {
    /// A best partition under the constraints was found
    Optimal,
    /// Too few distinct values for the requested minimum number of bins
    Undefined,
    /// No non-missing values
    Empty,
    /// No feasible partition, exhausted budget, or a failure while fitting
    Error,
}

impl std::fmt::Display for FitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitStatus::Optimal => write!(f, "OPTIMAL"),
            FitStatus::Undefined => write!(f, "UNDEFINED"),
            FitStatus::Empty => write!(f, "EMPTY"),
            FitStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Result of searching a partition of ordered groups
#[derive(Debug, Clone)]
pub struct PartitionSearch {
    /// Inclusive `(start, end)` group indices of each bin
    pub boundaries: Vec<(usize, usize)>,
    /// Separation of the regular bins
    pub separation: f64,
    pub status: FitStatus,
    /// Trend actually enforced (`Auto` resolved to a direction)
    pub trend: MonotonicTrend,
    pub budget_exhausted: bool,
    pub message: Option<String>,
}

/// Result of the numerical solver
#[derive(Debug, Clone)]
pub struct NumericalSolution {
    /// Finite, strictly increasing split points
    pub splits: Vec<f64>,
    /// Separation of the regular bins plus the missing bin
    pub separation: f64,
    pub quality_score: f64,
    pub status: FitStatus,
    pub monotonic_trend: MonotonicTrend,
    pub budget_exhausted: bool,
    pub message: Option<String>,
}

/// Search with `min_count` halved down to 1 until a partition is feasible
fn relaxed_search(
    matrix: &SegmentMatrix,
    settings: SearchSettings,
    budget: &mut Budget,
) -> (Option<Partition>, usize) {
    let mut current = settings;
    loop {
        let outcome = model::search(matrix, &current, budget);
        if outcome.best.is_some() || outcome.exhausted || current.min_count <= 1 {
            return (outcome.best, current.min_count);
        }
        current.min_count = (current.min_count / 2).max(1);
    }
}

fn catch_all(matrix: &SegmentMatrix) -> (Vec<(usize, usize)>, f64) {
    let last = matrix.len().saturating_sub(1);
    let separation = if matrix.is_empty() {
        0.0
    } else {
        matrix.get(0, last).separation
    };
    (vec![(0, last)], separation)
}

/// Find the best partition of `groups` into contiguous bins.
///
/// `groups` must be non-empty and hold at least `min_bins` entries;
/// `n_rows` is the number of non-missing rows the minimum bin size refers to.
pub fn search_partition(
    groups: &[SegmentStats],
    totals: &TargetTotals,
    constraints: &BinningConstraints,
    trend: MonotonicTrend,
    n_rows: usize,
    budget: &mut Budget,
) -> PartitionSearch {
    let matrix = SegmentMatrix::new(groups, totals);
    let settings = SearchSettings {
        min_bins: constraints.min_bins,
        max_bins: constraints.max_bins,
        min_count: constraints.min_count(n_rows),
        trend: MonotonicTrend::None,
    };

    let mut applied = trend;
    if trend == MonotonicTrend::Auto {
        let (probe, _) = relaxed_search(&matrix, settings, budget);
        applied = match probe {
            Some(partition) => MonotonicTrend::dominant(&partition.aggregates(&matrix)),
            None => MonotonicTrend::None,
        };
    }

    let (found, min_count) = relaxed_search(
        &matrix,
        SearchSettings {
            trend: applied,
            ..settings
        },
        budget,
    );

    if let Some(partition) = found {
        let message = (min_count < settings.min_count).then(|| {
            format!(
                "minimum bin size relaxed from {} to {} rows",
                settings.min_count, min_count
            )
        });
        return PartitionSearch {
            boundaries: partition.boundaries,
            separation: partition.separation,
            status: FitStatus::Optimal,
            trend: applied,
            budget_exhausted: budget.is_exhausted(),
            message,
        };
    }

    if budget.is_exhausted() {
        let (boundaries, separation) = catch_all(&matrix);
        return PartitionSearch {
            boundaries,
            separation,
            status: FitStatus::Error,
            trend: MonotonicTrend::None,
            budget_exhausted: true,
            message: Some(format!(
                "search budget exhausted after {} iterations without a feasible partition",
                budget.iterations()
            )),
        };
    }

    let fallback = if applied != MonotonicTrend::None {
        relaxed_search(&matrix, settings, budget).0
    } else {
        None
    };

    let message = if applied != MonotonicTrend::None {
        format!("no partition satisfies the {} trend", applied)
    } else {
        "no feasible partition".to_string()
    };

    let (boundaries, separation) = match fallback {
        Some(partition) => (partition.boundaries, partition.separation),
        None => catch_all(&matrix),
    };

    PartitionSearch {
        boundaries,
        separation,
        status: FitStatus::Error,
        trend: MonotonicTrend::None,
        budget_exhausted: budget.is_exhausted(),
        message: Some(message),
    }
}

/// Find optimal split points for a numerical variable
pub fn solve_numerical(
    values: &[Option<f64>],
    target: &[f64],
    totals: &TargetTotals,
    constraints: &BinningConstraints,
) -> NumericalSolution {
    let mut budget = Budget::new(&constraints.budget);

    let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(values.len());
    let mut missing = SegmentStats::default();
    for (&value, &y) in values.iter().zip(target.iter()) {
        match value {
            Some(v) if !is_missing_number(value) => pairs.push((v, y)),
            _ => missing.push(y),
        }
    }
    let missing_separation = separation_term(&missing, totals);
    let n_rows = pairs.len();

    let groups = unique_value_groups(&mut pairs);

    let finish = |splits: Vec<f64>,
                  regular: f64,
                  status: FitStatus,
                  trend: MonotonicTrend,
                  exhausted: bool,
                  message: Option<String>| {
        let separation = regular + missing_separation;
        NumericalSolution {
            splits,
            separation,
            quality_score: quality_from_separation(separation),
            status,
            monotonic_trend: trend,
            budget_exhausted: exhausted,
            message,
        }
    };

    if groups.is_empty() {
        return finish(
            Vec::new(),
            0.0,
            FitStatus::Empty,
            MonotonicTrend::None,
            false,
            Some("no non-missing values".to_string()),
        );
    }

    if groups.len() == 1 {
        let regular = separation_term(&groups[0].stats, totals);
        return finish(Vec::new(), regular, FitStatus::Optimal, MonotonicTrend::None, false, None);
    }

    if groups.len() < constraints.min_bins {
        let splits = groups
            .windows(2)
            .map(|w| split_between(w[0].last, w[1].first))
            .collect();
        let regular = groups.iter().map(|g| separation_term(&g.stats, totals)).sum();
        return finish(
            splits,
            regular,
            FitStatus::Undefined,
            MonotonicTrend::None,
            false,
            Some(format!(
                "{} distinct values, fewer than min_bins = {}",
                groups.len(),
                constraints.min_bins
            )),
        );
    }

    let prebins = prebin_buckets(&groups, constraints.max_n_prebins, constraints.min_bins);

    let stats: Vec<SegmentStats> = prebins.iter().map(|p| p.stats).collect();
    let search = search_partition(
        &stats,
        totals,
        constraints,
        constraints.monotonic_trend,
        n_rows,
        &mut budget,
    );

    let splits = search
        .boundaries
        .iter()
        .skip(1)
        .map(|&(start, _)| split_between(prebins[start - 1].last, prebins[start].first))
        .collect();

    finish(
        splits,
        search.separation,
        search.status,
        search.trend,
        search.budget_exhausted,
        search.message,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stats::TargetKind;

    fn constraints(max_bins: usize, min_bin_size: f64) -> BinningConstraints {
        BinningConstraints {
            max_bins,
            min_bin_size,
            ..Default::default()
        }
    }

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn test_outlier_is_isolated() {
        let values = some(&[1.0, 2.0, 2.0, 3.0, 3.0, 3.0, 100.0]);
        let target = [0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0];
        let totals = TargetTotals::new(TargetKind::Binary, &target);

        let solution = solve_numerical(&values, &target, &totals, &constraints(3, 0.1));

        assert_eq!(solution.status, FitStatus::Optimal);
        assert_eq!(solution.splits, vec![2.5, 51.5]);
    }

    #[test]
    fn test_constant_variable() {
        let values = some(&[4.0; 6]);
        let target = [0.0, 1.0, 0.0, 1.0, 0.0, 1.0];
        let totals = TargetTotals::new(TargetKind::Binary, &target);

        let solution = solve_numerical(&values, &target, &totals, &constraints(5, 0.05));
        assert_eq!(solution.status, FitStatus::Optimal);
        assert!(solution.splits.is_empty());
        assert_eq!(solution.quality_score, 1.0);
    }

    #[test]
    fn test_all_missing_is_empty() {
        let values = vec![None, Some(f64::NAN), None];
        let target = [0.0, 1.0, 1.0];
        let totals = TargetTotals::new(TargetKind::Binary, &target);

        let solution = solve_numerical(&values, &target, &totals, &constraints(5, 0.05));
        assert_eq!(solution.status, FitStatus::Empty);
        assert!(solution.splits.is_empty());
    }

    #[test]
    fn test_too_few_distinct_values_is_undefined() {
        let values = some(&[1.0, 1.0, 2.0, 2.0]);
        let target = [0.0, 1.0, 1.0, 1.0];
        let totals = TargetTotals::new(TargetKind::Binary, &target);
        let c = BinningConstraints {
            min_bins: 3,
            max_bins: 5,
            ..Default::default()
        };

        let solution = solve_numerical(&values, &target, &totals, &c);
        assert_eq!(solution.status, FitStatus::Undefined);
        assert_eq!(solution.splits, vec![1.5]);
    }

    #[test]
    fn test_auto_trend_resolves_direction() {
        let values = some(&(0..40).map(|i| i as f64).collect::<Vec<_>>());
        let target: Vec<f64> = (0..40).map(|i| if i >= 25 { 1.0 } else { 0.0 }).collect();
        let totals = TargetTotals::new(TargetKind::Binary, &target);
        let c = BinningConstraints {
            max_bins: 4,
            min_bin_size: 0.1,
            monotonic_trend: MonotonicTrend::Auto,
            ..Default::default()
        };

        let solution = solve_numerical(&values, &target, &totals, &c);
        assert_eq!(solution.status, FitStatus::Optimal);
        assert_eq!(solution.monotonic_trend, MonotonicTrend::Ascending);
    }

    #[test]
    fn test_impossible_trend_falls_back_with_error() {
        // Aggregates 1, 0, 1 in exactly three bins cannot ascend
        let values = some(&[1.0, 2.0, 3.0]);
        let target = [1.0, 0.0, 1.0];
        let totals = TargetTotals::new(TargetKind::Binary, &target);
        let c = BinningConstraints {
            min_bins: 3,
            max_bins: 3,
            min_bin_size: 0.0,
            max_n_prebins: 3,
            monotonic_trend: MonotonicTrend::Ascending,
            ..Default::default()
        };

        let solution = solve_numerical(&values, &target, &totals, &c);
        assert_eq!(solution.status, FitStatus::Error);
        assert_eq!(solution.splits, vec![1.5, 2.5]);
        assert!(solution.message.is_some());
    }
}
