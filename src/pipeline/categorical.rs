//! Optimal grouping of categorical levels
//!
//! Levels are summarized per category, optionally pre-merged when rare,
//! ordered by their target aggregate and then merged into contiguous groups
//! with the same partition search used for numerical variables. Ordering by
//! aggregate makes every contiguous grouping ascending, so no trend
//! constraint is applied.

use std::collections::BTreeMap;

use super::config::BinningConstraints;
use super::quality::{quality_from_separation, separation_term};
use super::solver::{bounded_ranges, search_partition, Budget, FitStatus, MonotonicTrend};
use super::stats::{SegmentStats, TargetTotals};

/// One or more levels treated as a unit by the search
#[derive(Debug, Clone, PartialEq)]
pub struct LevelGroup {
    /// Member levels in name order
    pub levels: Vec<String>,
    pub stats: SegmentStats,
}

/// Result of the categorical solver
#[derive(Debug, Clone)]
pub struct CategoricalSolution {
    /// Ordered level groups; a partition of the observed levels
    pub groups: Vec<Vec<String>>,
    /// Separation of the regular groups plus the missing bin
    pub separation: f64,
    pub quality_score: f64,
    pub status: FitStatus,
    pub budget_exhausted: bool,
    pub message: Option<String>,
}

/// Per-level target sums and the sums of missing rows
pub fn level_statistics(
    values: &[Option<String>],
    target: &[f64],
) -> (BTreeMap<String, SegmentStats>, SegmentStats) {
    let mut levels: BTreeMap<String, SegmentStats> = BTreeMap::new();
    let mut missing = SegmentStats::default();

    for (value, &y) in values.iter().zip(target.iter()) {
        match value {
            Some(level) => levels.entry(level.clone()).or_default().push(y),
            None => missing.push(y),
        }
    }

    (levels, missing)
}

/// Order levels by target aggregate, pre-merging levels with fewer than
/// `min_samples` rows into a single unit.
pub fn ordered_level_groups(
    levels: &BTreeMap<String, SegmentStats>,
    min_samples: Option<usize>,
) -> Vec<LevelGroup> {
    let mut units: Vec<LevelGroup> = Vec::with_capacity(levels.len());
    let mut rare = LevelGroup {
        levels: Vec::new(),
        stats: SegmentStats::default(),
    };

    for (level, stats) in levels {
        match min_samples {
            Some(min) if stats.count < min => {
                rare.levels.push(level.clone());
                rare.stats = rare.stats.merge(stats);
            }
            _ => units.push(LevelGroup {
                levels: vec![level.clone()],
                stats: *stats,
            }),
        }
    }

    if !rare.levels.is_empty() {
        units.push(rare);
    }

    units.sort_by(|a, b| {
        a.stats
            .mean()
            .total_cmp(&b.stats.mean())
            .then_with(|| a.levels[0].cmp(&b.levels[0]))
    });

    units
}

fn flatten(units: &[LevelGroup]) -> Vec<String> {
    units.iter().flat_map(|u| u.levels.iter().cloned()).collect()
}

/// Find the optimal grouping of a categorical variable's levels
pub fn solve_categorical(
    values: &[Option<String>],
    target: &[f64],
    totals: &TargetTotals,
    constraints: &BinningConstraints,
) -> CategoricalSolution {
    let mut budget = Budget::new(&constraints.budget);
    let (levels, missing) = level_statistics(values, target);
    let missing_separation = separation_term(&missing, totals);
    let n_rows: usize = levels.values().map(|s| s.count).sum();

    let finish = |groups: Vec<Vec<String>>,
                  regular: f64,
                  status: FitStatus,
                  exhausted: bool,
                  message: Option<String>| {
        let separation = regular + missing_separation;
        CategoricalSolution {
            groups,
            separation,
            quality_score: quality_from_separation(separation),
            status,
            budget_exhausted: exhausted,
            message,
        }
    };

    if levels.is_empty() {
        return finish(
            Vec::new(),
            0.0,
            FitStatus::Empty,
            false,
            Some("no non-missing values".to_string()),
        );
    }

    let units = ordered_level_groups(&levels, constraints.min_category_samples);

    if units.len() == 1 {
        let regular = separation_term(&units[0].stats, totals);
        return finish(vec![flatten(&units)], regular, FitStatus::Optimal, false, None);
    }

    if units.len() < constraints.min_bins {
        let regular = units.iter().map(|u| separation_term(&u.stats, totals)).sum();
        let message = format!(
            "{} category groups, fewer than min_bins = {}",
            units.len(),
            constraints.min_bins
        );
        return finish(
            units.into_iter().map(|u| u.levels).collect(),
            regular,
            FitStatus::Undefined,
            false,
            Some(message),
        );
    }

    // Bound the search size like numerical prebinning, never splitting a level
    let counts: Vec<usize> = units.iter().map(|u| u.stats.count).collect();
    let ranges = bounded_ranges(&counts, constraints.max_n_prebins, constraints.min_bins);
    let buckets: Vec<LevelGroup> = ranges
        .iter()
        .map(|&(start, end)| LevelGroup {
            levels: flatten(&units[start..=end]),
            stats: units[start..=end]
                .iter()
                .fold(SegmentStats::default(), |acc, u| acc.merge(&u.stats)),
        })
        .collect();

    let stats: Vec<SegmentStats> = buckets.iter().map(|b| b.stats).collect();
    let search = search_partition(
        &stats,
        totals,
        constraints,
        MonotonicTrend::None,
        n_rows,
        &mut budget,
    );

    let groups = search
        .boundaries
        .iter()
        .map(|&(start, end)| flatten(&buckets[start..=end]))
        .collect();

    finish(
        groups,
        search.separation,
        search.status,
        search.budget_exhausted,
        search.message,
    )
}
