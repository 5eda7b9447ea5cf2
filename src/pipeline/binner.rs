//! Single-variable binning
//!
//! `fit_variable` runs the solver matching a variable's declared type,
//! assigns every row to exactly one bin with the same `BinLocator` used at
//! transform time, and turns the per-bin target sums into `BinStats`.
//! Failures inside the solvers never escape: they are reported as an
//! `ERROR` status with a single catch-all bin.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::categorical::solve_categorical;
use super::config::{BinningConstraints, UnseenPolicy};
use super::dataset::{is_missing_number, ColumnValues, VariableDtype, VariableSpec};
use super::encoding::EncodingStrategy;
use super::error::{BinningError, Result};
use super::quality::{quality_from_separation, QualityScorer};
use super::solver::{solve_numerical, FitStatus, MonotonicTrend};
use super::stats::{BinStats, SegmentStats, TargetTotals};

/// Where categorical levels unseen at fit time go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnseenRoute {
    /// The reserved "other" bin
    Other,
    /// A regular bin
    Bin(usize),
}

/// Fitted bin definitions of one variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BinSet {
    /// Half-open intervals `[s_i, s_{i+1})` between finite, strictly
    /// increasing splits, open-ended at both extremes
    Numerical { splits: Vec<f64> },
    /// Ordered groups of levels partitioning the levels seen at fit time
    Categorical {
        groups: Vec<Vec<String>>,
        unseen: UnseenRoute,
    },
}

/// The bin a single value falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinLocation {
    Regular(usize),
    Missing,
    Other,
}

impl BinSet {
    /// Number of regular bins
    pub fn n_bins(&self) -> usize {
        match self {
            BinSet::Numerical { splits } => splits.len() + 1,
            BinSet::Categorical { groups, .. } => groups.len(),
        }
    }

    /// Human-readable label of each regular bin
    pub fn labels(&self) -> Vec<String> {
        match self {
            BinSet::Numerical { splits } => {
                let mut edges: Vec<String> = Vec::with_capacity(splits.len() + 2);
                edges.push("-inf".to_string());
                edges.extend(splits.iter().map(|s| format!("{}", s)));
                edges.push("inf".to_string());
                edges
                    .windows(2)
                    .map(|w| format!("[{}, {})", w[0], w[1]))
                    .collect()
            }
            BinSet::Categorical { groups, .. } => groups
                .iter()
                .map(|g| format!("[{}]", g.join(", ")))
                .collect(),
        }
    }

    /// Build a locator for repeated lookups
    pub fn locator(&self) -> BinLocator<'_> {
        let levels = match self {
            BinSet::Numerical { .. } => HashMap::new(),
            BinSet::Categorical { groups, .. } => groups
                .iter()
                .enumerate()
                .flat_map(|(i, g)| g.iter().map(move |level| (level.as_str(), i)))
                .collect(),
        };
        BinLocator {
            bin_set: self,
            levels,
        }
    }
}

/// Maps raw values to bins
#[derive(Debug)]
pub struct BinLocator<'a> {
    bin_set: &'a BinSet,
    levels: HashMap<&'a str, usize>,
}

impl BinLocator<'_> {
    /// Bin of a numeric value; `None` and `NaN` are missing
    #[inline]
    pub fn locate_number(&self, value: Option<f64>) -> BinLocation {
        match (self.bin_set, value) {
            (_, v) if is_missing_number(v) => BinLocation::Missing,
            (BinSet::Numerical { splits }, Some(v)) => {
                BinLocation::Regular(splits.partition_point(|&s| s <= v))
            }
            (BinSet::Categorical { .. }, Some(v)) => self.locate_level(Some(&format!("{}", v))),
            (_, None) => BinLocation::Missing,
        }
    }

    /// Bin of a categorical level; unseen levels follow the unseen route
    #[inline]
    pub fn locate_level(&self, value: Option<&str>) -> BinLocation {
        let Some(level) = value else {
            return BinLocation::Missing;
        };
        match self.bin_set {
            BinSet::Categorical { unseen, .. } => match self.levels.get(level) {
                Some(&i) => BinLocation::Regular(i),
                None => match unseen {
                    UnseenRoute::Other => BinLocation::Other,
                    UnseenRoute::Bin(i) => BinLocation::Regular(*i),
                },
            },
            BinSet::Numerical { .. } => BinLocation::Other,
        }
    }

    /// Locate every row of a column.
    ///
    /// Numeric columns against categorical bins are matched through their
    /// string form; string columns against numerical bins are an error.
    pub fn locate_column(&self, column: &ColumnValues) -> Result<Vec<BinLocation>> {
        match (self.bin_set, column) {
            (_, ColumnValues::Numerical(values)) => {
                Ok(values.iter().map(|&v| self.locate_number(v)).collect())
            }
            (BinSet::Categorical { .. }, ColumnValues::Categorical(values)) => {
                Ok(values.iter().map(|v| self.locate_level(v.as_deref())).collect())
            }
            (BinSet::Numerical { .. }, ColumnValues::Categorical(_)) => Err(BinningError::config(
                "categorical values cannot be located in numerical bins",
            )),
        }
    }
}

/// Fit-wide inputs shared by every variable
#[derive(Debug, Clone, Copy)]
pub struct FitContext {
    pub totals: TargetTotals,
    pub encoding: EncodingStrategy,
    pub unseen_policy: UnseenPolicy,
}

/// Everything learned about one variable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableFitResult {
    pub spec: VariableSpec,
    pub bin_set: BinSet,
    /// Statistics of each regular bin, in bin order
    pub bins: Vec<BinStats>,
    pub missing_bin: BinStats,
    /// Reserved bin for unseen levels (categorical variables routing to "other")
    pub other_bin: Option<BinStats>,
    pub separation: f64,
    /// `1 / (1 + separation)`, lower is better
    pub quality_score: f64,
    pub status: FitStatus,
    pub selected: bool,
    pub n_bins: usize,
    /// Trend enforced by the solver
    pub monotonic_trend: MonotonicTrend,
    pub budget_exhausted: bool,
    pub message: Option<String>,
    pub fit_time: Duration,
}

impl VariableFitResult {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Statistics of the bin at `location`.
    ///
    /// Unseen levels with no reserved bin fall back to the missing bin.
    pub fn bin_stats(&self, location: BinLocation) -> &BinStats {
        match location {
            BinLocation::Regular(i) => self.bins.get(i).unwrap_or(&self.missing_bin),
            BinLocation::Missing => &self.missing_bin,
            BinLocation::Other => self.other_bin.as_ref().unwrap_or(&self.missing_bin),
        }
    }

    /// Bin index: regular `i`, missing `n_bins`, other `n_bins + 1`
    pub fn bin_index(&self, location: BinLocation) -> usize {
        match location {
            BinLocation::Regular(i) => i,
            BinLocation::Missing => self.n_bins,
            BinLocation::Other => self.n_bins + 1,
        }
    }

    /// Smallest and largest encoded value over regular bins
    pub fn encoded_range(&self) -> Option<(f64, f64)> {
        self.bins.iter().map(|b| b.encoded_value).fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

/// Per-bin sums gathered by locating every row
struct BinAccumulator {
    bins: Vec<SegmentStats>,
    missing: SegmentStats,
    other: SegmentStats,
}

impl BinAccumulator {
    fn collect(n_bins: usize, locations: &[BinLocation], target: &[f64]) -> Self {
        let mut acc = Self {
            bins: vec![SegmentStats::default(); n_bins],
            missing: SegmentStats::default(),
            other: SegmentStats::default(),
        };
        for (location, &y) in locations.iter().zip(target.iter()) {
            match location {
                BinLocation::Regular(i) => acc.bins[*i].push(y),
                BinLocation::Missing => acc.missing.push(y),
                BinLocation::Other => acc.other.push(y),
            }
        }
        acc
    }
}

/// Solver output carried into the final result
struct SolveSummary {
    status: FitStatus,
    monotonic_trend: MonotonicTrend,
    budget_exhausted: bool,
    message: Option<String>,
}

/// Bin statistics and scores for a fitted bin set
fn finalize(
    spec: &VariableSpec,
    mut bin_set: BinSet,
    column: &ColumnValues,
    target: &[f64],
    context: &FitContext,
    summary: SolveSummary,
) -> Result<VariableFitResult> {
    let n_bins = bin_set.n_bins();
    let locations = bin_set.locator().locate_column(column)?;
    let acc = BinAccumulator::collect(n_bins, &locations, target);

    let stats = |segment: &SegmentStats| BinStats::from_segment(segment, &context.totals, context.encoding);
    let bins: Vec<BinStats> = acc.bins.iter().map(stats).collect();
    let missing_bin = stats(&acc.missing);

    let mut other_bin = None;
    if let BinSet::Categorical { unseen, .. } = &mut bin_set {
        match context.unseen_policy {
            UnseenPolicy::Other => other_bin = Some(stats(&acc.other)),
            UnseenPolicy::Nearest => match nearest_bin(&bins, context.totals.mean()) {
                Some(i) => *unseen = UnseenRoute::Bin(i),
                None => other_bin = Some(stats(&acc.other)),
            },
        }
    }

    let separation = QualityScorer::separation(bins.iter().chain(Some(&missing_bin)).chain(other_bin.as_ref()));

    Ok(VariableFitResult {
        spec: spec.clone(),
        bin_set,
        bins,
        missing_bin,
        other_bin,
        separation,
        quality_score: quality_from_separation(separation),
        status: summary.status,
        selected: false,
        n_bins,
        monotonic_trend: summary.monotonic_trend,
        budget_exhausted: summary.budget_exhausted,
        message: summary.message,
        fit_time: Duration::ZERO,
    })
}

/// Regular bin whose aggregate is closest to `overall`, lowest index on ties
fn nearest_bin(bins: &[BinStats], overall: f64) -> Option<usize> {
    bins.iter()
        .enumerate()
        .filter(|(_, b)| b.count > 0)
        .min_by(|(ia, a), (ib, b)| {
            (a.target_aggregate - overall)
                .abs()
                .total_cmp(&(b.target_aggregate - overall).abs())
                .then(ia.cmp(ib))
        })
        .map(|(i, _)| i)
}

fn try_fit(
    spec: &VariableSpec,
    column: &ColumnValues,
    target: &[f64],
    constraints: &BinningConstraints,
    context: &FitContext,
) -> Result<VariableFitResult> {
    match spec.dtype {
        VariableDtype::Numerical => {
            let ColumnValues::Numerical(values) = column else {
                return Err(BinningError::config(format!(
                    "variable '{}' is declared numerical but holds categorical values",
                    spec.name
                )));
            };
            let solution = solve_numerical(values, target, &context.totals, constraints);
            finalize(
                spec,
                BinSet::Numerical {
                    splits: solution.splits,
                },
                column,
                target,
                context,
                SolveSummary {
                    status: solution.status,
                    monotonic_trend: solution.monotonic_trend,
                    budget_exhausted: solution.budget_exhausted,
                    message: solution.message,
                },
            )
        }
        VariableDtype::Categorical => {
            let levels = column.to_categorical();
            let solution = solve_categorical(&levels, target, &context.totals, constraints);
            let categorical = ColumnValues::Categorical(levels);
            finalize(
                spec,
                BinSet::Categorical {
                    groups: solution.groups,
                    unseen: UnseenRoute::Other,
                },
                &categorical,
                target,
                context,
                SolveSummary {
                    status: solution.status,
                    monotonic_trend: MonotonicTrend::None,
                    budget_exhausted: solution.budget_exhausted,
                    message: solution.message,
                },
            )
        }
    }
}

/// Result for a variable whose fit failed: one bin holding every
/// non-missing row
fn failed_result(
    spec: &VariableSpec,
    column: &ColumnValues,
    target: &[f64],
    context: &FitContext,
    message: String,
) -> VariableFitResult {
    let (bin_set, missing_rows): (BinSet, Vec<bool>) = match (spec.dtype, column) {
        (VariableDtype::Numerical, ColumnValues::Numerical(values)) => (
            BinSet::Numerical { splits: Vec::new() },
            values.iter().map(|&v| is_missing_number(v)).collect(),
        ),
        _ => {
            let levels = column.to_categorical();
            let mut observed: Vec<String> = levels.iter().flatten().cloned().collect();
            observed.sort();
            observed.dedup();
            let groups = if observed.is_empty() { Vec::new() } else { vec![observed] };
            (
                BinSet::Categorical {
                    groups,
                    unseen: UnseenRoute::Other,
                },
                levels.iter().map(|v| v.is_none()).collect(),
            )
        }
    };

    let mut regular = SegmentStats::default();
    let mut missing = SegmentStats::default();
    for (&is_missing, &y) in missing_rows.iter().zip(target.iter()) {
        if is_missing {
            missing.push(y);
        } else {
            regular.push(y);
        }
    }

    let n_bins = bin_set.n_bins();
    let stats = |segment: &SegmentStats| BinStats::from_segment(segment, &context.totals, context.encoding);
    let bins: Vec<BinStats> = if n_bins == 0 { Vec::new() } else { vec![stats(&regular)] };
    let missing_bin = stats(&missing);
    let other_bin = match bin_set {
        BinSet::Categorical { .. } => Some(stats(&SegmentStats::default())),
        BinSet::Numerical { .. } => None,
    };
    let separation = QualityScorer::separation(bins.iter().chain(Some(&missing_bin)));

    VariableFitResult {
        spec: spec.clone(),
        bin_set,
        bins,
        missing_bin,
        other_bin,
        separation,
        quality_score: quality_from_separation(separation),
        status: FitStatus::Error,
        selected: false,
        n_bins,
        monotonic_trend: MonotonicTrend::None,
        budget_exhausted: false,
        message: Some(message),
        fit_time: Duration::ZERO,
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("binning panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("binning panicked: {}", s)
    } else {
        "binning panicked".to_string()
    }
}

/// Fit the bins of a single variable.
///
/// Never fails: solver errors and panics produce an `ERROR` result.
pub fn fit_variable(
    spec: &VariableSpec,
    column: &ColumnValues,
    target: &[f64],
    constraints: &BinningConstraints,
    context: &FitContext,
) -> VariableFitResult {
    let start = Instant::now();

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        try_fit(spec, column, target, constraints, context)
    }));

    let mut result = match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => failed_result(spec, column, target, context, e.to_string()),
        Err(payload) => failed_result(spec, column, target, context, panic_message(payload)),
    };
    result.fit_time = start.elapsed();

    if result.status == FitStatus::Error {
        warn!(
            variable = %spec.name,
            reason = result.message.as_deref().unwrap_or("unknown"),
            "variable could not be binned"
        );
    }

    debug!(
        variable = %spec.name,
        status = %result.status,
        n_bins = result.n_bins,
        quality_score = result.quality_score,
        elapsed_ms = result.fit_time.as_millis() as u64,
        "variable fitted"
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stats::TargetKind;

    fn context(target: &[f64], kind: TargetKind) -> FitContext {
        FitContext {
            totals: TargetTotals::new(kind, target),
            encoding: EncodingStrategy::Auto,
            unseen_policy: UnseenPolicy::Other,
        }
    }

    #[test]
    fn test_numerical_locate_half_open() {
        let bins = BinSet::Numerical {
            splits: vec![2.5, 51.5],
        };
        let locator = bins.locator();

        assert_eq!(locator.locate_number(Some(-1e9)), BinLocation::Regular(0));
        assert_eq!(locator.locate_number(Some(2.5)), BinLocation::Regular(1));
        assert_eq!(locator.locate_number(Some(51.4)), BinLocation::Regular(1));
        assert_eq!(locator.locate_number(Some(f64::INFINITY)), BinLocation::Regular(2));
        assert_eq!(locator.locate_number(None), BinLocation::Missing);
        assert_eq!(locator.locate_number(Some(f64::NAN)), BinLocation::Missing);
    }

    #[test]
    fn test_categorical_locate_unseen() {
        let bins = BinSet::Categorical {
            groups: vec![vec!["a".to_string()], vec!["b".to_string(), "c".to_string()]],
            unseen: UnseenRoute::Other,
        };
        let locator = bins.locator();

        assert_eq!(locator.locate_level(Some("c")), BinLocation::Regular(1));
        assert_eq!(locator.locate_level(Some("zzz")), BinLocation::Other);
        assert_eq!(locator.locate_level(None), BinLocation::Missing);
    }

    #[test]
    fn test_labels() {
        let bins = BinSet::Numerical { splits: vec![2.5] };
        assert_eq!(bins.labels(), vec!["[-inf, 2.5)", "[2.5, inf)"]);
    }

    #[test]
    fn test_fit_counts_are_conserved() {
        let column = ColumnValues::Numerical(vec![
            Some(1.0),
            Some(2.0),
            None,
            Some(3.0),
            Some(f64::NAN),
            Some(4.0),
        ]);
        let target = [0.0, 0.0, 1.0, 1.0, 0.0, 1.0];
        let ctx = context(&target, TargetKind::Binary);

        let result = fit_variable(
            &VariableSpec::numerical("x"),
            &column,
            &target,
            &BinningConstraints::default(),
            &ctx,
        );

        let regular: usize = result.bins.iter().map(|b| b.count).sum();
        assert_eq!(regular, 4);
        assert_eq!(result.missing_bin.count, 2);
        assert_eq!(result.n_bins, result.bins.len());
        assert!(result.other_bin.is_none());
    }

    #[test]
    fn test_reported_quality_matches_solver() {
        let values: Vec<Option<f64>> = (0..50).map(|i| Some(i as f64)).collect();
        let target: Vec<f64> = (0..50).map(|i| if i % 7 < 3 || i > 35 { 1.0 } else { 0.0 }).collect();
        let ctx = context(&target, TargetKind::Binary);
        let constraints = BinningConstraints::default();

        let solution = solve_numerical(&values, &target, &ctx.totals, &constraints);
        let result = fit_variable(
            &VariableSpec::numerical("x"),
            &ColumnValues::Numerical(values),
            &target,
            &constraints,
            &ctx,
        );

        assert!((solution.quality_score - result.quality_score).abs() < 1e-9);
    }

    #[test]
    fn test_numeric_column_declared_categorical() {
        let column = ColumnValues::Numerical(vec![Some(1.0), Some(2.0), Some(1.0), Some(2.0)]);
        let target = [0.0, 1.0, 0.0, 1.0];
        let ctx = context(&target, TargetKind::Binary);

        let result = fit_variable(
            &VariableSpec::categorical("code"),
            &column,
            &target,
            &BinningConstraints::default(),
            &ctx,
        );

        assert_eq!(result.status, FitStatus::Optimal);
        let locator = result.bin_set.locator();
        assert_eq!(locator.locate_number(Some(1.0)), locator.locate_level(Some("1")));
        assert!(result.other_bin.is_some());
    }

    #[test]
    fn test_type_mismatch_becomes_error_status() {
        let column = ColumnValues::Categorical(vec![Some("a".to_string()), None]);
        let target = [0.0, 1.0];
        let ctx = context(&target, TargetKind::Binary);

        let result = fit_variable(
            &VariableSpec::numerical("x"),
            &column,
            &target,
            &BinningConstraints::default(),
            &ctx,
        );

        assert_eq!(result.status, FitStatus::Error);
        assert_eq!(result.n_bins, 1);
        assert_eq!(result.bins[0].count, 1);
        assert_eq!(result.missing_bin.count, 1);
        assert!(result.message.is_some());
    }

    #[test]
    fn test_nearest_unseen_policy() {
        let column: ColumnValues = vec!["a", "a", "b", "b", "c", "c"].into();
        let target = [0.0, 0.0, 1.0, 1.0, 0.0, 1.0];
        let ctx = FitContext {
            unseen_policy: UnseenPolicy::Nearest,
            ..context(&target, TargetKind::Binary)
        };
        let constraints = BinningConstraints {
            min_bin_size: 0.0,
            ..Default::default()
        };

        let result = fit_variable(&VariableSpec::categorical("g"), &column, &target, &constraints, &ctx);

        let BinSet::Categorical { unseen, groups } = &result.bin_set else {
            panic!("expected categorical bins");
        };
        let UnseenRoute::Bin(i) = *unseen else {
            panic!("expected a regular bin for unseen levels");
        };
        assert!(groups[i].contains(&"c".to_string()));
        assert!(result.other_bin.is_none());
    }
}
