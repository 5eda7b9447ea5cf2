//! Dynamic-programming search for the best ordered partition
//!
//! For every exact bin count `K` the table `dp[k][i][j]` holds the best
//! partition of groups `0..=j` into `k` bins whose last bin is `i..=j`.
//! Keeping the last bin in the state lets adjacent-bin trend constraints be
//! checked on each transition. Tables are flat vectors, filled iteratively.

use std::time::{Duration, Instant};

use crate::pipeline::config::SolverBudget;

use super::monotonicity::MonotonicTrend;
use super::precompute::SegmentMatrix;

/// Relative tolerance under which two separations are considered equal
pub const SEPARATION_TOLERANCE: f64 = 1e-12;

const UNSET: usize = usize::MAX;

/// Time and iteration budget shared by every search of one variable
#[derive(Debug, Clone)]
pub struct Budget {
    start: Instant,
    time_limit: Option<Duration>,
    max_iterations: Option<u64>,
    iterations: u64,
    exhausted: bool,
}

impl Budget {
    pub fn new(budget: &SolverBudget) -> Self {
        Self {
            start: Instant::now(),
            time_limit: budget.time_limit,
            max_iterations: budget.max_iterations,
            iterations: 0,
            exhausted: false,
        }
    }

    #[inline]
    fn charge(&mut self, transitions: u64) {
        self.iterations = self.iterations.saturating_add(transitions);
    }

    /// Re-evaluate the budget; returns true once it is exhausted
    fn check(&mut self) -> bool {
        if self.exhausted {
            return true;
        }
        if let Some(max) = self.max_iterations {
            if self.iterations >= max {
                self.exhausted = true;
            }
        }
        if let Some(limit) = self.time_limit {
            if self.start.elapsed() >= limit {
                self.exhausted = true;
            }
        }
        self.exhausted
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }
}

/// Bin count, size and trend requirements of one search
#[derive(Debug, Clone, Copy)]
pub struct SearchSettings {
    pub min_bins: usize,
    pub max_bins: usize,
    /// Minimum rows per bin
    pub min_count: usize,
    /// `Ascending`, `Descending` or `None`; `Auto` is resolved by the caller
    pub trend: MonotonicTrend,
}

/// An ordered partition of the groups
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Inclusive `(start, end)` group indices of each bin
    pub boundaries: Vec<(usize, usize)>,
    /// Separation of the regular bins
    pub separation: f64,
    /// Distance of the bin edges from ideal equal-frequency positions
    pub deviation: f64,
}

impl Partition {
    pub fn n_bins(&self) -> usize {
        self.boundaries.len()
    }

    /// Target aggregate of each bin
    pub fn aggregates(&self, matrix: &SegmentMatrix) -> Vec<f64> {
        self.boundaries
            .iter()
            .map(|&(start, end)| matrix.get(start, end).aggregate)
            .collect()
    }
}

/// Result of a search over all admissible bin counts
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Best feasible partition over the bin counts that were fully searched
    pub best: Option<Partition>,
    /// Whether the budget ran out before every bin count was searched
    pub exhausted: bool,
}

#[inline]
fn improves(sep: f64, dev: f64, best_sep: f64, best_dev: f64) -> bool {
    if best_sep == f64::NEG_INFINITY {
        return sep > f64::NEG_INFINITY;
    }
    let tol = SEPARATION_TOLERANCE * sep.abs().max(best_sep.abs()).max(1.0);
    if sep > best_sep + tol {
        true
    } else if sep < best_sep - tol {
        false
    } else {
        dev < best_dev - SEPARATION_TOLERANCE
    }
}

/// Search every bin count in `[min_bins, min(max_bins, n)]`.
///
/// On equal separation the smaller bin count wins.
pub fn search(matrix: &SegmentMatrix, settings: &SearchSettings, budget: &mut Budget) -> SearchOutcome {
    let n = matrix.len();
    let upper = settings.max_bins.min(n);
    let mut best: Option<Partition> = None;

    if n == 0 || settings.min_bins > upper {
        return SearchOutcome {
            best,
            exhausted: false,
        };
    }

    for k in settings.min_bins..=upper {
        let Some(candidate) = solve_exact(matrix, k, settings, budget) else {
            if budget.is_exhausted() {
                return SearchOutcome {
                    best,
                    exhausted: true,
                };
            }
            continue;
        };

        let replace = match &best {
            None => true,
            Some(current) => {
                let tol = SEPARATION_TOLERANCE
                    * candidate.separation.abs().max(current.separation.abs()).max(1.0);
                candidate.separation > current.separation + tol
            }
        };
        if replace {
            best = Some(candidate);
        }
    }

    SearchOutcome {
        best,
        exhausted: budget.is_exhausted(),
    }
}

/// Best partition into exactly `k` bins, or None when infeasible or when the
/// budget ran out before the table was complete
fn solve_exact(
    matrix: &SegmentMatrix,
    k_bins: usize,
    settings: &SearchSettings,
    budget: &mut Budget,
) -> Option<Partition> {
    let n = matrix.len();
    let layer = n * n;
    let size = k_bins * layer;
    let idx = |k: usize, i: usize, j: usize| (k - 1) * layer + i * n + j;

    let mut sep = vec![f64::NEG_INFINITY; size];
    let mut dev = vec![f64::INFINITY; size];
    let mut back = vec![UNSET; size];

    // Best predecessor ending at each group, used when no trend applies
    let mut layer_best: Vec<usize> = vec![UNSET; n];
    let unconstrained = matches!(settings.trend, MonotonicTrend::None | MonotonicTrend::Auto);

    let edge_deviation = |k: usize, end: usize| -> f64 {
        (matrix.cumulative_fraction(end) - k as f64 / k_bins as f64).abs()
    };

    for j in 0..n {
        if budget.check() {
            return None;
        }
        let segment = matrix.get(0, j);
        budget.charge(1);
        if segment.stats.count >= settings.min_count {
            let at = idx(1, 0, j);
            sep[at] = segment.separation;
            dev[at] = edge_deviation(1, j);
        }
    }

    for k in 2..=k_bins {
        if unconstrained {
            for (end, slot) in layer_best.iter_mut().enumerate() {
                *slot = UNSET;
                let mut best_sep = f64::NEG_INFINITY;
                let mut best_dev = f64::INFINITY;
                for start in 0..=end {
                    let at = idx(k - 1, start, end);
                    if improves(sep[at], dev[at], best_sep, best_dev) {
                        best_sep = sep[at];
                        best_dev = dev[at];
                        *slot = start;
                    }
                }
            }
        }

        // The k-th bin starts no earlier than group k-1
        for j in (k - 1)..n {
            if budget.check() {
                return None;
            }

            for i in (k - 1)..=j {
                let segment = matrix.get(i, j);
                if segment.stats.count < settings.min_count {
                    continue;
                }
                let step_dev = edge_deviation(k, j);
                let at = idx(k, i, j);

                if unconstrained {
                    budget.charge(1);
                    let prev_start = layer_best[i - 1];
                    if prev_start == UNSET {
                        continue;
                    }
                    let prev = idx(k - 1, prev_start, i - 1);
                    if sep[prev] == f64::NEG_INFINITY {
                        continue;
                    }
                    sep[at] = sep[prev] + segment.separation;
                    dev[at] = dev[prev] + step_dev;
                    back[at] = prev_start;
                    continue;
                }

                budget.charge(i as u64);
                for prev_start in 0..i {
                    let prev = idx(k - 1, prev_start, i - 1);
                    if sep[prev] == f64::NEG_INFINITY {
                        continue;
                    }
                    let prev_aggregate = matrix.get(prev_start, i - 1).aggregate;
                    if !settings.trend.allows(prev_aggregate, segment.aggregate) {
                        continue;
                    }
                    let cand_sep = sep[prev] + segment.separation;
                    let cand_dev = dev[prev] + step_dev;
                    if improves(cand_sep, cand_dev, sep[at], dev[at]) {
                        sep[at] = cand_sep;
                        dev[at] = cand_dev;
                        back[at] = prev_start;
                    }
                }
            }
        }
    }

    // Best last bin ending at the final group
    let mut last_start = UNSET;
    let mut best_sep = f64::NEG_INFINITY;
    let mut best_dev = f64::INFINITY;
    for i in 0..n {
        let at = idx(k_bins, i, n - 1);
        if improves(sep[at], dev[at], best_sep, best_dev) {
            best_sep = sep[at];
            best_dev = dev[at];
            last_start = i;
        }
    }
    if last_start == UNSET {
        return None;
    }

    let mut boundaries = Vec::with_capacity(k_bins);
    let mut start = last_start;
    let mut end = n - 1;
    for k in (1..=k_bins).rev() {
        boundaries.push((start, end));
        if k == 1 {
            break;
        }
        let prev_start = back[idx(k, start, end)];
        end = start - 1;
        start = prev_start;
    }
    boundaries.reverse();

    Some(Partition {
        boundaries,
        separation: best_sep,
        deviation: best_dev,
    })
}
