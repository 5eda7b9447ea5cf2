//! Quality scoring for fitted partitions
//!
//! The separation of a partition is the sum of additive per-bin terms:
//! - binary target: Information Value, using Laplace-smoothed WoE
//! - continuous target: the bin's share of the between-bin sum of squares
//!   (correlation ratio), `count * (mean_b - mean)^2 / SST`
//!
//! The reported `quality_score = 1 / (1 + separation)` lies in (0, 1] and
//! lower is better; a non-informative partition scores exactly 1.0. The
//! solvers maximize the same separation, so the score they report is the one
//! recomputed from the final bin statistics.

use super::stats::{BinStats, SegmentStats, TargetKind, TargetTotals};

/// Smoothing constant to avoid log(0) in WoE calculation (Laplace smoothing)
pub const SMOOTHING: f64 = 0.5;

/// Quality score of a partition with no separation at all
pub const WORST_QUALITY: f64 = 1.0;

/// Calculate WoE and IV contribution for a bin
///
/// Uses the ln(%events/%non_events) convention where:
/// - WoE > 0 indicates a higher event rate than the population
/// - WoE < 0 indicates a lower event rate than the population
pub fn calculate_woe_iv(
    events: f64,
    non_events: f64,
    total_events: f64,
    total_non_events: f64,
) -> (f64, f64) {
    // Apply Laplace smoothing to avoid log(0)
    let dist_events = (events + SMOOTHING) / (total_events + SMOOTHING);
    let dist_non_events = (non_events + SMOOTHING) / (total_non_events + SMOOTHING);

    let woe = (dist_events / dist_non_events).ln();
    let iv_contrib = (dist_events - dist_non_events) * woe;

    (woe, iv_contrib)
}

/// Whether a binary target has both classes, i.e. whether WoE is defined
#[inline]
pub fn has_both_classes(totals: &TargetTotals) -> bool {
    totals.events() > 0.0 && totals.non_events() > 0.0
}

/// Contribution of one bin to the separation of its partition
pub fn separation_term(segment: &SegmentStats, totals: &TargetTotals) -> f64 {
    if segment.count == 0 {
        return 0.0;
    }

    match totals.kind {
        TargetKind::Binary => {
            if !has_both_classes(totals) {
                return 0.0;
            }
            let events = segment.sum;
            let non_events = segment.count as f64 - segment.sum;
            let (_, iv) = calculate_woe_iv(events, non_events, totals.events(), totals.non_events());
            iv.max(0.0)
        }
        TargetKind::Continuous => {
            let sst = totals.total_ss();
            if sst <= f64::EPSILON {
                return 0.0;
            }
            let diff = segment.mean() - totals.mean();
            segment.count as f64 * diff * diff / sst
        }
    }
}

/// Map a separation to a quality score (lower is better)
#[inline]
pub fn quality_from_separation(separation: f64) -> f64 {
    1.0 / (1.0 + separation.max(0.0))
}

/// Scores finalized bins
pub struct QualityScorer;

impl QualityScorer {
    /// Total separation of a set of bins
    pub fn separation<'a>(bins: impl IntoIterator<Item = &'a BinStats>) -> f64 {
        bins.into_iter().map(|b| b.separation).sum()
    }

    /// Quality score of a set of bins, in (0, 1], lower is better
    pub fn score<'a>(bins: impl IntoIterator<Item = &'a BinStats>) -> f64 {
        quality_from_separation(Self::separation(bins))
    }
}
