//! Encoded value strategies
//!
//! The encoded value of a bin is the number substituted for every raw value
//! that falls into it. Each strategy is a pure function of the bin's target
//! sums and the totals they add up to.

use serde::{Deserialize, Serialize};

use super::quality::{calculate_woe_iv, has_both_classes};
use super::stats::{SegmentStats, TargetKind, TargetTotals};

/// How a bin's target statistics are turned into its encoded value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingStrategy {
    /// `Woe` for binary targets, `MeanCentered` for continuous targets
    #[default]
    Auto,
    /// Weight of Evidence, ln(%events / %non_events) with Laplace smoothing
    Woe,
    /// Bin aggregate minus the overall aggregate
    MeanCentered,
    /// The bin aggregate itself (mean or event rate)
    TargetAggregate,
}

impl EncodingStrategy {
    /// Resolve `Auto` for a given target kind
    pub fn resolve(self, kind: TargetKind) -> EncodingStrategy {
        match (self, kind) {
            (EncodingStrategy::Auto, TargetKind::Binary) => EncodingStrategy::Woe,
            (EncodingStrategy::Auto, TargetKind::Continuous) => EncodingStrategy::MeanCentered,
            (other, _) => other,
        }
    }

    /// Encoded value for a bin.
    ///
    /// Empty bins (reserved missing/other bins with no rows at fit time) take
    /// the neutral value of the strategy.
    pub fn encode(self, segment: &SegmentStats, totals: &TargetTotals) -> f64 {
        match self.resolve(totals.kind) {
            EncodingStrategy::Woe => {
                if segment.count == 0 || !has_both_classes(totals) {
                    return 0.0;
                }
                let events = segment.sum;
                let non_events = segment.count as f64 - segment.sum;
                let (woe, _) = calculate_woe_iv(events, non_events, totals.events(), totals.non_events());
                woe
            }
            EncodingStrategy::MeanCentered => {
                if segment.count == 0 {
                    0.0
                } else {
                    segment.mean() - totals.mean()
                }
            }
            EncodingStrategy::TargetAggregate | EncodingStrategy::Auto => {
                if segment.count == 0 {
                    totals.mean()
                } else {
                    segment.mean()
                }
            }
        }
    }
}

impl std::fmt::Display for EncodingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodingStrategy::Auto => write!(f, "auto"),
            EncodingStrategy::Woe => write!(f, "woe"),
            EncodingStrategy::MeanCentered => write!(f, "mean_centered"),
            EncodingStrategy::TargetAggregate => write!(f, "target_aggregate"),
        }
    }
}

impl std::str::FromStr for EncodingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "auto" => Ok(EncodingStrategy::Auto),
            "woe" => Ok(EncodingStrategy::Woe),
            "mean_centered" | "centered" => Ok(EncodingStrategy::MeanCentered),
            "target_aggregate" | "mean" | "event_rate" => Ok(EncodingStrategy::TargetAggregate),
            _ => Err(format!(
                "Unknown encoding: '{}'. Use 'auto', 'woe', 'mean_centered' or 'target_aggregate'.",
                s
            )),
        }
    }
}
