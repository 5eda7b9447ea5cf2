//! Monotonic trend constraints for optimal binning
//!
//! Defines the target-aggregate patterns that can be enforced across the
//! ordered bins of a numerical variable.

use serde::{Deserialize, Serialize};

/// Monotonic trend of the per-bin target aggregate (mean or event rate)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonotonicTrend {
    /// No constraint - aggregates can vary freely across bins
    #[default]
    None,
    /// Aggregate must be non-decreasing with the variable value
    Ascending,
    /// Aggregate must be non-increasing with the variable value
    Descending,
    /// Infer the direction from the unconstrained optimum, then enforce it
    Auto,
}

impl MonotonicTrend {
    /// Whether two adjacent bins with aggregates `left` then `right` satisfy the trend.
    ///
    /// `Auto` is resolved to a direction before the search and behaves like `None` here.
    #[inline]
    pub fn allows(self, left: f64, right: f64) -> bool {
        match self {
            MonotonicTrend::Ascending => left <= right,
            MonotonicTrend::Descending => left >= right,
            MonotonicTrend::None | MonotonicTrend::Auto => true,
        }
    }

    /// Dominant direction of a sequence of bin aggregates.
    ///
    /// Ascending when the total upward movement is at least the total downward
    /// movement, descending otherwise.
    pub fn dominant(aggregates: &[f64]) -> MonotonicTrend {
        let (up, down) = aggregates
            .windows(2)
            .map(|w| w[1] - w[0])
            .fold((0.0f64, 0.0f64), |(up, down), d| {
                if d >= 0.0 {
                    (up + d, down)
                } else {
                    (up, down - d)
                }
            });

        if up >= down {
            MonotonicTrend::Ascending
        } else {
            MonotonicTrend::Descending
        }
    }

    /// Whether the aggregates already follow this trend
    pub fn is_satisfied_by(self, aggregates: &[f64]) -> bool {
        aggregates.windows(2).all(|w| self.allows(w[0], w[1]))
    }
}

impl std::fmt::Display for MonotonicTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonotonicTrend::None => write!(f, "none"),
            MonotonicTrend::Ascending => write!(f, "ascending"),
            MonotonicTrend::Descending => write!(f, "descending"),
            MonotonicTrend::Auto => write!(f, "auto"),
        }
    }
}

impl std::str::FromStr for MonotonicTrend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(MonotonicTrend::None),
            "ascending" | "asc" => Ok(MonotonicTrend::Ascending),
            "descending" | "desc" => Ok(MonotonicTrend::Descending),
            "auto" => Ok(MonotonicTrend::Auto),
            _ => Err(format!(
                "Unknown monotonic trend: '{}'. Use 'none', 'ascending', 'descending' or 'auto'.",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_trend_from_str() {
        assert_eq!(
            "none".parse::<MonotonicTrend>().unwrap(),
            MonotonicTrend::None
        );
        assert_eq!(
            "asc".parse::<MonotonicTrend>().unwrap(),
            MonotonicTrend::Ascending
        );
        assert_eq!(
            "Descending".parse::<MonotonicTrend>().unwrap(),
            MonotonicTrend::Descending
        );
        assert_eq!(
            "auto".parse::<MonotonicTrend>().unwrap(),
            MonotonicTrend::Auto
        );
        assert!("peak".parse::<MonotonicTrend>().is_err());
    }

    #[test]
    fn test_monotonic_trend_display() {
        assert_eq!(MonotonicTrend::None.to_string(), "none");
        assert_eq!(MonotonicTrend::Ascending.to_string(), "ascending");
        assert_eq!(MonotonicTrend::Descending.to_string(), "descending");
        assert_eq!(MonotonicTrend::Auto.to_string(), "auto");
    }

    #[test]
    fn test_allows_equal_neighbours() {
        assert!(MonotonicTrend::Ascending.allows(0.5, 0.5));
        assert!(MonotonicTrend::Descending.allows(0.5, 0.5));
        assert!(!MonotonicTrend::Ascending.allows(0.6, 0.5));
        assert!(!MonotonicTrend::Descending.allows(0.4, 0.5));
    }

    #[test]
    fn test_dominant_direction() {
        // +0.67 up, -1.0 down: the drop dominates
        assert_eq!(
            MonotonicTrend::dominant(&[0.33, 1.0, 0.0]),
            MonotonicTrend::Descending
        );
        assert_eq!(
            MonotonicTrend::dominant(&[0.1, 0.05, 0.9]),
            MonotonicTrend::Ascending
        );
        assert_eq!(MonotonicTrend::dominant(&[0.4]), MonotonicTrend::Ascending);
    }
}
