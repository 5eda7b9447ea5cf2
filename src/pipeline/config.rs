//! Binning process configuration
//!
//! Everything here is serde-(de)serializable so a configuration can be read
//! from a JSON file and is persisted alongside a fitted process.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::encoding::EncodingStrategy;
use super::error::{BinningError, Result};
use super::solver::MonotonicTrend;
use super::target::TargetType;

/// Per-variable search budget
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverBudget {
    /// Maximum wall-clock time for one variable's search
    pub time_limit: Option<Duration>,
    /// Maximum number of DP transitions evaluated for one variable
    pub max_iterations: Option<u64>,
}

/// Constraints applied to a single variable's partition search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinningConstraints {
    /// Maximum number of regular bins
    pub max_bins: usize,
    /// Minimum number of regular bins
    pub min_bins: usize,
    /// Minimum fraction of non-missing rows per bin
    pub min_bin_size: f64,
    /// Trend of the target aggregate across numerical bins
    pub monotonic_trend: MonotonicTrend,
    /// Maximum number of quantile prebins before optimization
    pub max_n_prebins: usize,
    /// Categories with fewer rows are pre-merged into one rare group
    pub min_category_samples: Option<usize>,
    pub budget: SolverBudget,
}

impl Default for BinningConstraints {
    fn default() -> Self {
        Self {
            max_bins: 10,
            min_bins: 1,
            min_bin_size: 0.05,
            monotonic_trend: MonotonicTrend::None,
            max_n_prebins: 20,
            min_category_samples: None,
            budget: SolverBudget::default(),
        }
    }
}

impl BinningConstraints {
    pub fn validate(&self) -> Result<()> {
        if self.max_bins == 0 {
            return Err(BinningError::config("max_bins must be at least 1"));
        }
        if self.min_bins == 0 {
            return Err(BinningError::config("min_bins must be at least 1"));
        }
        if self.min_bins > self.max_bins {
            return Err(BinningError::config(format!(
                "min_bins ({}) exceeds max_bins ({})",
                self.min_bins, self.max_bins
            )));
        }
        if !(0.0..=1.0).contains(&self.min_bin_size) {
            return Err(BinningError::config(format!(
                "min_bin_size must be between 0.0 and 1.0, got {}",
                self.min_bin_size
            )));
        }
        if self.max_n_prebins < self.max_bins {
            return Err(BinningError::config(format!(
                "max_n_prebins ({}) must be at least max_bins ({})",
                self.max_n_prebins, self.max_bins
            )));
        }
        if let Some(limit) = self.budget.time_limit {
            if limit.is_zero() {
                return Err(BinningError::config("time_limit must be positive"));
            }
        }
        if self.budget.max_iterations == Some(0) {
            return Err(BinningError::config("max_iterations must be positive"));
        }
        Ok(())
    }

    /// Minimum rows per bin for a variable with `n` non-missing rows
    pub fn min_count(&self, n: usize) -> usize {
        let raw = (self.min_bin_size * n as f64 - 1e-9).ceil();
        (raw.max(1.0) as usize).min(n.max(1))
    }
}

/// Where categorical levels unseen at fit time are routed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnseenPolicy {
    /// A reserved, isolated "other" bin with neutral encoding
    #[default]
    Other,
    /// The regular bin whose aggregate is closest to the overall aggregate
    Nearest,
}

impl std::fmt::Display for UnseenPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnseenPolicy::Other => write!(f, "other"),
            UnseenPolicy::Nearest => write!(f, "nearest"),
        }
    }
}

impl std::str::FromStr for UnseenPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "other" => Ok(UnseenPolicy::Other),
            "nearest" => Ok(UnseenPolicy::Nearest),
            _ => Err(format!("Unknown unseen policy: '{}'. Use 'other' or 'nearest'.", s)),
        }
    }
}

/// Post-fit selection rules applied on top of status and exclusions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionCriteria {
    /// Variables scoring above this quality score are not selected
    pub max_quality_score: Option<f64>,
    /// Keep only the best `top` candidates by quality score
    pub top: Option<usize>,
}

/// Complete configuration of a binning process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinningConfig {
    /// Constraints used for every variable without an override
    pub constraints: BinningConstraints,
    /// Per-variable constraint overrides
    pub overrides: BTreeMap<String, BinningConstraints>,
    /// Variables fitted but never selected
    pub excluded: Vec<String>,
    pub selection: Option<SelectionCriteria>,
    pub target_type: TargetType,
    pub encoding: EncodingStrategy,
    pub unseen_policy: UnseenPolicy,
    /// Size of a dedicated worker pool; the global rayon pool when unset
    pub n_jobs: Option<usize>,
    /// Show a progress bar while fitting
    pub verbose: bool,
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self {
            constraints: BinningConstraints::default(),
            overrides: BTreeMap::new(),
            excluded: Vec::new(),
            selection: None,
            target_type: TargetType::Auto,
            encoding: EncodingStrategy::Auto,
            unseen_policy: UnseenPolicy::Other,
            n_jobs: None,
            verbose: false,
        }
    }
}

impl BinningConfig {
    /// Constraints in effect for a variable
    pub fn constraints_for(&self, name: &str) -> &BinningConstraints {
        self.overrides.get(name).unwrap_or(&self.constraints)
    }

    /// Validate values that do not depend on the declared variables
    pub fn validate(&self) -> Result<()> {
        self.constraints.validate()?;
        for (name, constraints) in &self.overrides {
            constraints
                .validate()
                .map_err(|e| BinningError::config(format!("override for '{}': {}", name, e)))?;
        }
        if let Some(selection) = &self.selection {
            if let Some(max) = selection.max_quality_score {
                if !(max.is_finite() && max >= 0.0) {
                    return Err(BinningError::config(format!(
                        "max_quality_score must be a non-negative number, got {}",
                        max
                    )));
                }
            }
        }
        if self.n_jobs == Some(0) {
            return Err(BinningError::config("n_jobs must be at least 1"));
        }
        Ok(())
    }

    /// Read a configuration from a JSON file
    pub fn from_json_file(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
