//! The binning process: fits every declared variable against a shared target
//!
//! `BinningProcess` validates its configuration up front, fits variables in
//! parallel on rayon, decides which variables are selected, and owns the
//! fitted results. Once fitted it is read-only until the next `fit`.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::binner::{fit_variable, FitContext, VariableFitResult};
use super::config::{BinningConfig, SelectionCriteria};
use super::dataset::{ColumnValues, Dataset, VariableDtype, VariableSpec};
use super::encoding::EncodingStrategy;
use super::error::{BinningError, Result};
use super::solver::FitStatus;
use super::stats::{TargetKind, TargetTotals};
use super::target::resolve_target_kind;
use crate::utils::progress::{finish_with_success, finish_with_warning, fit_progress};

/// Version of the persisted JSON layout
const FORMAT_VERSION: u32 = 1;

/// Results of a completed fit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedProcess {
    /// One result per declared variable, in declaration order
    pub results: Vec<VariableFitResult>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    /// Number of rows the process was fitted on
    pub n_records: usize,
    pub target_kind: TargetKind,
    pub totals: TargetTotals,
    /// Wall time of the whole fit
    pub fit_time: Duration,
    /// RFC 3339 timestamp of the end of the fit
    pub fitted_at: String,
}

impl FittedProcess {
    fn build_index(results: &[VariableFitResult]) -> HashMap<String, usize> {
        results
            .iter()
            .enumerate()
            .map(|(i, r)| (r.spec.name.clone(), i))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&VariableFitResult> {
        self.index.get(name).map(|&i| &self.results[i])
    }

    pub fn n_selected(&self) -> usize {
        self.results.iter().filter(|r| r.selected).count()
    }
}

/// Lifecycle of a binning process
#[derive(Debug, Clone, Default)]
pub enum ProcessState {
    #[default]
    Unfitted,
    Fitting,
    Fitted(FittedProcess),
}

/// Jointly bins many variables against one target
#[derive(Debug, Clone)]
pub struct BinningProcess {
    variables: Vec<VariableSpec>,
    config: BinningConfig,
    state: ProcessState,
}

#[derive(Serialize, Deserialize)]
struct SavedProcess {
    format_version: u32,
    crate_version: String,
    variables: Vec<VariableSpec>,
    config: BinningConfig,
    fitted: FittedProcess,
}

/// Mark selected variables: not excluded, not failed, and within the
/// optional quality threshold and top-N limit
fn apply_selection(
    results: &mut [VariableFitResult],
    excluded: &HashSet<&str>,
    criteria: Option<&SelectionCriteria>,
) {
    let max_quality = criteria.and_then(|c| c.max_quality_score);
    let mut candidates: Vec<usize> = results
        .iter()
        .enumerate()
        .filter(|(_, r)| {
            !excluded.contains(r.spec.name.as_str())
                && r.status != FitStatus::Error
                && max_quality.map_or(true, |max| r.quality_score <= max)
        })
        .map(|(i, _)| i)
        .collect();

    if let Some(top) = criteria.and_then(|c| c.top) {
        candidates.sort_by(|&a, &b| {
            results[a]
                .quality_score
                .total_cmp(&results[b].quality_score)
                .then(a.cmp(&b))
        });
        candidates.truncate(top);
    }

    for result in results.iter_mut() {
        result.selected = false;
    }
    for i in candidates {
        results[i].selected = true;
    }
}

impl BinningProcess {
    /// Create an unfitted process.
    ///
    /// Fails on duplicate variable names, invalid constraint values, and
    /// overrides or exclusions naming undeclared variables.
    pub fn new(variables: Vec<VariableSpec>, config: BinningConfig) -> Result<Self> {
        let mut names: HashSet<&str> = HashSet::with_capacity(variables.len());
        for spec in &variables {
            if !names.insert(spec.name.as_str()) {
                return Err(BinningError::config(format!(
                    "duplicate variable name '{}'",
                    spec.name
                )));
            }
        }

        config.validate()?;

        for name in config.overrides.keys() {
            if !names.contains(name.as_str()) {
                return Err(BinningError::config(format!(
                    "constraint override for unknown variable '{}'",
                    name
                )));
            }
        }
        for name in &config.excluded {
            if !names.contains(name.as_str()) {
                return Err(BinningError::config(format!(
                    "excluded variable '{}' is not declared",
                    name
                )));
            }
        }

        Ok(Self {
            variables,
            config,
            state: ProcessState::Unfitted,
        })
    }

    /// Process over every column of a dataset, typed by the stored values
    pub fn for_dataset(dataset: &Dataset, config: BinningConfig) -> Result<Self> {
        Self::new(dataset.infer_specs(), config)
    }

    pub fn variables(&self) -> &[VariableSpec] {
        &self.variables
    }

    pub fn config(&self) -> &BinningConfig {
        &self.config
    }

    pub fn state(&self) -> &ProcessState {
        &self.state
    }

    pub fn is_fitted(&self) -> bool {
        matches!(self.state, ProcessState::Fitted(_))
    }

    /// Fitted results, or `NotFitted`
    pub fn fitted(&self) -> Result<&FittedProcess> {
        match &self.state {
            ProcessState::Fitted(fitted) => Ok(fitted),
            _ => Err(BinningError::NotFitted),
        }
    }

    /// Results of every declared variable, in declaration order
    pub fn results(&self) -> Result<&[VariableFitResult]> {
        Ok(&self.fitted()?.results)
    }

    /// Result of one variable
    pub fn variable(&self, name: &str) -> Result<&VariableFitResult> {
        self.fitted()?
            .get(name)
            .ok_or_else(|| BinningError::config(format!("unknown variable '{}'", name)))
    }

    /// Names of the selected variables, in declaration order
    pub fn support(&self) -> Result<Vec<&str>> {
        Ok(self
            .fitted()?
            .results
            .iter()
            .filter(|r| r.selected)
            .map(|r| r.spec.name.as_str())
            .collect())
    }

    /// Check the inputs of `fit` and resolve the target kind
    fn validate_inputs<'d>(
        &self,
        dataset: &'d Dataset,
        target: &[f64],
    ) -> Result<(TargetKind, Vec<&'d ColumnValues>)> {
        let kind = resolve_target_kind(target, self.config.target_type)?;

        if self.config.encoding == EncodingStrategy::Woe && kind == TargetKind::Continuous {
            return Err(BinningError::config(
                "WoE encoding requires a binary target",
            ));
        }

        let mut columns = Vec::with_capacity(self.variables.len());
        for spec in &self.variables {
            let column = dataset.column(&spec.name).ok_or_else(|| {
                BinningError::config(format!("variable '{}' not found in dataset", spec.name))
            })?;
            if column.len() != target.len() {
                return Err(BinningError::config(format!(
                    "variable '{}' has {} rows but the target has {}",
                    spec.name,
                    column.len(),
                    target.len()
                )));
            }
            if spec.dtype == VariableDtype::Numerical && column.dtype() == VariableDtype::Categorical {
                return Err(BinningError::config(format!(
                    "variable '{}' is declared numerical but holds categorical values",
                    spec.name
                )));
            }
            columns.push(column);
        }

        Ok((kind, columns))
    }

    /// Fit every declared variable against `target`.
    ///
    /// All inputs are validated before any state changes; prior results are
    /// discarded. A variable that fails to bin is reported with an `ERROR`
    /// status and never aborts the fit.
    pub fn fit(&mut self, dataset: &Dataset, target: &[f64]) -> Result<&mut Self> {
        let (kind, columns) = self.validate_inputs(dataset, target)?;

        let pool = match self.config.n_jobs {
            Some(n) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| BinningError::config(format!("failed to build worker pool: {}", e)))?,
            ),
            None => None,
        };

        self.state = ProcessState::Fitting;
        let start = Instant::now();

        let context = FitContext {
            totals: TargetTotals::new(kind, target),
            encoding: self.config.encoding,
            unseen_policy: self.config.unseen_policy,
        };

        info!(
            variables = self.variables.len(),
            records = target.len(),
            target_kind = %kind,
            "fitting binning process"
        );

        let pb = fit_progress(self.variables.len() as u64, self.config.verbose);
        let progress_counter = AtomicU64::new(0);
        let variables = &self.variables;
        let config = &self.config;

        let run = || -> Vec<VariableFitResult> {
            variables
                .par_iter()
                .zip(columns.par_iter())
                .map(|(spec, column)| {
                    let result =
                        fit_variable(spec, column, target, config.constraints_for(&spec.name), &context);
                    let done = progress_counter.fetch_add(1, Ordering::Relaxed) + 1;
                    pb.set_position(done);
                    result
                })
                .collect()
        };

        let mut results = match &pool {
            Some(pool) => pool.install(run),
            None => run(),
        };

        let excluded: HashSet<&str> = self.config.excluded.iter().map(String::as_str).collect();
        apply_selection(&mut results, &excluded, self.config.selection.as_ref());

        let n_errors = results.iter().filter(|r| r.status == FitStatus::Error).count();
        let n_selected = results.iter().filter(|r| r.selected).count();
        if n_errors > 0 {
            finish_with_warning(
                &pb,
                &format!("Binned {} variables ({} with errors)", results.len(), n_errors),
            );
        } else {
            finish_with_success(&pb, &format!("Binned {} variables", results.len()));
        }

        let fit_time = start.elapsed();
        info!(
            variables = results.len(),
            selected = n_selected,
            errors = n_errors,
            elapsed_ms = fit_time.as_millis() as u64,
            "binning process fitted"
        );

        let index = FittedProcess::build_index(&results);
        self.state = ProcessState::Fitted(FittedProcess {
            results,
            index,
            n_records: target.len(),
            target_kind: kind,
            totals: context.totals,
            fit_time,
            fitted_at: chrono::Local::now().to_rfc3339(),
        });

        Ok(self)
    }

    /// Persist the fitted process as JSON
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let fitted = self.fitted()?;
        let saved = SavedProcess {
            format_version: FORMAT_VERSION,
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            variables: self.variables.clone(),
            config: self.config.clone(),
            fitted: fitted.clone(),
        };

        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &saved)?;
        debug!(path = %path.display(), "binning process saved");
        Ok(())
    }

    /// Load a process written by `save_json`
    pub fn load_json(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let saved: SavedProcess = serde_json::from_reader(reader)?;

        if saved.format_version != FORMAT_VERSION {
            return Err(BinningError::config(format!(
                "unsupported model format version {} (expected {})",
                saved.format_version, FORMAT_VERSION
            )));
        }

        let mut process = Self::new(saved.variables, saved.config)?;
        let mut fitted = saved.fitted;

        let declared: Vec<&str> = process.variables.iter().map(|v| v.name.as_str()).collect();
        let stored: Vec<&str> = fitted.results.iter().map(|r| r.spec.name.as_str()).collect();
        if declared != stored {
            return Err(BinningError::config(
                "saved results do not match the declared variables",
            ));
        }

        fitted.index = FittedProcess::build_index(&fitted.results);
        process.state = ProcessState::Fitted(fitted);
        debug!(path = %path.display(), "binning process loaded");
        Ok(process)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::config::BinningConstraints;

    fn scenario_data() -> (Dataset, Vec<f64>) {
        let data = Dataset::new()
            .with_column("x", vec![1.0, 2.0, 2.0, 3.0, 3.0, 3.0, 100.0])
            .with_column("g", vec!["a", "a", "b", "b", "c", "c", "c"]);
        (data, vec![0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0])
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let vars = vec![VariableSpec::numerical("x"), VariableSpec::categorical("x")];
        let err = BinningProcess::new(vars, BinningConfig::default()).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_unknown_override_rejected() {
        let mut config = BinningConfig::default();
        config
            .overrides
            .insert("nope".to_string(), BinningConstraints::default());
        assert!(BinningProcess::new(vec![VariableSpec::numerical("x")], config).is_err());
    }

    #[test]
    fn test_reads_before_fit_fail() {
        let process = BinningProcess::new(vec![VariableSpec::numerical("x")], BinningConfig::default()).unwrap();
        assert!(matches!(process.results(), Err(BinningError::NotFitted)));
        assert!(matches!(process.support(), Err(BinningError::NotFitted)));
        assert!(!process.is_fitted());
    }

    #[test]
    fn test_fit_keeps_declaration_order() {
        let (data, target) = scenario_data();
        let vars = vec![VariableSpec::categorical("g"), VariableSpec::numerical("x")];
        let mut process = BinningProcess::new(vars, BinningConfig::default()).unwrap();
        process.fit(&data, &target).unwrap();

        let names: Vec<&str> = process.results().unwrap().iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["g", "x"]);
        assert_eq!(process.fitted().unwrap().n_records, 7);
    }

    #[test]
    fn test_failed_validation_keeps_previous_state() {
        let (data, target) = scenario_data();
        let mut process = BinningProcess::for_dataset(&data, BinningConfig::default()).unwrap();
        process.fit(&data, &target).unwrap();

        let short = vec![0.0, 1.0];
        assert!(process.fit(&data, &short).is_err());
        assert!(process.is_fitted());
        assert_eq!(process.fitted().unwrap().n_records, 7);
    }

    #[test]
    fn test_excluded_variable_not_selected() {
        let (data, target) = scenario_data();
        let config = BinningConfig {
            excluded: vec!["x".to_string()],
            ..Default::default()
        };
        let mut process = BinningProcess::for_dataset(&data, config).unwrap();
        process.fit(&data, &target).unwrap();

        assert_eq!(process.support().unwrap(), vec!["g"]);
        assert!(!process.variable("x").unwrap().selected);
    }

    #[test]
    fn test_top_selection_keeps_best_quality() {
        let (data, target) = scenario_data();
        let config = BinningConfig {
            selection: Some(SelectionCriteria {
                max_quality_score: None,
                top: Some(1),
            }),
            ..Default::default()
        };
        let mut process = BinningProcess::for_dataset(&data, config).unwrap();
        process.fit(&data, &target).unwrap();

        let results = process.results().unwrap();
        let best = results
            .iter()
            .min_by(|a, b| a.quality_score.total_cmp(&b.quality_score))
            .unwrap();
        assert_eq!(process.support().unwrap(), vec![best.name()]);
    }

    #[test]
    fn test_woe_on_continuous_target_rejected() {
        let data = Dataset::new().with_column("x", vec![1.0, 2.0, 3.0]);
        let config = BinningConfig {
            encoding: EncodingStrategy::Woe,
            ..Default::default()
        };
        let mut process = BinningProcess::for_dataset(&data, config).unwrap();
        let err = process.fit(&data, &[1.5, 2.5, 3.5]).unwrap_err();
        assert!(matches!(err, BinningError::Configuration(_)));
        assert!(!process.is_fitted());
    }

    #[test]
    fn test_dedicated_pool() {
        let (data, target) = scenario_data();
        let config = BinningConfig {
            n_jobs: Some(2),
            ..Default::default()
        };
        let mut process = BinningProcess::for_dataset(&data, config).unwrap();
        process.fit(&data, &target).unwrap();
        assert_eq!(process.results().unwrap().len(), 2);
    }
}
