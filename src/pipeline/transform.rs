//! Applying fitted bins to new data

use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::binner::VariableFitResult;
use super::dataset::{ColumnValues, Dataset};
use super::error::{BinningError, Result};
use super::process::BinningProcess;
use super::stats::TargetTotals;

/// Value written for each transformed row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformMetric {
    /// The bin's encoded value
    #[default]
    Encoded,
    /// The bin's target aggregate (overall aggregate for bins empty at fit time)
    TargetAggregate,
    /// Regular bin `i`, missing bin `n_bins`, other bin `n_bins + 1`
    BinIndex,
}

impl std::fmt::Display for TransformMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformMetric::Encoded => write!(f, "encoded"),
            TransformMetric::TargetAggregate => write!(f, "target_aggregate"),
            TransformMetric::BinIndex => write!(f, "bin_index"),
        }
    }
}

impl std::str::FromStr for TransformMetric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "encoded" | "woe" => Ok(TransformMetric::Encoded),
            "target_aggregate" | "mean" | "event_rate" => Ok(TransformMetric::TargetAggregate),
            "bin_index" | "bins" | "index" => Ok(TransformMetric::BinIndex),
            _ => Err(format!(
                "Unknown transform metric: '{}'. Use 'encoded', 'target_aggregate' or 'bin_index'.",
                s
            )),
        }
    }
}

/// Transformed columns of the selected variables, in declaration order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransformedData {
    columns: Vec<(String, Vec<f64>)>,
    n_rows: usize,
}

impl TransformedData {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn into_columns(self) -> Vec<(String, Vec<f64>)> {
        self.columns
    }

    /// Build a polars DataFrame with one Float64 column per variable
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let columns: Vec<Column> = self
            .columns
            .iter()
            .map(|(name, values)| Column::new(name.as_str().into(), values.as_slice()))
            .collect();
        Ok(DataFrame::new(columns)?)
    }
}

/// Transform one column with a fitted variable's bins
pub fn transform_column(
    result: &VariableFitResult,
    column: &ColumnValues,
    metric: TransformMetric,
    totals: &TargetTotals,
) -> Result<Vec<f64>> {
    let locations = result.bin_set.locator().locate_column(column)?;

    let values = locations
        .into_iter()
        .map(|location| match metric {
            TransformMetric::Encoded => result.bin_stats(location).encoded_value,
            TransformMetric::TargetAggregate => {
                let stats = result.bin_stats(location);
                if stats.count == 0 {
                    totals.mean()
                } else {
                    stats.target_aggregate
                }
            }
            TransformMetric::BinIndex => result.bin_index(location) as f64,
        })
        .collect();

    Ok(values)
}

impl BinningProcess {
    /// Encoded values of the selected variables
    pub fn transform(&self, dataset: &Dataset) -> Result<TransformedData> {
        self.transform_with(dataset, TransformMetric::Encoded)
    }

    /// Transform the selected variables with a given metric.
    ///
    /// Missing values go to the missing bin and unseen levels follow the
    /// unseen route; neither is an error.
    pub fn transform_with(&self, dataset: &Dataset, metric: TransformMetric) -> Result<TransformedData> {
        let fitted = self.fitted()?;
        let selected: Vec<&VariableFitResult> = fitted.results.iter().filter(|r| r.selected).collect();

        let mut inputs: Vec<(&VariableFitResult, &ColumnValues)> = Vec::with_capacity(selected.len());
        let mut n_rows: Option<usize> = None;
        for result in selected {
            let column = dataset.column(result.name()).ok_or_else(|| {
                BinningError::config(format!("variable '{}' not found in dataset", result.name()))
            })?;
            match n_rows {
                Some(n) if n != column.len() => {
                    return Err(BinningError::config(format!(
                        "variable '{}' has {} rows, expected {}",
                        result.name(),
                        column.len(),
                        n
                    )));
                }
                _ => n_rows = Some(column.len()),
            }
            inputs.push((result, column));
        }

        let columns = inputs
            .par_iter()
            .map(|(result, column)| {
                transform_column(result, column, metric, &fitted.totals)
                    .map(|values| (result.name().to_string(), values))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(TransformedData {
            columns,
            n_rows: n_rows.unwrap_or_else(|| dataset.n_rows()),
        })
    }

    /// Fit, then transform the same data
    pub fn fit_transform(&mut self, dataset: &Dataset, target: &[f64]) -> Result<TransformedData> {
        self.fit(dataset, target)?;
        self.transform(dataset)
    }

    /// Transform the selected variables of a DataFrame
    pub fn transform_frame(&self, df: &DataFrame, metric: TransformMetric) -> Result<DataFrame> {
        let names = self.support()?;
        for name in &names {
            if df.column(name).is_err() {
                return Err(BinningError::config(format!(
                    "variable '{}' not found in data",
                    name
                )));
            }
        }
        let subset = df.select(names.iter().copied())?;
        let dataset = Dataset::from_dataframe(&subset)?;
        self.transform_with(&dataset, metric)?.to_dataframe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::config::BinningConfig;

    fn fitted_process() -> (BinningProcess, Dataset) {
        let data = Dataset::new()
            .with_column("x", vec![1.0, 2.0, 2.0, 3.0, 3.0, 3.0, 100.0])
            .with_column("g", vec!["a", "a", "b", "b", "c", "c", "c"]);
        let target = [0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0];
        let mut process = BinningProcess::for_dataset(&data, BinningConfig::default()).unwrap();
        process.fit(&data, &target).unwrap();
        (process, data)
    }

    #[test]
    fn test_transform_before_fit_fails() {
        let data = Dataset::new().with_column("x", vec![1.0]);
        let process = BinningProcess::for_dataset(&data, BinningConfig::default()).unwrap();
        assert!(matches!(process.transform(&data), Err(BinningError::NotFitted)));
    }

    #[test]
    fn test_transform_shape() {
        let (process, data) = fitted_process();
        let out = process.transform(&data).unwrap();

        assert_eq!(out.n_rows(), 7);
        assert_eq!(out.names().collect::<Vec<_>>(), process.support().unwrap());
    }

    #[test]
    fn test_bin_index_for_missing_and_unseen() {
        let (process, _) = fitted_process();
        let new_data = Dataset::new()
            .with_column("x", vec![None, Some(1.0)])
            .with_column("g", vec![Some("zzz"), None]);

        let out = process.transform_with(&new_data, TransformMetric::BinIndex).unwrap();
        let x = process.variable("x").unwrap();
        let g = process.variable("g").unwrap();

        assert_eq!(out.column("x").unwrap()[0], x.n_bins as f64);
        assert_eq!(out.column("x").unwrap()[1], 0.0);
        assert_eq!(out.column("g").unwrap()[0], (g.n_bins + 1) as f64);
        assert_eq!(out.column("g").unwrap()[1], g.n_bins as f64);
    }

    #[test]
    fn test_missing_column_is_configuration_error() {
        let (process, _) = fitted_process();
        let partial = Dataset::new().with_column("x", vec![1.0]);
        assert!(matches!(
            process.transform(&partial),
            Err(BinningError::Configuration(_))
        ));
    }

    #[test]
    fn test_transform_frame() {
        let (process, _) = fitted_process();
        let df = df! {
            "x" => [1.0f64, 50.0, 200.0],
            "g" => ["a", "b", "new"],
            "extra" => [1i32, 2, 3],
        }
        .unwrap();

        let out = process.transform_frame(&df, TransformMetric::Encoded).unwrap();
        assert_eq!(out.height(), 3);
        assert_eq!(out.width(), process.support().unwrap().len());
        assert!(out.column("extra").is_err());
    }

    #[test]
    fn test_metric_from_str() {
        assert_eq!("bin-index".parse::<TransformMetric>().unwrap(), TransformMetric::BinIndex);
        assert_eq!("Encoded".parse::<TransformMetric>().unwrap(), TransformMetric::Encoded);
        assert!("rank".parse::<TransformMetric>().is_err());
    }
}
