//! In-memory column data fed to the binning process
//!
//! A `Dataset` maps variable names to raw columns. Numerical columns hold
//! `Option<f64>` and categorical columns hold `Option<String>`; `None` and
//! `NaN` are treated as missing values.

use std::collections::HashMap;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::Result;

/// Declared type of an input variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableDtype {
    Numerical,
    Categorical,
}

impl std::fmt::Display for VariableDtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VariableDtype::Numerical => write!(f, "numerical"),
            VariableDtype::Categorical => write!(f, "categorical"),
        }
    }
}

impl std::str::FromStr for VariableDtype {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "numerical" | "numeric" => Ok(VariableDtype::Numerical),
            "categorical" | "category" => Ok(VariableDtype::Categorical),
            _ => Err(format!(
                "Unknown variable type: '{}'. Use 'numerical' or 'categorical'.",
                s
            )),
        }
    }
}

/// Name and declared type of a variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSpec {
    pub name: String,
    pub dtype: VariableDtype,
}

impl VariableSpec {
    pub fn new(name: impl Into<String>, dtype: VariableDtype) -> Self {
        Self {
            name: name.into(),
            dtype,
        }
    }

    pub fn numerical(name: impl Into<String>) -> Self {
        Self::new(name, VariableDtype::Numerical)
    }

    pub fn categorical(name: impl Into<String>) -> Self {
        Self::new(name, VariableDtype::Categorical)
    }
}

/// Raw values of one column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Numerical(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Numerical(v) => v.len(),
            ColumnValues::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Natural dtype of the stored values
    pub fn dtype(&self) -> VariableDtype {
        match self {
            ColumnValues::Numerical(_) => VariableDtype::Numerical,
            ColumnValues::Categorical(_) => VariableDtype::Categorical,
        }
    }

    /// Number of missing entries (`None` or `NaN`)
    pub fn missing_count(&self) -> usize {
        match self {
            ColumnValues::Numerical(v) => v.iter().filter(|x| is_missing_number(**x)).count(),
            ColumnValues::Categorical(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    /// View the column as categorical levels.
    ///
    /// Numbers are rendered with `f64`'s `Display`, so `1.0` becomes `"1"`.
    pub fn to_categorical(&self) -> Vec<Option<String>> {
        match self {
            ColumnValues::Categorical(v) => v.clone(),
            ColumnValues::Numerical(v) => v
                .iter()
                .map(|x| match x {
                    Some(n) if !n.is_nan() => Some(format!("{}", n)),
                    _ => None,
                })
                .collect(),
        }
    }
}

impl From<Vec<f64>> for ColumnValues {
    fn from(values: Vec<f64>) -> Self {
        ColumnValues::Numerical(values.into_iter().map(Some).collect())
    }
}

impl From<Vec<Option<f64>>> for ColumnValues {
    fn from(values: Vec<Option<f64>>) -> Self {
        ColumnValues::Numerical(values)
    }
}

impl From<Vec<&str>> for ColumnValues {
    fn from(values: Vec<&str>) -> Self {
        ColumnValues::Categorical(values.into_iter().map(|s| Some(s.to_string())).collect())
    }
}

impl From<Vec<Option<&str>>> for ColumnValues {
    fn from(values: Vec<Option<&str>>) -> Self {
        ColumnValues::Categorical(values.into_iter().map(|s| s.map(str::to_string)).collect())
    }
}

impl From<Vec<Option<String>>> for ColumnValues {
    fn from(values: Vec<Option<String>>) -> Self {
        ColumnValues::Categorical(values)
    }
}

#[inline]
pub(crate) fn is_missing_number(value: Option<f64>) -> bool {
    match value {
        Some(v) => v.is_nan(),
        None => true,
    }
}

/// Named columns, kept in insertion order
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    columns: Vec<(String, ColumnValues)>,
    index: HashMap<String, usize>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with_column(mut self, name: impl Into<String>, values: impl Into<ColumnValues>) -> Self {
        self.insert(name, values);
        self
    }

    /// Insert or replace a column
    pub fn insert(&mut self, name: impl Into<String>, values: impl Into<ColumnValues>) {
        let name = name.into();
        let values = values.into();
        match self.index.get(&name) {
            Some(&pos) => self.columns[pos].1 = values,
            None => {
                self.index.insert(name.clone(), self.columns.len());
                self.columns.push((name, values));
            }
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnValues> {
        self.index.get(name).map(|&pos| &self.columns[pos].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Row count of the first column (0 for an empty dataset)
    pub fn n_rows(&self) -> usize {
        self.columns.first().map(|(_, c)| c.len()).unwrap_or(0)
    }

    /// One spec per column, typed by the stored values
    pub fn infer_specs(&self) -> Vec<VariableSpec> {
        self.columns
            .iter()
            .map(|(name, values)| VariableSpec::new(name.clone(), values.dtype()))
            .collect()
    }

    /// Convert a polars DataFrame.
    ///
    /// Numeric columns become numerical; strings, categoricals, booleans and
    /// every other dtype are converted to string levels.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let mut dataset = Dataset::new();

        for col in df.get_columns() {
            let name = col.name().to_string();
            let values = if col.dtype().is_primitive_numeric() {
                let cast = col.cast(&DataType::Float64)?;
                ColumnValues::Numerical(cast.f64()?.into_iter().collect())
            } else {
                let cast = col.cast(&DataType::String)?;
                ColumnValues::Categorical(
                    cast.str()?
                        .into_iter()
                        .map(|v| v.map(|s| s.to_string()))
                        .collect(),
                )
            };
            dataset.insert(name, values);
        }

        Ok(dataset)
    }
}
