//! Target column analysis and mapping
//!
//! Detects whether a target is binary (0/1) or continuous, and maps
//! arbitrary event/non-event labels of a DataFrame column to 1/0.

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::{BinningError, Result};
use super::stats::TargetKind;

/// Tolerance for floating point comparison when checking binary 0/1 values
const TOLERANCE: f64 = 1e-9;

/// Requested interpretation of the target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    /// Binary when every value is 0 or 1, continuous otherwise
    #[default]
    Auto,
    Binary,
    Continuous,
}

impl std::fmt::Display for TargetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetType::Auto => write!(f, "auto"),
            TargetType::Binary => write!(f, "binary"),
            TargetType::Continuous => write!(f, "continuous"),
        }
    }
}

impl std::str::FromStr for TargetType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(TargetType::Auto),
            "binary" => Ok(TargetType::Binary),
            "continuous" => Ok(TargetType::Continuous),
            _ => Err(format!(
                "Unknown target type: '{}'. Use 'auto', 'binary' or 'continuous'.",
                s
            )),
        }
    }
}

/// Whether every value is 0 or 1 (within tolerance)
pub fn is_binary(values: &[f64]) -> bool {
    values
        .iter()
        .all(|&v| (v - 0.0).abs() < TOLERANCE || (v - 1.0).abs() < TOLERANCE)
}

/// Validate a target and decide its kind
pub fn resolve_target_kind(target: &[f64], requested: TargetType) -> Result<TargetKind> {
    if target.is_empty() {
        return Err(BinningError::config("target is empty"));
    }

    if let Some(pos) = target.iter().position(|v| !v.is_finite()) {
        return Err(BinningError::config(format!(
            "target contains a non-finite value at row {}",
            pos
        )));
    }

    match requested {
        TargetType::Auto => Ok(if is_binary(target) {
            TargetKind::Binary
        } else {
            TargetKind::Continuous
        }),
        TargetType::Binary => {
            if is_binary(target) {
                Ok(TargetKind::Binary)
            } else {
                Err(BinningError::config(
                    "target type is binary but the target contains values other than 0 and 1",
                ))
            }
        }
        TargetType::Continuous => Ok(TargetKind::Continuous),
    }
}

/// Mapping configuration for converting target column values to binary 0/1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetMapping {
    /// Value that maps to 1 (event)
    pub event_value: String,
    /// Value that maps to 0 (non-event)
    pub non_event_value: String,
}

impl TargetMapping {
    pub fn new(event_value: String, non_event_value: String) -> Self {
        Self {
            event_value,
            non_event_value,
        }
    }
}

/// Result of analyzing a target column
#[derive(Debug, Clone)]
pub enum TargetAnalysis {
    /// Target column is already binary 0/1
    AlreadyBinary,
    /// Numeric target with other values, usable as a continuous target
    Continuous,
    /// Non-numeric target that needs an event/non-event mapping
    NeedsMapping { unique_values: Vec<String> },
}

/// Analyze a target column to determine how it can be used
pub fn analyze_target_column(df: &DataFrame, target: &str) -> Result<TargetAnalysis> {
    let target_col = df
        .column(target)
        .map_err(|_| BinningError::config(format!("Target column '{}' not found", target)))?;

    if target_col.len() == 0 {
        return Err(BinningError::config(format!("Target column '{}' is empty", target)));
    }

    if target_col.null_count() == target_col.len() {
        return Err(BinningError::config(format!(
            "Target column '{}' contains only null values",
            target
        )));
    }

    if target_col.dtype().is_primitive_numeric() {
        let float_col = target_col.cast(&DataType::Float64)?;
        let values: Vec<f64> = float_col.f64()?.into_iter().flatten().collect();
        return Ok(if is_binary(&values) {
            TargetAnalysis::AlreadyBinary
        } else {
            TargetAnalysis::Continuous
        });
    }

    let mut unique_values: Vec<String> = column_to_string_vec(target_col)?
        .into_iter()
        .flatten()
        .collect();
    unique_values.sort();
    unique_values.dedup();

    Ok(TargetAnalysis::NeedsMapping { unique_values })
}

/// Create a target mask based on the mapping
///
/// Returns `Some(1.0)` for event values, `Some(0.0)` for non-event values and
/// `None` for values matching neither.
pub fn create_target_mask(
    df: &DataFrame,
    target: &str,
    mapping: &TargetMapping,
) -> Result<Vec<Option<f64>>> {
    let target_col = df
        .column(target)
        .map_err(|_| BinningError::config(format!("Target column '{}' not found", target)))?;

    let mask = column_to_string_vec(target_col)?
        .iter()
        .map(|v| match v {
            Some(s) if s == &mapping.event_value => Some(1.0),
            Some(s) if s == &mapping.non_event_value => Some(0.0),
            _ => None,
        })
        .collect();

    Ok(mask)
}

/// Extract the target from a DataFrame.
///
/// With a mapping, rows whose target matches neither label are dropped from
/// the returned frame so features and target stay aligned. Without one, the
/// column must be numeric and free of nulls.
pub fn target_from_frame(
    df: &DataFrame,
    target: &str,
    mapping: Option<&TargetMapping>,
) -> Result<(DataFrame, Vec<f64>)> {
    match mapping {
        Some(mapping) => {
            let mask = create_target_mask(df, target, mapping)?;
            let keep: Vec<bool> = mask.iter().map(|v| v.is_some()).collect();
            let values: Vec<f64> = mask.into_iter().flatten().collect();
            if values.is_empty() {
                return Err(BinningError::config(format!(
                    "No rows of target column '{}' match '{}' or '{}'",
                    target, mapping.event_value, mapping.non_event_value
                )));
            }
            let filtered = df.filter(&BooleanChunked::from_slice("mask".into(), &keep))?;
            Ok((filtered.drop(target)?, values))
        }
        None => {
            let target_col = df.column(target).map_err(|_| {
                BinningError::config(format!("Target column '{}' not found", target))
            })?;
            if !target_col.dtype().is_primitive_numeric() {
                return Err(BinningError::config(format!(
                    "Target column '{}' is not numeric; provide an event/non-event mapping",
                    target
                )));
            }
            if target_col.null_count() > 0 {
                return Err(BinningError::config(format!(
                    "Target column '{}' contains {} null value(s)",
                    target,
                    target_col.null_count()
                )));
            }
            let float_col = target_col.cast(&DataType::Float64)?;
            let values: Vec<f64> = float_col.f64()?.into_iter().flatten().collect();
            Ok((df.drop(target)?, values))
        }
    }
}

/// Convert a column to a Vec of Option<String> for comparison
fn column_to_string_vec(col: &Column) -> Result<Vec<Option<String>>> {
    let values: Vec<Option<String>> = match col.dtype() {
        DataType::String => col
            .str()?
            .into_iter()
            .map(|v| v.map(|s| s.to_string()))
            .collect(),
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
            let cast = col.cast(&DataType::Int64)?;
            cast.i64()?
                .into_iter()
                .map(|v| v.map(|n| n.to_string()))
                .collect()
        }
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
            let cast = col.cast(&DataType::UInt64)?;
            cast.u64()?
                .into_iter()
                .map(|v| v.map(|n| n.to_string()))
                .collect()
        }
        DataType::Float32 | DataType::Float64 => {
            let cast = col.cast(&DataType::Float64)?;
            cast.f64()?
                .into_iter()
                .map(|v| v.map(|n| format!("{}", n)))
                .collect()
        }
        DataType::Boolean => col
            .bool()?
            .into_iter()
            .map(|v| v.map(|b| b.to_string()))
            .collect(),
        _ => {
            let cast = col.cast(&DataType::String)?;
            cast.str()?
                .into_iter()
                .map(|v| v.map(|s| s.to_string()))
                .collect()
        }
    };

    Ok(values)
}
