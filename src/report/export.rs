//! JSON export of the fitted-process reports

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use super::binning_table::BinningTable;
use super::information::ProcessInformation;
use super::summary::SummaryRow;
use crate::pipeline::BinningProcess;

/// Metadata about the run that produced the report
#[derive(Serialize)]
pub struct ReportMetadata {
    /// Timestamp of the export (ISO 8601 format)
    pub timestamp: String,
    pub binphi_version: String,
    /// Input file path
    pub input_file: String,
    /// Target column name
    pub target_column: String,
    /// When the process was fitted
    pub fitted_at: String,
}

/// One variable's summary row and bins
#[derive(Serialize)]
pub struct VariableReport {
    #[serde(flatten)]
    pub summary: SummaryRow,
    pub binning_table: BinningTable,
}

#[derive(Serialize)]
pub struct ReportExport {
    pub metadata: ReportMetadata,
    pub information: ProcessInformation,
    pub variables: Vec<VariableReport>,
}

pub struct ExportParams<'a> {
    pub input_file: &'a str,
    pub target_column: &'a str,
}

/// Assemble the full report of a fitted process
pub fn build_report(process: &BinningProcess, params: &ExportParams) -> Result<ReportExport> {
    let fitted = process.fitted().context("Cannot export an unfitted process")?;
    let information = process.information(2)?;

    let variables = fitted
        .results
        .iter()
        .map(|result| VariableReport {
            summary: SummaryRow::from(result),
            binning_table: BinningTable::from_result(result),
        })
        .collect();

    Ok(ReportExport {
        metadata: ReportMetadata {
            timestamp: Utc::now().to_rfc3339(),
            binphi_version: env!("CARGO_PKG_VERSION").to_string(),
            input_file: params.input_file.to_string(),
            target_column: params.target_column.to_string(),
            fitted_at: fitted.fitted_at.clone(),
        },
        information,
        variables,
    })
}

/// Write the report of a fitted process to a JSON file
pub fn export_report(process: &BinningProcess, output_path: &Path, params: &ExportParams) -> Result<()> {
    let report = build_report(process, params)?;

    let json = serde_json::to_string_pretty(&report).context("Failed to serialize binning report to JSON")?;

    std::fs::write(output_path, json)
        .with_context(|| format!("Failed to write binning report to {}", output_path.display()))?;

    Ok(())
}
