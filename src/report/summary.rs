//! Per-variable summary of a fitted binning process

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;
use serde::Serialize;

use crate::pipeline::{BinningProcess, FitStatus, Result, VariableDtype, VariableFitResult};

/// One summary row per declared variable
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub name: String,
    pub dtype: VariableDtype,
    pub status: FitStatus,
    pub selected: bool,
    pub n_bins: usize,
    pub quality_score: f64,
    /// Smallest encoded value over regular bins
    pub encoded_min: f64,
    /// Largest encoded value over regular bins
    pub encoded_max: f64,
}

impl From<&VariableFitResult> for SummaryRow {
    fn from(result: &VariableFitResult) -> Self {
        let (encoded_min, encoded_max) = result.encoded_range().unwrap_or((0.0, 0.0));
        Self {
            name: result.spec.name.clone(),
            dtype: result.spec.dtype,
            status: result.status,
            selected: result.selected,
            n_bins: result.n_bins,
            quality_score: result.quality_score,
            encoded_min,
            encoded_max,
        }
    }
}

/// Summary table in declaration order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub rows: Vec<SummaryRow>,
}

fn status_color(status: FitStatus) -> Color {
    match status {
        FitStatus::Optimal => Color::Green,
        FitStatus::Undefined | FitStatus::Empty => Color::Yellow,
        FitStatus::Error => Color::Red,
    }
}

impl Summary {
    pub fn from_results(results: &[VariableFitResult]) -> Self {
        Self {
            rows: results.iter().map(SummaryRow::from).collect(),
        }
    }

    pub fn row(&self, name: &str) -> Option<&SummaryRow> {
        self.rows.iter().find(|r| r.name == name)
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Variable").add_attribute(Attribute::Bold),
            Cell::new("Type").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
            Cell::new("Selected").add_attribute(Attribute::Bold),
            Cell::new("Bins").add_attribute(Attribute::Bold),
            Cell::new("Quality").add_attribute(Attribute::Bold),
            Cell::new("Encoded min").add_attribute(Attribute::Bold),
            Cell::new("Encoded max").add_attribute(Attribute::Bold),
        ]);

        for row in &self.rows {
            table.add_row(vec![
                Cell::new(&row.name),
                Cell::new(row.dtype),
                Cell::new(row.status).fg(status_color(row.status)),
                Cell::new(if row.selected { "yes" } else { "no" }).fg(if row.selected {
                    Color::Green
                } else {
                    Color::White
                }),
                Cell::new(row.n_bins),
                Cell::new(format!("{:.4}", row.quality_score)),
                Cell::new(format!("{:.4}", row.encoded_min)),
                Cell::new(format!("{:.4}", row.encoded_max)),
            ]);
        }

        table
    }

    /// Print the summary with a styled header
    pub fn display(&self) {
        println!();
        println!(
            "    {} {}",
            style("📋").cyan(),
            style("BINNING SUMMARY").white().bold()
        );
        println!("    {}", style("─".repeat(50)).dim());
        println!();

        for line in self.to_table().to_string().lines() {
            println!("    {}", line);
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_table())
    }
}

impl BinningProcess {
    /// Summary rows for every declared variable
    pub fn summary(&self) -> Result<Summary> {
        Ok(Summary::from_results(self.results()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{BinningConfig, Dataset};

    #[test]
    fn test_summary_rows_follow_declaration_order() {
        let data = Dataset::new()
            .with_column("b", vec![1.0, 2.0, 3.0, 4.0])
            .with_column("a", vec!["x", "y", "x", "y"]);
        let target = [0.0, 1.0, 0.0, 1.0];
        let mut process = BinningProcess::for_dataset(&data, BinningConfig::default()).unwrap();
        process.fit(&data, &target).unwrap();

        let summary = process.summary().unwrap();
        let names: Vec<&str> = summary.rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);

        let a = summary.row("a").unwrap();
        assert_eq!(a.dtype, VariableDtype::Categorical);
        assert!(a.encoded_min <= a.encoded_max);
        assert!(summary.to_string().contains("Quality"));
    }

    #[test]
    fn test_summary_before_fit() {
        let data = Dataset::new().with_column("b", vec![1.0]);
        let process = BinningProcess::for_dataset(&data, BinningConfig::default()).unwrap();
        assert!(process.summary().is_err());
    }
}
