//! Per-bin table of one fitted variable

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use serde::Serialize;

use crate::pipeline::{BinStats, BinningProcess, Result, VariableFitResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinningTableRow {
    pub label: String,
    pub count: usize,
    pub population_pct: f64,
    pub target_aggregate: f64,
    pub encoded_value: f64,
    pub separation: f64,
}

impl BinningTableRow {
    fn new(label: String, stats: &BinStats) -> Self {
        Self {
            label,
            count: stats.count,
            population_pct: stats.population_pct,
            target_aggregate: stats.target_aggregate,
            encoded_value: stats.encoded_value,
            separation: stats.separation,
        }
    }
}

/// Regular bins followed by the missing bin, the other bin when one is
/// reserved, and totals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinningTable {
    pub variable: String,
    pub rows: Vec<BinningTableRow>,
    pub total_count: usize,
    /// Sum of per-bin separation terms
    pub total_separation: f64,
    pub quality_score: f64,
}

impl BinningTable {
    pub fn from_result(result: &VariableFitResult) -> Self {
        let mut rows: Vec<BinningTableRow> = result
            .bin_set
            .labels()
            .into_iter()
            .zip(result.bins.iter())
            .map(|(label, stats)| BinningTableRow::new(label, stats))
            .collect();
        rows.push(BinningTableRow::new("Missing".to_string(), &result.missing_bin));
        if let Some(other) = &result.other_bin {
            rows.push(BinningTableRow::new("Other".to_string(), other));
        }

        Self {
            variable: result.spec.name.clone(),
            total_count: rows.iter().map(|r| r.count).sum(),
            total_separation: rows.iter().map(|r| r.separation).sum(),
            quality_score: result.quality_score,
            rows,
        }
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Bin").add_attribute(Attribute::Bold),
            Cell::new("Count").add_attribute(Attribute::Bold),
            Cell::new("Count (%)").add_attribute(Attribute::Bold),
            Cell::new("Aggregate").add_attribute(Attribute::Bold),
            Cell::new("Encoded").add_attribute(Attribute::Bold),
            Cell::new("Separation").add_attribute(Attribute::Bold),
        ]);

        for row in &self.rows {
            table.add_row(vec![
                Cell::new(&row.label),
                Cell::new(row.count),
                Cell::new(format!("{:.2}", row.population_pct * 100.0)),
                Cell::new(format!("{:.4}", row.target_aggregate)),
                Cell::new(format!("{:.4}", row.encoded_value)),
                Cell::new(format!("{:.4}", row.separation)),
            ]);
        }

        table.add_row(vec![
            Cell::new("Totals").add_attribute(Attribute::Bold),
            Cell::new(self.total_count).add_attribute(Attribute::Bold),
            Cell::new("100.00").add_attribute(Attribute::Bold),
            Cell::new(""),
            Cell::new(""),
            Cell::new(format!("{:.4}", self.total_separation))
                .add_attribute(Attribute::Bold)
                .fg(Color::Cyan),
        ]);

        table
    }
}

impl std::fmt::Display for BinningTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_table())
    }
}

impl BinningProcess {
    /// Binning table of one fitted variable
    pub fn binning_table(&self, name: &str) -> Result<BinningTable> {
        Ok(BinningTable::from_result(self.variable(name)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{BinningConfig, BinningError, Dataset};

    fn fitted() -> BinningProcess {
        let data = Dataset::new()
            .with_column("x", vec![Some(1.0), Some(2.0), None, Some(3.0), Some(3.0), Some(100.0)])
            .with_column("g", vec!["a", "a", "b", "b", "c", "c"]);
        let target = [0.0, 0.0, 1.0, 1.0, 1.0, 0.0];
        let mut process = BinningProcess::for_dataset(&data, BinningConfig::default()).unwrap();
        process.fit(&data, &target).unwrap();
        process
    }

    #[test]
    fn test_numerical_table_counts_every_row() {
        let process = fitted();
        let table = process.binning_table("x").unwrap();
        let result = process.variable("x").unwrap();

        assert_eq!(table.total_count, 6);
        assert_eq!(table.rows.len(), result.n_bins + 1);
        assert_eq!(table.rows.last().unwrap().label, "Missing");
        assert_eq!(table.rows.last().unwrap().count, 1);
        assert!((table.total_separation - result.separation).abs() < 1e-9);
    }

    #[test]
    fn test_categorical_table_has_other_row() {
        let table = fitted().binning_table("g").unwrap();
        assert_eq!(table.rows.last().unwrap().label, "Other");
        assert_eq!(table.rows.last().unwrap().count, 0);
        assert!(table.to_string().contains("Totals"));
    }

    #[test]
    fn test_unknown_variable() {
        assert!(matches!(
            fitted().binning_table("nope"),
            Err(BinningError::Configuration(_))
        ));
    }
}
