//! Process-level information report

use std::time::Duration;

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Table};
use serde::Serialize;

use crate::pipeline::{
    BinningConstraints, BinningError, BinningProcess, FitStatus, Result, TargetKind, VariableDtype,
};

/// Number of variables fitted with each status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub optimal: usize,
    pub undefined: usize,
    pub empty: usize,
    pub error: usize,
}

impl StatusCounts {
    fn record(&mut self, status: FitStatus) {
        match status {
            FitStatus::Optimal => self.optimal += 1,
            FitStatus::Undefined => self.undefined += 1,
            FitStatus::Empty => self.empty += 1,
            FitStatus::Error => self.error += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableDetail {
    pub name: String,
    pub status: FitStatus,
    pub n_bins: usize,
    pub fit_time: Duration,
}

/// What `information` reports at a given print level
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessInformation {
    pub print_level: u8,
    pub n_records: usize,
    pub target_kind: TargetKind,
    pub n_numerical: usize,
    pub n_categorical: usize,
    pub n_selected: usize,
    pub fit_time: Duration,
    /// Present from level 1
    pub status_counts: Option<StatusCounts>,
    /// Present from level 1
    pub constraints: Option<BinningConstraints>,
    /// Present at level 2
    pub details: Option<Vec<VariableDetail>>,
}

impl ProcessInformation {
    pub fn n_variables(&self) -> usize {
        self.n_numerical + self.n_categorical
    }

    fn key_value_table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Property").add_attribute(Attribute::Bold),
            Cell::new("Value").add_attribute(Attribute::Bold),
        ]);

        table.add_row(vec![Cell::new("Records"), Cell::new(self.n_records)]);
        table.add_row(vec![Cell::new("Target"), Cell::new(self.target_kind)]);
        table.add_row(vec![Cell::new("Variables"), Cell::new(self.n_variables())]);
        table.add_row(vec![Cell::new("  numerical"), Cell::new(self.n_numerical)]);
        table.add_row(vec![Cell::new("  categorical"), Cell::new(self.n_categorical)]);
        table.add_row(vec![Cell::new("Selected"), Cell::new(self.n_selected)]);
        table.add_row(vec![
            Cell::new("Fit time"),
            Cell::new(format!("{:.3}s", self.fit_time.as_secs_f64())),
        ]);

        if let Some(counts) = &self.status_counts {
            table.add_row(vec![Cell::new("OPTIMAL"), Cell::new(counts.optimal)]);
            table.add_row(vec![Cell::new("UNDEFINED"), Cell::new(counts.undefined)]);
            table.add_row(vec![Cell::new("EMPTY"), Cell::new(counts.empty)]);
            table.add_row(vec![Cell::new("ERROR"), Cell::new(counts.error)]);
        }

        if let Some(c) = &self.constraints {
            table.add_row(vec![Cell::new("max_bins"), Cell::new(c.max_bins)]);
            table.add_row(vec![Cell::new("min_bins"), Cell::new(c.min_bins)]);
            table.add_row(vec![Cell::new("min_bin_size"), Cell::new(c.min_bin_size)]);
            table.add_row(vec![Cell::new("monotonic_trend"), Cell::new(c.monotonic_trend)]);
            table.add_row(vec![Cell::new("max_n_prebins"), Cell::new(c.max_n_prebins)]);
        }

        table
    }

    fn details_table(details: &[VariableDetail]) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Variable").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
            Cell::new("Bins").add_attribute(Attribute::Bold),
            Cell::new("Time (ms)").add_attribute(Attribute::Bold),
        ]);
        for d in details {
            table.add_row(vec![
                Cell::new(&d.name),
                Cell::new(d.status),
                Cell::new(d.n_bins),
                Cell::new(format!("{:.2}", d.fit_time.as_secs_f64() * 1000.0)),
            ]);
        }
        table
    }
}

impl std::fmt::Display for ProcessInformation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key_value_table())?;
        if let Some(details) = &self.details {
            write!(f, "\n{}", Self::details_table(details))?;
        }
        Ok(())
    }
}

impl BinningProcess {
    /// Process overview at `print_level` 0, 1 or 2
    pub fn information(&self, print_level: u8) -> Result<ProcessInformation> {
        if print_level > 2 {
            return Err(BinningError::config(format!(
                "print_level must be 0, 1 or 2, got {}",
                print_level
            )));
        }
        let fitted = self.fitted()?;

        let n_numerical = self
            .variables()
            .iter()
            .filter(|v| v.dtype == VariableDtype::Numerical)
            .count();

        let status_counts = (print_level >= 1).then(|| {
            let mut counts = StatusCounts::default();
            for r in &fitted.results {
                counts.record(r.status);
            }
            counts
        });

        let details = (print_level == 2).then(|| {
            fitted
                .results
                .iter()
                .map(|r| VariableDetail {
                    name: r.spec.name.clone(),
                    status: r.status,
                    n_bins: r.n_bins,
                    fit_time: r.fit_time,
                })
                .collect()
        });

        Ok(ProcessInformation {
            print_level,
            n_records: fitted.n_records,
            target_kind: fitted.target_kind,
            n_numerical,
            n_categorical: self.variables().len() - n_numerical,
            n_selected: fitted.n_selected(),
            fit_time: fitted.fit_time,
            status_counts,
            constraints: (print_level >= 1).then(|| self.config().constraints.clone()),
            details,
        })
    }
}
