//! Command-line argument definitions using clap

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::pipeline::{EncodingStrategy, MonotonicTrend, TargetType, TransformMetric, UnseenPolicy};

/// binphi - Optimal binning of many variables against one target
#[derive(Parser, Debug)]
#[command(name = "binphi")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fit a binning process on a data file and save the model
    Fit(FitArgs),
    /// Apply a saved binning process to a data file
    Transform(TransformArgs),
}

#[derive(Args, Debug, Clone)]
pub struct FitArgs {
    /// Input file path (CSV or Parquet)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Target column name
    #[arg(short, long)]
    pub target: String,

    /// Value in target column that represents EVENT (maps to 1).
    /// Required with --non-event-value when target is not numeric.
    #[arg(long, requires = "non_event_value")]
    pub event_value: Option<String>,

    /// Value in target column that represents NON-EVENT (maps to 0).
    #[arg(long, requires = "event_value")]
    pub non_event_value: Option<String>,

    /// JSON configuration file. Flags below override its constraint values.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum number of bins per variable
    #[arg(long)]
    pub max_bins: Option<usize>,

    /// Minimum number of bins per variable
    #[arg(long)]
    pub min_bins: Option<usize>,

    /// Minimum fraction of non-missing rows per bin (0-1)
    #[arg(long, value_parser = validate_fraction)]
    pub min_bin_size: Option<f64>,

    /// Number of prebins before optimization
    #[arg(long)]
    pub prebins: Option<usize>,

    /// Monotonic trend of the target across numerical bins.
    /// Options: "none", "ascending", "descending", "auto"
    #[arg(long)]
    pub trend: Option<MonotonicTrend>,

    /// Per-bin encoded value.
    /// Options: "auto", "woe", "mean_centered", "target_aggregate"
    #[arg(long)]
    pub encoding: Option<EncodingStrategy>,

    /// Routing of categorical levels unseen at fit time. Options: "other", "nearest"
    #[arg(long)]
    pub unseen: Option<UnseenPolicy>,

    /// Target type. Options: "auto", "binary", "continuous"
    #[arg(long)]
    pub target_type: Option<TargetType>,

    /// Solver time limit in seconds per variable
    #[arg(long)]
    pub time_limit: Option<f64>,

    /// Columns to leave out of binning (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub drop_columns: Vec<String>,

    /// Number of worker threads (defaults to all cores)
    #[arg(short = 'j', long)]
    pub n_jobs: Option<usize>,

    /// Where to save the fitted model. Defaults to the input directory with a
    /// '_binning.json' suffix.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also write the transformed selected variables (CSV or Parquet)
    #[arg(long)]
    pub transformed: Option<PathBuf>,

    /// Write a JSON report with every binning table
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Detail of the printed information report (0, 1 or 2)
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u8).range(0..=2))]
    pub print_level: u8,

    /// Print the binning table of these variables (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub show: Vec<String>,

    /// Show the progress bar while fitting
    #[arg(short, long, default_value = "false")]
    pub verbose: bool,

    /// Number of rows to use for schema inference (CSV only).
    /// Use 0 for full table scan.
    #[arg(long, default_value = "10000")]
    pub infer_schema_length: usize,
}

impl FitArgs {
    /// Get the model path, deriving it from the input if not explicitly provided
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| derived_path(&self.input, "_binning", "json"))
    }
}

#[derive(Args, Debug, Clone)]
pub struct TransformArgs {
    /// Saved model (JSON written by `binphi fit`)
    #[arg(short, long)]
    pub model: PathBuf,

    /// Input file path (CSV or Parquet)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output file path. Defaults to the input directory with a '_binned' suffix.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Value written per row. Options: "encoded", "target_aggregate", "bin_index"
    #[arg(long, default_value = "encoded")]
    pub metric: TransformMetric,

    /// Number of rows to use for schema inference (CSV only)
    #[arg(long, default_value = "10000")]
    pub infer_schema_length: usize,
}

impl TransformArgs {
    pub fn output_path(&self) -> PathBuf {
        let extension = self
            .input
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("parquet")
            .to_string();
        self.output
            .clone()
            .unwrap_or_else(|| derived_path(&self.input, "_binned", &extension))
    }
}

/// `<dir>/<stem><suffix>.<extension>` next to `input`
fn derived_path(input: &Path, suffix: &str, extension: &str) -> PathBuf {
    let parent = input.parent().unwrap_or_else(|| Path::new("."));
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    parent.join(format!("{}{}.{}", stem, suffix, extension))
}

/// Validator for fractions in [0, 1]
fn validate_fraction(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;

    if !(0.0..=1.0).contains(&value) {
        Err(format!("value must be between 0.0 and 1.0, got {}", value))
    } else {
        Ok(value)
    }
}
