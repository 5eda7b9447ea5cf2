//! `binphi transform`: apply a saved binning process to a data file

use std::time::Instant;

use anyhow::{Context, Result};

use super::args::TransformArgs;
use crate::pipeline::{load_dataset, save_dataset, BinningProcess};
use crate::utils::{
    create_spinner, finish_with_success, print_count, print_step_time, print_success,
};

pub fn run_transform(args: &TransformArgs) -> Result<()> {
    let start = Instant::now();
    let output_path = args.output_path();

    let spinner = create_spinner("Loading model...");
    let process = BinningProcess::load_json(&args.model)
        .with_context(|| format!("Failed to load model from {}", args.model.display()))?;
    finish_with_success(&spinner, "Model loaded");

    let spinner = create_spinner("Reading data...");
    let df = load_dataset(&args.input, args.infer_schema_length)?;
    finish_with_success(&spinner, "Dataset loaded");

    let mut transformed = process
        .transform_frame(&df, args.metric)
        .context("Failed to transform dataset")?;
    print_count(
        "variable(s) transformed",
        transformed.width(),
        Some(&format!("({})", args.metric)),
    );

    save_dataset(&mut transformed, &output_path)?;
    print_success(&format!("Saved to {}", output_path.display()));
    print_step_time(start.elapsed());
    Ok(())
}
