//! `binphi fit`: load a data file, fit the binning process, report and save

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use console::style;

use super::args::FitArgs;
use crate::pipeline::{
    load_dataset, save_dataset, target_from_frame, BinningConfig, BinningProcess, Dataset,
    TargetMapping,
};
use crate::report::{export_report, ExportParams};
use crate::utils::{
    create_spinner, finish_with_success, print_banner, print_completion, print_config, print_count,
    print_info, print_step_header, print_step_time, print_success, print_warning, ConfigCard,
};

/// Configuration file values overridden by command-line flags
pub fn build_config(args: &FitArgs) -> Result<BinningConfig> {
    let mut config = match &args.config {
        Some(path) => BinningConfig::from_json_file(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?,
        None => BinningConfig::default(),
    };

    let constraints = &mut config.constraints;
    if let Some(max_bins) = args.max_bins {
        constraints.max_bins = max_bins;
    }
    if let Some(min_bins) = args.min_bins {
        constraints.min_bins = min_bins;
    }
    if let Some(min_bin_size) = args.min_bin_size {
        constraints.min_bin_size = min_bin_size;
    }
    if let Some(prebins) = args.prebins {
        constraints.max_n_prebins = prebins;
    }
    if let Some(trend) = args.trend {
        constraints.monotonic_trend = trend;
    }
    if let Some(seconds) = args.time_limit {
        if !(seconds.is_finite() && seconds > 0.0) {
            anyhow::bail!("--time-limit must be a positive number of seconds, got {}", seconds);
        }
        constraints.budget.time_limit = Some(Duration::from_secs_f64(seconds));
    }

    if let Some(encoding) = args.encoding {
        config.encoding = encoding;
    }
    if let Some(unseen) = args.unseen {
        config.unseen_policy = unseen;
    }
    if let Some(target_type) = args.target_type {
        config.target_type = target_type;
    }
    if args.n_jobs.is_some() {
        config.n_jobs = args.n_jobs;
    }
    config.verbose = args.verbose;

    config.validate()?;
    Ok(config)
}

pub fn run_fit(args: &FitArgs) -> Result<()> {
    let config = build_config(args)?;
    let output_path = args.output_path();

    print_banner(env!("CARGO_PKG_VERSION"));
    print_config(&ConfigCard {
        input: &args.input,
        target: &args.target,
        output: Some(&output_path),
        max_bins: config.constraints.max_bins,
        min_bin_size: config.constraints.min_bin_size,
        trend: config.constraints.monotonic_trend.to_string(),
    });

    // Step 1: Load dataset
    print_step_header(1, "Load Dataset");
    let step_start = Instant::now();
    let spinner = create_spinner("Reading data...");
    let df = load_dataset(&args.input, args.infer_schema_length)?;
    finish_with_success(&spinner, "Dataset loaded");

    let (rows, cols) = df.shape();
    println!("\n    {} Dataset Statistics:", style("✧").cyan());
    println!("      Rows: {}", rows);
    println!("      Columns: {}", cols);

    let column_names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    if !column_names.contains(&args.target) {
        anyhow::bail!(
            "Target column '{}' not found in dataset. Available columns: {:?}",
            args.target,
            column_names
        );
    }
    print_step_time(step_start.elapsed());

    // Step 2: Prepare target and variables
    print_step_header(2, "Prepare Target");
    let step_start = Instant::now();
    let mapping = match (&args.event_value, &args.non_event_value) {
        (Some(event), Some(non_event)) => Some(TargetMapping::new(event.clone(), non_event.clone())),
        _ => None,
    };
    let (features, target) = target_from_frame(&df, &args.target, mapping.as_ref())
        .with_context(|| format!("Failed to prepare target column '{}'", args.target))?;
    if target.len() < rows {
        print_count(
            "row(s) dropped with unmapped target values",
            rows - target.len(),
            None,
        );
    }

    let features = if args.drop_columns.is_empty() {
        features
    } else {
        let present: Vec<&str> = args
            .drop_columns
            .iter()
            .map(String::as_str)
            .filter(|c| features.column(c).is_ok())
            .collect();
        if present.len() < args.drop_columns.len() {
            print_warning("Some --drop-columns were not found in the dataset");
        }
        features.drop_many(present)
    };

    let dataset = Dataset::from_dataframe(&features)?;
    print_success(&format!("{} variable(s) ready for binning", dataset.n_columns()));
    print_step_time(step_start.elapsed());

    // Step 3: Fit
    print_step_header(3, "Optimal Binning");
    let step_start = Instant::now();
    let mut process = BinningProcess::for_dataset(&dataset, config)?;
    process.fit(&dataset, &target)?;

    let information = process.information(args.print_level)?;
    for line in information.to_string().lines() {
        println!("    {}", line);
    }
    if let Some(counts) = information.status_counts {
        if counts.error > 0 {
            print_warning(&format!("{} variable(s) failed to bin", counts.error));
        }
    }
    print_step_time(step_start.elapsed());

    process.summary()?.display();

    for name in &args.show {
        let table = process
            .binning_table(name)
            .with_context(|| format!("Cannot show binning table of '{}'", name))?;
        println!();
        println!("    {} {}", style("▸").cyan(), style(name).white().bold());
        for line in table.to_string().lines() {
            println!("    {}", line);
        }
    }

    // Step 4: Save
    print_step_header(4, "Save Results");
    let step_start = Instant::now();
    process
        .save_json(&output_path)
        .with_context(|| format!("Failed to save model to {}", output_path.display()))?;
    print_success(&format!("Model saved to {}", output_path.display()));

    if let Some(path) = &args.report {
        let input = args.input.display().to_string();
        export_report(
            &process,
            path,
            &ExportParams {
                input_file: &input,
                target_column: &args.target,
            },
        )?;
        print_success(&format!("Report saved to {}", path.display()));
    }

    if let Some(path) = &args.transformed {
        let mut transformed = process.transform(&dataset)?.to_dataframe()?;
        save_dataset(&mut transformed, path)?;
        print_success(&format!("Transformed data saved to {}", path.display()));
    } else {
        print_info("Use `binphi transform` to apply the model to new data");
    }
    print_step_time(step_start.elapsed());

    print_completion();
    Ok(())
}
