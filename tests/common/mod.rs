//! Shared test utilities and fixture generators
#![allow(dead_code)]

use binphi::pipeline::Dataset;
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use tempfile::TempDir;

/// Numerical variable with an outlier, binary target
pub fn outlier_values() -> (Vec<f64>, Vec<f64>) {
    (
        vec![1.0, 2.0, 2.0, 3.0, 3.0, 3.0, 100.0],
        vec![0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0],
    )
}

/// Synthetic credit-style dataset with a binary target.
///
/// - `income`: event rate falls as income rises
/// - `age`: event rate rises with age, 10% missing
/// - `region`: categorical with a clearly riskier level
/// - `noise`: independent of the target
pub fn create_synthetic_dataset(rows: usize, seed: u64) -> (Dataset, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);

    let mut income = Vec::with_capacity(rows);
    let mut age = Vec::with_capacity(rows);
    let mut region = Vec::with_capacity(rows);
    let mut noise = Vec::with_capacity(rows);
    let mut target = Vec::with_capacity(rows);

    let regions = ["north", "south", "east", "west"];
    for _ in 0..rows {
        let inc: f64 = rng.gen_range(10.0..100.0);
        let a: f64 = rng.gen_range(18.0..80.0);
        let r = regions[rng.gen_range(0..regions.len())];

        let mut p = 0.6 - 0.5 * (inc - 10.0) / 90.0 + 0.2 * (a - 18.0) / 62.0;
        if r == "south" {
            p += 0.15;
        }
        let y = if rng.gen::<f64>() < p.clamp(0.02, 0.98) { 1.0 } else { 0.0 };

        income.push(inc);
        age.push(if rng.gen::<f64>() < 0.1 { None } else { Some(a) });
        region.push(r);
        noise.push(rng.gen::<f64>());
        target.push(y);
    }

    let dataset = Dataset::new()
        .with_column("income", income)
        .with_column("age", age)
        .with_column("region", region)
        .with_column("noise", noise);
    (dataset, target)
}

/// Continuous-target dataset: `y = 2x + noise` with a categorical shift
pub fn create_continuous_dataset(rows: usize, seed: u64) -> (Dataset, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut x = Vec::with_capacity(rows);
    let mut group = Vec::with_capacity(rows);
    let mut target = Vec::with_capacity(rows);

    for i in 0..rows {
        let v: f64 = rng.gen_range(0.0..10.0);
        let g = if i % 3 == 0 { "high" } else { "low" };
        let shift = if g == "high" { 5.0 } else { 0.0 };
        x.push(v);
        group.push(g);
        target.push(2.0 * v + shift + rng.gen_range(-1.0..1.0));
    }

    let dataset = Dataset::new().with_column("x", x).with_column("group", group);
    (dataset, target)
}

/// DataFrame with a binary target column and mixed feature types
pub fn create_test_dataframe(rows: usize, seed: u64) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let x: Vec<f64> = (0..rows).map(|_| rng.gen_range(0.0..1.0)).collect();
    let target: Vec<i32> = x
        .iter()
        .map(|&v| if rng.gen::<f64>() < 0.2 + 0.6 * v { 1 } else { 0 })
        .collect();
    let grade: Vec<&str> = x
        .iter()
        .map(|&v| if v < 0.33 { "A" } else if v < 0.66 { "B" } else { "C" })
        .collect();
    let count: Vec<i64> = (0..rows).map(|_| rng.gen_range(0..20)).collect();

    df! {
        "target" => target,
        "x" => x,
        "grade" => grade,
        "count" => count,
    }
    .unwrap()
}

/// Create a temporary directory with a test CSV file
pub fn create_temp_csv(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("test_data.csv");

    let mut file = std::fs::File::create(&csv_path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();

    (temp_dir, csv_path)
}

/// Create a temporary directory with a test Parquet file
pub fn create_temp_parquet(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let parquet_path = temp_dir.path().join("test_data.parquet");

    let file = std::fs::File::create(&parquet_path).unwrap();
    ParquetWriter::new(file).finish(df).unwrap();

    (temp_dir, parquet_path)
}

/// Assert that a DataFrame has expected shape
pub fn assert_shape(df: &DataFrame, expected_rows: usize, expected_cols: usize) {
    let (rows, cols) = df.shape();
    assert_eq!(rows, expected_rows, "Row count mismatch: expected {}, got {}", expected_rows, rows);
    assert_eq!(cols, expected_cols, "Column count mismatch: expected {}, got {}", expected_cols, cols);
}

/// Assert that a sequence is monotonic in the given direction
pub fn assert_monotonic(values: &[f64], ascending: bool) {
    for w in values.windows(2) {
        if ascending {
            assert!(w[0] <= w[1] + 1e-12, "not ascending: {:?}", values);
        } else {
            assert!(w[0] + 1e-12 >= w[1], "not descending: {:?}", values);
        }
    }
}
