//! Tests for the numerical and categorical partition solvers

use binphi::pipeline::*;

#[path = "common/mod.rs"]
mod common;

fn binary_totals(target: &[f64]) -> TargetTotals {
    TargetTotals::new(TargetKind::Binary, target)
}

fn constraints(max_bins: usize, min_bin_size: f64) -> BinningConstraints {
    BinningConstraints {
        max_bins,
        min_bin_size,
        ..Default::default()
    }
}

/// Counts of rows per bin for a given set of splits
fn bin_counts(values: &[f64], splits: &[f64]) -> Vec<usize> {
    let mut counts = vec![0; splits.len() + 1];
    for &v in values {
        counts[splits.partition_point(|&s| s <= v)] += 1;
    }
    counts
}

/// Event rate per bin for a given set of splits
fn bin_rates(values: &[f64], target: &[f64], splits: &[f64]) -> Vec<f64> {
    let mut sums = vec![(0usize, 0.0f64); splits.len() + 1];
    for (&v, &y) in values.iter().zip(target) {
        let bin = splits.partition_point(|&s| s <= v);
        sums[bin].0 += 1;
        sums[bin].1 += y;
    }
    sums.iter().map(|&(n, s)| s / n as f64).collect()
}

#[test]
fn test_outlier_is_isolated() {
    let (values, target) = common::outlier_values();
    let opt: Vec<Option<f64>> = values.iter().copied().map(Some).collect();

    let solution = solve_numerical(&opt, &target, &binary_totals(&target), &constraints(3, 0.1));

    assert_eq!(solution.status, FitStatus::Optimal);
    assert!((1..=2).contains(&solution.splits.len()), "splits: {:?}", solution.splits);
    let last = *solution.splits.last().unwrap();
    assert!(last > 3.0 && last <= 100.0, "100 must be alone in the last bin");
    assert_eq!(*bin_counts(&values, &solution.splits).last().unwrap(), 1);
}

#[test]
fn test_splits_are_finite_and_increasing() {
    let (dataset, target) = common::create_synthetic_dataset(500, 7);
    let Some(ColumnValues::Numerical(income)) = dataset.column("income") else {
        panic!("income should be numerical");
    };

    let solution = solve_numerical(income, &target, &binary_totals(&target), &constraints(6, 0.05));

    assert!(solution.splits.iter().all(|s| s.is_finite()));
    assert!(solution.splits.windows(2).all(|w| w[0] < w[1]));
    assert!(solution.splits.len() + 1 <= 6);
}

#[test]
fn test_infinite_values_get_finite_splits() {
    let mut values: Vec<Option<f64>> = vec![Some(f64::NEG_INFINITY); 3];
    values.extend((1..=6).map(|v| Some(v as f64)));
    values.extend(std::iter::repeat(Some(f64::INFINITY)).take(4));
    let target = [1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];

    let solution = solve_numerical(&values, &target, &binary_totals(&target), &constraints(3, 0.1));

    assert_eq!(solution.status, FitStatus::Optimal);
    assert!(!solution.splits.is_empty());
    assert!(solution.splits.iter().all(|s| s.is_finite()), "{:?}", solution.splits);
    assert!(solution.splits.windows(2).all(|w| w[0] < w[1]));
    let finite: Vec<f64> = values.iter().flatten().copied().collect();
    assert_eq!(bin_counts(&finite, &solution.splits), vec![3, 6, 4]);
}

#[test]
fn test_dominant_value_keeps_search_bounded() {
    let mut values: Vec<Option<f64>> = (0..3000).map(|i| Some(i as f64)).collect();
    let mut target: Vec<f64> = (0..3000).map(|i| if i < 1500 { 0.0 } else { 1.0 }).collect();
    values.extend(std::iter::repeat(Some(5000.0)).take(100_000));
    target.extend((0..100_000).map(|i| (i % 2) as f64));
    let constraints = BinningConstraints {
        min_bins: 3,
        max_bins: 3,
        min_bin_size: 0.001,
        max_n_prebins: 20,
        ..Default::default()
    };

    let start = std::time::Instant::now();
    let solution = solve_numerical(&values, &target, &binary_totals(&target), &constraints);

    assert_eq!(solution.status, FitStatus::Optimal);
    assert_eq!(solution.splits.len(), 2);
    assert!(solution.splits.iter().all(|&s| s <= 5000.0));
    assert!(start.elapsed().as_secs() < 5);
}

#[test]
fn test_min_bin_size_respected() {
    let (dataset, target) = common::create_synthetic_dataset(400, 11);
    let Some(ColumnValues::Numerical(income)) = dataset.column("income") else {
        panic!("income should be numerical");
    };
    let limits = constraints(8, 0.1);

    let solution = solve_numerical(income, &target, &binary_totals(&target), &limits);
    let values: Vec<f64> = income.iter().flatten().copied().collect();

    assert_eq!(solution.status, FitStatus::Optimal);
    let min_count = limits.min_count(values.len());
    for count in bin_counts(&values, &solution.splits) {
        assert!(count >= min_count, "bin with {} rows < {}", count, min_count);
    }
}

#[test]
fn test_descending_trend_enforced() {
    let (dataset, target) = common::create_synthetic_dataset(600, 3);
    let Some(ColumnValues::Numerical(income)) = dataset.column("income") else {
        panic!("income should be numerical");
    };
    let limits = BinningConstraints {
        monotonic_trend: MonotonicTrend::Descending,
        ..constraints(6, 0.05)
    };

    let solution = solve_numerical(income, &target, &binary_totals(&target), &limits);
    let values: Vec<f64> = income.iter().flatten().copied().collect();

    assert_eq!(solution.monotonic_trend, MonotonicTrend::Descending);
    common::assert_monotonic(&bin_rates(&values, &target, &solution.splits), false);
}

#[test]
fn test_auto_trend_detects_direction() {
    let (dataset, target) = common::create_synthetic_dataset(800, 5);
    let Some(ColumnValues::Numerical(income)) = dataset.column("income") else {
        panic!("income should be numerical");
    };
    let limits = BinningConstraints {
        monotonic_trend: MonotonicTrend::Auto,
        ..constraints(5, 0.05)
    };

    let solution = solve_numerical(income, &target, &binary_totals(&target), &limits);

    assert_eq!(solution.monotonic_trend, MonotonicTrend::Descending);
}

#[test]
fn test_more_bins_never_lose_separation() {
    let (dataset, target) = common::create_synthetic_dataset(300, 21);
    let Some(ColumnValues::Numerical(income)) = dataset.column("income") else {
        panic!("income should be numerical");
    };
    let totals = binary_totals(&target);

    let two = solve_numerical(income, &target, &totals, &constraints(2, 0.05));
    let five = solve_numerical(income, &target, &totals, &constraints(5, 0.05));

    assert!(five.separation + 1e-12 >= two.separation);
    assert!(five.quality_score <= two.quality_score + 1e-12);
}

#[test]
fn test_solver_is_deterministic() {
    let (dataset, target) = common::create_synthetic_dataset(300, 9);
    let Some(ColumnValues::Numerical(income)) = dataset.column("income") else {
        panic!("income should be numerical");
    };
    let totals = binary_totals(&target);
    let limits = constraints(6, 0.05);

    let a = solve_numerical(income, &target, &totals, &limits);
    let b = solve_numerical(income, &target, &totals, &limits);

    assert_eq!(a.splits, b.splits);
    assert_eq!(a.separation.to_bits(), b.separation.to_bits());
}

#[test]
fn test_iteration_budget_reports_exhaustion() {
    let (dataset, target) = common::create_synthetic_dataset(500, 13);
    let Some(ColumnValues::Numerical(income)) = dataset.column("income") else {
        panic!("income should be numerical");
    };
    let limits = BinningConstraints {
        budget: SolverBudget {
            time_limit: None,
            max_iterations: Some(1),
        },
        ..constraints(8, 0.02)
    };

    let solution = solve_numerical(income, &target, &binary_totals(&target), &limits);

    assert!(solution.budget_exhausted);
    assert!(solution.splits.iter().all(|s| s.is_finite()));
}

#[test]
fn test_categorical_partition_covers_every_level() {
    let (dataset, target) = common::create_synthetic_dataset(400, 17);
    let Some(column) = dataset.column("region") else {
        panic!("region missing");
    };
    let levels = column.to_categorical();

    let solution = solve_categorical(&levels, &target, &binary_totals(&target), &constraints(3, 0.05));

    let mut seen: Vec<String> = solution.groups.iter().flatten().cloned().collect();
    seen.sort();
    assert_eq!(seen, vec!["east", "north", "south", "west"]);
    assert!(solution.groups.len() <= 3);
    assert!(solution.groups.iter().all(|g| !g.is_empty()));
}

#[test]
fn test_categorical_two_groups() {
    let levels: Vec<Option<String>> = ["a", "a", "b", "b", "c"]
        .iter()
        .map(|s| Some(s.to_string()))
        .collect();
    let target = [0.0, 0.0, 1.0, 1.0, 1.0];

    let solution = solve_categorical(&levels, &target, &binary_totals(&target), &constraints(2, 0.0));

    assert_eq!(solution.status, FitStatus::Optimal);
    assert_eq!(
        solution.groups,
        vec![vec!["a".to_string()], vec!["b".to_string(), "c".to_string()]]
    );
}
