//! Prebinning of sorted values into a bounded number of groups

use crate::pipeline::stats::SegmentStats;

/// A contiguous run of sorted unique values and their target sums
#[derive(Debug, Clone, PartialEq)]
pub struct Prebin {
    /// Smallest value in the group
    pub first: f64,
    /// Largest value in the group
    pub last: f64,
    pub stats: SegmentStats,
}

/// Group (value, target) pairs by equal value.
///
/// `pairs` must not contain NaN values; it is sorted in place.
pub fn unique_value_groups(pairs: &mut [(f64, f64)]) -> Vec<Prebin> {
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut groups: Vec<Prebin> = Vec::new();
    for &(value, target) in pairs.iter() {
        match groups.last_mut() {
            Some(group) if group.last == value => group.stats.push(target),
            _ => {
                let mut stats = SegmentStats::default();
                stats.push(target);
                groups.push(Prebin {
                    first: value,
                    last: value,
                    stats,
                });
            }
        }
    }
    groups
}

/// Inclusive index ranges merging consecutive groups into at most
/// `max_groups` equal-frequency buckets.
///
/// Bucket `b` closes as soon as the running row count reaches
/// `(b + 1) * total / max_groups`, so a group is never split across
/// buckets and heavy groups simply produce fewer buckets.
pub fn equal_frequency_ranges(counts: &[usize], max_groups: usize) -> Vec<(usize, usize)> {
    if counts.len() <= max_groups || max_groups == 0 {
        return (0..counts.len()).map(|i| (i, i)).collect();
    }

    let total: usize = counts.iter().sum();
    let mut ranges: Vec<(usize, usize)> = Vec::with_capacity(max_groups);
    let mut start = 0;
    let mut cumulative = 0usize;

    for (i, &count) in counts.iter().enumerate() {
        cumulative += count;
        let threshold = (ranges.len() + 1) as f64 * total as f64 / max_groups as f64;
        if cumulative as f64 >= threshold - 1e-9 {
            ranges.push((start, i));
            start = i + 1;
        }
    }

    if start < counts.len() {
        ranges.push((start, counts.len() - 1));
    }

    ranges
}

/// Inclusive index ranges holding between `min_groups` and `max_groups`
/// buckets whenever there are at least `min_groups` groups.
///
/// Equal frequency is tried first. When a heavy group leaves too few
/// buckets, the groups are split by rank into `max_groups` runs of equal
/// group count instead, so the bucket count stays bounded.
pub fn bounded_ranges(
    counts: &[usize],
    max_groups: usize,
    min_groups: usize,
) -> Vec<(usize, usize)> {
    let ranges = equal_frequency_ranges(counts, max_groups);
    if ranges.len() >= min_groups || max_groups == 0 {
        return ranges;
    }
    equal_rank_ranges(counts.len(), max_groups)
}

fn equal_rank_ranges(n: usize, max_groups: usize) -> Vec<(usize, usize)> {
    if n <= max_groups {
        return (0..n).map(|i| (i, i)).collect();
    }
    (0..max_groups)
        .map(|b| (b * n / max_groups, (b + 1) * n / max_groups - 1))
        .collect()
}

/// Merge consecutive value groups into at most `max_groups` buckets,
/// keeping at least `min_groups` when the data allows
pub fn prebin_buckets(groups: &[Prebin], max_groups: usize, min_groups: usize) -> Vec<Prebin> {
    let counts: Vec<usize> = groups.iter().map(|g| g.stats.count).collect();
    bounded_ranges(&counts, max_groups, min_groups)
        .into_iter()
        .map(|(start, end)| Prebin {
            first: groups[start].first,
            last: groups[end].last,
            stats: groups[start..=end]
                .iter()
                .fold(SegmentStats::default(), |acc, g| acc.merge(&g.stats)),
        })
        .collect()
}

/// Finite value placed between two adjacent groups.
///
/// The midpoint of `left_last` and `right_first` when it is finite and lands
/// in `(left_last, right_first]`. Infinite neighbours fall back to the
/// nearest finite value above `left_last`, so `-inf` stays left and `+inf`
/// stays right of the split.
pub fn split_between(left_last: f64, right_first: f64) -> f64 {
    let mid = left_last + (right_first - left_last) / 2.0;
    if mid.is_finite() && mid > left_last && mid <= right_first {
        return mid;
    }
    if right_first.is_finite() {
        return right_first;
    }
    if left_last.is_finite() {
        // +inf on the right
        let above = next_up(left_last);
        return if above.is_finite() { above } else { f64::MAX };
    }
    // -inf on the left and +inf on the right
    0.0
}

fn next_up(value: f64) -> f64 {
    if value.is_nan() || value == f64::INFINITY {
        return value;
    }
    if value == 0.0 {
        return f64::from_bits(1);
    }
    let bits = value.to_bits();
    if value > 0.0 {
        f64::from_bits(bits + 1)
    } else {
        f64::from_bits(bits - 1)
    }
}
