//! Descriptive statistics over score and time samples.
//!
//! All functions treat an empty sample as zero rather than NaN so metric
//! structs built from an empty population stay serializable.
//! Variance and standard deviation are population statistics.

use std::collections::BTreeMap;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

pub fn min(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::min).unwrap_or(0.0)
}

pub fn max(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::max).unwrap_or(0.0)
}

/// Copy of the sample in ascending order.
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

pub fn median(values: &[f64]) -> f64 {
    percentile(values, 50.0)
}

/// Percentile `p` (0..=100) with linear interpolation between the two
/// nearest ranks.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    percentile_of_sorted(&sorted(values), p)
}

/// Same as [`percentile`] for a sample that is already sorted ascending.
pub fn percentile_of_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// Percentile table keyed by the requested points.
pub fn percentile_table(values: &[f64], points: &[u32]) -> BTreeMap<u32, f64> {
    let sorted = sorted(values);
    points
        .iter()
        .map(|&p| (p, percentile_of_sorted(&sorted, f64::from(p))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_empty_sample_is_zero() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(std_dev(&[]), 0.0);
        assert_eq!(median(&[]), 0.0);
        assert_eq!(min(&[]), 0.0);
        assert_eq!(max(&[]), 0.0);
    }

    #[test]
    fn test_population_std() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!(approx(mean(&values), 5.0));
        assert!(approx(variance(&values), 4.0));
        assert!(approx(std_dev(&values), 2.0));
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert!(approx(percentile(&values, 0.0), 1.0));
        assert!(approx(percentile(&values, 100.0), 4.0));
        assert!(approx(percentile(&values, 50.0), 2.5));
        assert!(approx(percentile(&values, 10.0), 1.3));
        assert!(approx(median(&[5.0, 1.0, 3.0]), 3.0));
    }

    #[test]
    fn test_single_value_percentiles() {
        let table = percentile_table(&[0.7], &[5, 50, 95]);
        assert_eq!(table.len(), 3);
        assert!(table.values().all(|v| approx(*v, 0.7)));
    }
}
