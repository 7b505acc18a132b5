//! Population statistics over a single window of readings.

use serde::Serialize;

/// Population mean and standard deviation (divisor `n`).
///
/// Returns `None` for an empty slice. A constant series yields a standard
/// deviation of exactly `0.0`; callers decide how to treat it.
pub fn population_stats(values: &[f64]) -> Option<(f64, f64)> {
    let first = *values.first()?;
    if values.iter().all(|v| *v == first) {
        return Some((first, 0.0));
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / n;

    Some((mean, variance.sqrt()))
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct WindowStats {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

/// Summary of a window; all zeroes when empty.
pub fn summarize(values: &[f64]) -> WindowStats {
    let Some((mean, std_dev)) = population_stats(values) else {
        return WindowStats::default();
    };
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    WindowStats {
        count: values.len(),
        mean,
        std_dev,
        min,
        max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn population_stats_basic() {
        let (mean, std) = population_stats(&[1.0, 3.0]).unwrap();
        assert!((mean - 2.0).abs() < 1e-10);
        assert!((std - 1.0).abs() < 1e-10);
    }

    #[test]
    fn population_stats_empty() {
        assert!(population_stats(&[]).is_none());
    }

    #[test]
    fn constant_series_has_exact_zero_spread() {
        let (mean, std) = population_stats(&[4.2; 10]).unwrap();
        assert_eq!(mean, 4.2);
        assert_eq!(std, 0.0);
    }
}
