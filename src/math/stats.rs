//! Series statistics for per-position aggregation.
//!
//! The sample standard deviation uses the Bessel-corrected (`n - 1`)
//! denominator. For `n <= 1` both the standard deviation and the standard
//! error are defined as exactly 0, never NaN.

use crate::domain::SeriesStats;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n <= 1 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / (n as f64 - 1.0)).sqrt()
}

impl SeriesStats {
    pub fn from_values(values: &[f64]) -> Self {
        let n = values.len();
        let std = sample_std(values);
        let sem = if n <= 1 { 0.0 } else { std / (n as f64).sqrt() };
        SeriesStats {
            mean: mean(values),
            std,
            sem,
            total: values.iter().sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_value_has_zero_spread() {
        let s = SeriesStats::from_values(&[7.0]);
        assert_eq!(s.mean, 7.0);
        assert_eq!(s.std, 0.0);
        assert_eq!(s.sem, 0.0);
        assert_eq!(s.total, 7.0);
    }

    #[test]
    fn empty_series_is_all_zero() {
        let s = SeriesStats::from_values(&[]);
        assert_eq!(s, SeriesStats::default());
    }

    #[test]
    fn bessel_corrected_std() {
        // mean = 5, squared deviations = 9+1+1+9 = 20, var = 20/3
        let s = SeriesStats::from_values(&[2.0, 4.0, 6.0, 8.0]);
        assert!((s.mean - 5.0).abs() < 1e-12);
        assert!((s.std - (20.0_f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((s.sem - s.std / 2.0).abs() < 1e-12);
        assert!((s.total - 20.0).abs() < 1e-12);
    }
}
