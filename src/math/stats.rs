//! Descriptive statistics and simple regressions over `f64` slices.

use tracing::warn;

/// Maximum safe price ratio for correlation calculations. Beyond this
/// ratio f64 precision loss may affect results.
const MAX_PRICE_RATIO: f64 = 1e9;

pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Sample standard deviation (n-1 denominator).
pub fn sample_std(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let m = mean(data);
    let var = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (data.len() - 1) as f64;
    var.sqrt()
}

/// Pearson correlation coefficient between two equal-length series.
///
/// Returns a value in [-1.0, 1.0], or None if the calculation would be
/// numerically unreliable (mismatched lengths, fewer than 2 points, or
/// a mean price ratio outside safe f64 bounds).
pub fn correlation(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }

    let mean_a = mean(a);
    let mean_b = mean(b);

    if mean_b != 0.0 {
        let ratio = (mean_a / mean_b).abs();
        if !(1.0 / MAX_PRICE_RATIO..=MAX_PRICE_RATIO).contains(&ratio) {
            warn!(
                ratio = format!("{:.2e}", ratio),
                limit = format!("{:.2e}", MAX_PRICE_RATIO),
                "Price ratio exceeds safe bounds for correlation calculation"
            );
            return None;
        }
    }

    let mut covariance = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;

    for (x, y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        covariance += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a == 0.0 || var_b == 0.0 {
        return Some(0.0);
    }

    let correlation = covariance / (var_a.sqrt() * var_b.sqrt());

    if correlation.is_finite() {
        Some(correlation)
    } else {
        None
    }
}

/// OLS slope through the origin: beta = Σxy / Σx².
///
/// Returns None when x has no variation to regress on.
pub fn ols_through_origin(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.is_empty() {
        return None;
    }

    let sxy: f64 = x.iter().zip(y.iter()).map(|(xi, yi)| xi * yi).sum();
    let sxx: f64 = x.iter().map(|xi| xi * xi).sum();

    if sxx.abs() < f64::EPSILON {
        return None;
    }

    let beta = sxy / sxx;
    beta.is_finite().then_some(beta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_perfect() {
        let a = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let b = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let corr = correlation(&a, &b).unwrap();
        assert!((corr - 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_correlation_negative() {
        let a = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let b = vec![5.0, 4.0, 3.0, 2.0, 1.0];
        let corr = correlation(&a, &b).unwrap();
        assert!((corr + 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_correlation_symmetric() {
        let a = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let b = vec![1.5, 2.5, 2.8, 4.2, 4.9];
        let corr_ab = correlation(&a, &b).unwrap();
        let corr_ba = correlation(&b, &a).unwrap();
        assert!((corr_ab - corr_ba).abs() < 0.0001);
    }

    #[test]
    fn test_correlation_constant_series() {
        let a = vec![2.0, 2.0, 2.0, 2.0];
        let b = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(correlation(&a, &b), Some(0.0));
    }

    #[test]
    fn test_correlation_extreme_ratio_rejected() {
        let a = vec![1e12, 2e12, 3e12];
        let b = vec![1e-3, 2e-3, 3e-3];
        assert!(correlation(&a, &b).is_none());
    }

    #[test]
    fn test_sample_std_constant() {
        let data = vec![3.0, 3.0, 3.0, 3.0];
        assert_eq!(sample_std(&data), 0.0);
    }

    #[test]
    fn test_sample_std_known_value() {
        // std of [2, 4, 4, 4, 5, 5, 7, 9] with n-1 is ~2.138
        let data = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((sample_std(&data) - 2.138).abs() < 0.001);
    }

    #[test]
    fn test_ols_through_origin_exact() {
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let y: Vec<f64> = x.iter().map(|v| 1.5 * v).collect();
        let beta = ols_through_origin(&x, &y).unwrap();
        assert!((beta - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_ols_through_origin_degenerate() {
        let x = vec![0.0, 0.0, 0.0];
        let y = vec![1.0, 2.0, 3.0];
        assert!(ols_through_origin(&x, &y).is_none());
    }
}
