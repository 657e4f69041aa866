//! Augmented Dickey-Fuller test and the Engle-Granger two-step
//! cointegration test built on top of it.
//!
//! The ADF regression (no deterministic terms, suitable for residuals
//! of a cointegrating regression):
//!
//! ```text
//! Δy[t] = γ·y[t-1] + Σ_{i=1..k} b_i·Δy[t-i] + ε[t]
//! ```
//!
//! The lag order k is chosen automatically by minimizing the Akaike
//! information criterion over 0..=maxlag, with the candidate models all
//! fitted on the same trimmed sample so their AICs are comparable. The
//! test statistic is the t-ratio of γ; a strongly negative value rejects
//! the unit root.
//!
//! P-values come from the MacKinnon (1994) response-surface
//! approximation for the residual-based test with two variables and a
//! constant in the cointegrating regression: the statistic is mapped
//! through a fitted polynomial and then the standard normal CDF.

use statrs::distribution::{ContinuousCDF, Normal};
use tracing::debug;

/// Outcome of an ADF unit-root test.
#[derive(Debug, Clone)]
pub struct AdfResult {
    /// t-ratio of the lagged-level coefficient (more negative = more
    /// stationary)
    pub statistic: f64,
    /// Lag order selected by AIC
    pub used_lag: usize,
    /// Observations entering the final regression
    pub nobs: usize,
}

/// Outcome of the Engle-Granger cointegration test.
#[derive(Debug, Clone)]
pub struct EngleGrangerResult {
    /// ADF statistic on the cointegrating-regression residuals
    pub statistic: f64,
    /// MacKinnon asymptotic p-value
    pub p_value: f64,
}

/// Ordinary least squares over an explicit design matrix.
struct OlsFit {
    coefs: Vec<f64>,
    /// Standard error of each coefficient
    std_errs: Vec<f64>,
    ssr: f64,
    nobs: usize,
}

/// Invert a small symmetric positive-definite matrix by Gauss-Jordan
/// elimination with partial pivoting. Returns None if singular.
fn invert(mut m: Vec<Vec<f64>>) -> Option<Vec<Vec<f64>>> {
    let n = m.len();
    let mut inv: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    for col in 0..n {
        // Pivot on the largest remaining entry in this column
        let mut pivot_row = col;
        for row in (col + 1)..n {
            if m[row][col].abs() > m[pivot_row][col].abs() {
                pivot_row = row;
            }
        }
        if m[pivot_row][col].abs() < 1e-12 {
            return None;
        }
        m.swap(col, pivot_row);
        inv.swap(col, pivot_row);

        let pivot = m[col][col];
        for j in 0..n {
            m[col][j] /= pivot;
            inv[col][j] /= pivot;
        }

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = m[row][col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                m[row][j] -= factor * m[col][j];
                inv[row][j] -= factor * inv[col][j];
            }
        }
    }

    Some(inv)
}

/// Fit y = X·b by OLS. `x` is row-major: one inner Vec per observation.
fn ols(y: &[f64], x: &[Vec<f64>]) -> Option<OlsFit> {
    let nobs = y.len();
    if nobs == 0 || x.len() != nobs {
        return None;
    }
    let k = x[0].len();
    if k == 0 || nobs <= k {
        return None;
    }

    // Normal equations: (X'X) b = X'y
    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, &yi) in x.iter().zip(y.iter()) {
        for i in 0..k {
            xty[i] += row[i] * yi;
            for j in i..k {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 0..k {
        for j in 0..i {
            xtx[i][j] = xtx[j][i];
        }
    }

    let xtx_inv = invert(xtx)?;

    let coefs: Vec<f64> = (0..k)
        .map(|i| (0..k).map(|j| xtx_inv[i][j] * xty[j]).sum())
        .collect();

    let mut ssr = 0.0;
    for (row, &yi) in x.iter().zip(y.iter()) {
        let fitted: f64 = row.iter().zip(coefs.iter()).map(|(xi, bi)| xi * bi).sum();
        let resid = yi - fitted;
        ssr += resid * resid;
    }

    let mse = ssr / (nobs - k) as f64;
    let std_errs: Vec<f64> = (0..k).map(|i| (mse * xtx_inv[i][i]).sqrt()).collect();

    if coefs.iter().any(|c| !c.is_finite()) || std_errs.iter().any(|s| !s.is_finite()) {
        return None;
    }

    Some(OlsFit {
        coefs,
        std_errs,
        ssr,
        nobs,
    })
}

/// Akaike information criterion up to an additive constant, matching
/// the Gaussian log-likelihood form used for lag selection.
fn aic(ssr: f64, nobs: usize, nparams: usize) -> f64 {
    let n = nobs as f64;
    n * (ssr / n).ln() + 2.0 * nparams as f64
}

/// Build one ADF regression row set for lag order `k`, using diff
/// indices `start..diff.len()` as the estimation sample.
fn adf_design(
    series: &[f64],
    diff: &[f64],
    k: usize,
    start: usize,
) -> (Vec<f64>, Vec<Vec<f64>>) {
    let mut y = Vec::with_capacity(diff.len() - start);
    let mut x = Vec::with_capacity(diff.len() - start);

    for t in start..diff.len() {
        y.push(diff[t]);
        let mut row = Vec::with_capacity(k + 1);
        // diff[t] = series[t+1] - series[t], so the lagged level is series[t]
        row.push(series[t]);
        for i in 1..=k {
            row.push(diff[t - i]);
        }
        x.push(row);
    }

    (y, x)
}

/// ADF test with automatic lag selection by AIC.
///
/// `max_lag` defaults to the Schwert rule `12·(n/100)^0.25`, capped so
/// the regression keeps enough degrees of freedom. Returns None when
/// the series is too short or the regression is degenerate (e.g. a
/// constant series).
pub fn adf_test(series: &[f64], max_lag: Option<usize>) -> Option<AdfResult> {
    if series.len() < 10 {
        return None;
    }

    let diff: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();
    let n_diff = diff.len();

    let schwert = (12.0 * (n_diff as f64 / 100.0).powf(0.25)).ceil() as usize;
    let mut max_lag = max_lag.unwrap_or(schwert);
    // Keep at least a handful of observations beyond the parameter count
    if max_lag + 5 >= n_diff / 2 {
        max_lag = (n_diff / 2).saturating_sub(5);
    }

    // Lag selection: every candidate fitted on the same trimmed sample
    let mut best: Option<(f64, usize)> = None;
    for k in 0..=max_lag {
        let (y, x) = adf_design(series, &diff, k, max_lag);
        let Some(fit) = ols(&y, &x) else { continue };
        let crit = aic(fit.ssr, fit.nobs, k + 1);
        if best.map_or(true, |(b, _)| crit < b) {
            best = Some((crit, k));
        }
    }
    let (_, used_lag) = best?;

    // Final fit at the chosen lag over the full usable sample
    let (y, x) = adf_design(series, &diff, used_lag, used_lag);
    let fit = ols(&y, &x)?;

    if fit.std_errs[0].abs() < f64::EPSILON {
        return None;
    }
    let statistic = fit.coefs[0] / fit.std_errs[0];
    if !statistic.is_finite() {
        return None;
    }

    debug!(
        stat = format!("{:.3}", statistic),
        lag = used_lag,
        nobs = fit.nobs,
        "ADF regression complete"
    );

    Some(AdfResult {
        statistic,
        used_lag,
        nobs: fit.nobs,
    })
}

// MacKinnon (1994) response-surface coefficients for the residual-based
// test with N=2 variables and a constant in the cointegrating
// regression. Statistics outside [TAU_MIN, TAU_MAX] saturate at p=0/1;
// in between, p = Phi(poly(stat)) with the small-p polynomial used
// below TAU_STAR and the large-p polynomial above it.
const TAU_MAX_C2: f64 = 0.92;
const TAU_MIN_C2: f64 = -18.86;
const TAU_STAR_C2: f64 = -2.62;
const TAU_SMALLP_C2: [f64; 3] = [2.92, 1.5012, 0.039796];
const TAU_LARGEP_C2: [f64; 4] = [2.1945, 0.64695, -0.29198, -0.042377];

/// Map an Engle-Granger residual ADF statistic to its asymptotic
/// p-value.
pub fn mackinnon_p_value(statistic: f64) -> f64 {
    if statistic > TAU_MAX_C2 {
        return 1.0;
    }
    if statistic < TAU_MIN_C2 {
        return 0.0;
    }

    let z = if statistic <= TAU_STAR_C2 {
        TAU_SMALLP_C2
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc * statistic + c)
    } else {
        TAU_LARGEP_C2
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc * statistic + c)
    };

    match Normal::new(0.0, 1.0) {
        Ok(normal) => normal.cdf(z),
        // Unreachable for unit parameters; fail toward "not cointegrated"
        Err(_) => 1.0,
    }
}

/// Engle-Granger two-step cointegration test on two log-price series.
///
/// Step one regresses `log_y` on `log_x` with a constant; step two runs
/// the ADF test (automatic AIC lag) on the residuals. Returns None when
/// the regression is degenerate.
pub fn engle_granger(log_y: &[f64], log_x: &[f64]) -> Option<EngleGrangerResult> {
    if log_y.len() != log_x.len() || log_y.len() < 10 {
        return None;
    }

    let x: Vec<Vec<f64>> = log_x.iter().map(|&v| vec![1.0, v]).collect();
    let fit = ols(log_y, &x)?;
    let (alpha, slope) = (fit.coefs[0], fit.coefs[1]);

    let residuals: Vec<f64> = log_y
        .iter()
        .zip(log_x.iter())
        .map(|(&yi, &xi)| yi - alpha - slope * xi)
        .collect();

    let adf = adf_test(&residuals, None)?;
    let p_value = mackinnon_p_value(adf.statistic);

    Some(EngleGrangerResult {
        statistic: adf.statistic,
        p_value,
    })
}
