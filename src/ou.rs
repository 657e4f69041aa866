//! Ornstein-Uhlenbeck half-life estimation.
//!
//! The spread from the cointegration stage is centered, denoised with
//! the scalar Kalman filter, then fitted with an AR(1) by OLS:
//!
//! ```text
//! z[t] = phi * z[t-1] + noise
//! half_life = -ln(2) / ln(phi),  valid only for 0 < phi < 1
//! ```
//!
//! Filtering first is deliberate: a raw OLS fit on the unfiltered
//! spread is noticeably more sensitive to transient spikes. Outside
//! (0, 1) the spread is a random walk or oscillates without decay, so
//! the half-life is reported as infinite and the pair fails the gate.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::OuConfig;
use crate::math::kalman::ScalarKalman;
use crate::math::stats;
use crate::types::{Pair, SpreadSeries};

/// Minimum spread observations for a meaningful AR(1) fit.
const MIN_OBSERVATIONS: usize = 10;

/// Result of estimating one spread's mean-reversion speed.
#[derive(Debug, Clone)]
pub struct OuResult {
    /// Half-life in trading days; infinite when non-mean-reverting
    pub half_life: f64,
    /// AR(1) coefficient (NaN when the fit is degenerate)
    pub phi: f64,
    pub passed: bool,
    /// True when the half-life also falls in the configured optimal
    /// window; a desirability signal, not a gate
    pub optimal: bool,
}

/// One row of a batch half-life run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OuBatchRow {
    pub pair: Pair,
    pub half_life: f64,
    pub phi: f64,
    pub passed: bool,
    pub optimal: bool,
}

/// Aggregate batch statistics.
#[derive(Debug, Clone)]
pub struct OuStats {
    pub total_pairs: usize,
    pub passed_pairs: usize,
    pub failed_pairs: usize,
    pub pass_rate_pct: f64,
    pub avg_half_life_passed: f64,
    pub min_half_life_passed: f64,
    pub max_half_life_passed: f64,
    pub optimal_pairs: usize,
}

/// OU half-life estimator.
#[derive(Debug, Clone)]
pub struct OuEstimator {
    config: OuConfig,
}

impl OuEstimator {
    pub fn new(config: OuConfig) -> Self {
        info!(
            min_hl = config.min_half_life,
            max_hl = config.max_half_life,
            "OU estimator ready"
        );
        Self { config }
    }

    /// Estimate the half-life of one spread series.
    pub fn estimate(&self, spread: &[f64]) -> OuResult {
        if spread.len() < MIN_OBSERVATIONS {
            debug!(points = spread.len(), "Too few observations for OU fit");
            return self.build_result(f64::INFINITY, f64::NAN);
        }

        let mean = stats::mean(spread);
        let centered: Vec<f64> = spread.iter().map(|v| v - mean).collect();

        let filtered = ScalarKalman::filter_series(
            &centered,
            self.config.kf_process_variance,
            self.config.kf_observation_variance,
        );

        // AR(1) by OLS through the origin on the filtered series
        let z_lag = &filtered[..filtered.len() - 1];
        let z_cur = &filtered[1..];
        let Some(phi) = stats::ols_through_origin(z_lag, z_cur) else {
            debug!("Degenerate AR(1) regression on filtered spread");
            return self.build_result(f64::INFINITY, f64::NAN);
        };

        if phi <= 0.0 || phi.abs() >= 1.0 {
            // Random walk (phi >= 1) or oscillation without decay
            return self.build_result(f64::INFINITY, phi);
        }

        let half_life = -std::f64::consts::LN_2 / phi.ln();
        debug!(
            half_life = format!("{:.2}", half_life),
            phi = format!("{:.4}", phi),
            "Half-life estimated"
        );

        self.build_result(half_life, phi)
    }

    /// Gate check: finite and inside the configured [min, max] window.
    pub fn half_life_passes(&self, half_life: f64) -> bool {
        half_life.is_finite()
            && half_life >= self.config.min_half_life
            && half_life <= self.config.max_half_life
    }

    fn build_result(&self, half_life: f64, phi: f64) -> OuResult {
        let passed = self.half_life_passes(half_life);
        let optimal = passed
            && half_life >= self.config.optimal_half_life_min
            && half_life <= self.config.optimal_half_life_max;
        OuResult {
            half_life,
            phi,
            passed,
            optimal,
        }
    }

    /// Estimate half-lives for a list of (pair, spread) entries.
    /// Mirrors the cointegration batch contract: one row per input,
    /// failures recorded rather than propagated.
    pub fn estimate_batch(&self, spreads: &[(Pair, Option<SpreadSeries>)]) -> Vec<OuBatchRow> {
        info!(pairs = spreads.len(), "Starting batch half-life estimation");

        let mut rows = Vec::with_capacity(spreads.len());

        for (i, (pair, spread)) in spreads.iter().enumerate() {
            if (i + 1) % 100 == 0 {
                info!(
                    done = i + 1,
                    total = spreads.len(),
                    pct = format!("{:.1}", (i + 1) as f64 / spreads.len() as f64 * 100.0),
                    "Half-life progress"
                );
            }

            let Some(spread) = spread else {
                warn!(pair = %pair, "Missing spread series for pair");
                continue;
            };

            let result = self.estimate(&spread.values);
            rows.push(OuBatchRow {
                pair: pair.clone(),
                half_life: result.half_life,
                phi: result.phi,
                passed: result.passed,
                optimal: result.optimal,
            });
        }

        let passed = rows.iter().filter(|r| r.passed).count();
        let pass_rate = if rows.is_empty() {
            0.0
        } else {
            passed as f64 / rows.len() as f64 * 100.0
        };
        info!(
            total = rows.len(),
            passed,
            pass_rate = format!("{:.2}", pass_rate),
            "Batch half-life estimation complete"
        );

        rows
    }

    /// Aggregate statistics over a batch result table.
    pub fn batch_stats(&self, rows: &[OuBatchRow]) -> OuStats {
        let passed: Vec<&OuBatchRow> = rows.iter().filter(|r| r.passed).collect();

        let (avg, min, max) = if passed.is_empty() {
            (f64::NAN, f64::NAN, f64::NAN)
        } else {
            let sum: f64 = passed.iter().map(|r| r.half_life).sum();
            (
                sum / passed.len() as f64,
                passed.iter().map(|r| r.half_life).fold(f64::INFINITY, f64::min),
                passed
                    .iter()
                    .map(|r| r.half_life)
                    .fold(f64::NEG_INFINITY, f64::max),
            )
        };

        OuStats {
            total_pairs: rows.len(),
            passed_pairs: passed.len(),
            failed_pairs: rows.len() - passed.len(),
            pass_rate_pct: if rows.is_empty() {
                0.0
            } else {
                passed.len() as f64 / rows.len() as f64 * 100.0
            },
            avg_half_life_passed: avg,
            min_half_life_passed: min,
            max_half_life_passed: max,
            optimal_pairs: rows.iter().filter(|r| r.optimal).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn ar1_series(phi: f64, n: usize, noise: f64, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut series = vec![0.0f64; n];
        for t in 1..n {
            series[t] = phi * series[t - 1] + rng.gen_range(-noise..noise);
        }
        series
    }

    fn estimator() -> OuEstimator {
        OuEstimator::new(OuConfig::default())
    }

    #[test]
    fn test_recovers_known_half_life() {
        // phi = 0.95 -> half-life ~13.5 days. The Kalman filter biases
        // phi upward slightly, so allow a generous band around truth.
        let true_phi = 0.95f64;
        let expected = -std::f64::consts::LN_2 / true_phi.ln();

        let spread = ar1_series(true_phi, 500, 0.5, 21);
        let result = estimator().estimate(&spread);

        assert!(result.passed);
        assert!(
            result.half_life > expected * 0.5 && result.half_life < expected * 3.0,
            "expected ~{:.1}, got {:.1}",
            expected,
            result.half_life
        );
    }

    #[test]
    fn test_random_walk_is_infinite() {
        let mut rng = StdRng::seed_from_u64(33);
        let mut level = 0.0;
        let spread: Vec<f64> = (0..300)
            .map(|_| {
                level += rng.gen_range(-1.0..1.0f64);
                level
            })
            .collect();

        let result = estimator().estimate(&spread);
        // phi hugs 1 from either side; half-life must not be a small
        // finite value
        if result.half_life.is_finite() {
            assert!(result.half_life > 50.0, "got {}", result.half_life);
        } else {
            assert!(!result.passed);
        }
    }

    #[test]
    fn test_oscillating_series_fails() {
        // Alternating sign with decay: phi is negative
        let spread: Vec<f64> = (0..100)
            .map(|i| if i % 2 == 0 { 1.0 } else { -1.0 } * 0.99f64.powi(i))
            .collect();
        let result = estimator().estimate(&spread);
        assert!(result.half_life.is_infinite());
        assert!(!result.passed);
    }

    #[test]
    fn test_too_few_observations() {
        let spread = vec![0.1, -0.2, 0.3];
        let result = estimator().estimate(&spread);
        assert!(result.half_life.is_infinite());
        assert!(result.phi.is_nan());
        assert!(!result.passed);
    }

    #[test]
    fn test_half_life_gate_window() {
        let est = OuEstimator::new(OuConfig {
            min_half_life: 5.0,
            max_half_life: 50.0,
            ..Default::default()
        });
        assert!(est.half_life_passes(20.0));
        assert!(!est.half_life_passes(2.0));
        assert!(!est.half_life_passes(80.0));
        assert!(!est.half_life_passes(f64::INFINITY));
        assert!(!est.half_life_passes(f64::NAN));
    }

    #[test]
    fn test_optimal_window_flag() {
        let spread = ar1_series(0.95, 600, 0.3, 5);

        // Window wide open: any passing estimate is optimal
        let wide = OuEstimator::new(OuConfig {
            optimal_half_life_min: 0.0,
            optimal_half_life_max: 1e9,
            ..Default::default()
        });
        let result = wide.estimate(&spread);
        assert!(result.passed);
        assert!(result.optimal);

        // Window out of reach: same estimate is no longer optimal
        let narrow = OuEstimator::new(OuConfig {
            optimal_half_life_min: 1e8,
            optimal_half_life_max: 1e9,
            ..Default::default()
        });
        let result = narrow.estimate(&spread);
        assert!(result.passed);
        assert!(!result.optimal);
    }

    #[test]
    fn test_batch_contract() {
        let est = estimator();
        let spread = SpreadSeries {
            dates: Vec::new(),
            values: ar1_series(0.9, 300, 0.5, 77),
        };
        let inputs = vec![
            (Pair::new("A", "B"), Some(spread)),
            (Pair::new("C", "D"), None),
            (
                Pair::new("E", "F"),
                Some(SpreadSeries {
                    dates: Vec::new(),
                    values: vec![0.1, 0.2],
                }),
            ),
        ];

        let rows = est.estimate_batch(&inputs);
        // Missing spread skipped, short spread recorded as failed
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().any(|r| r.passed));
        assert!(rows.iter().any(|r| !r.passed && r.half_life.is_infinite()));

        let stats = est.batch_stats(&rows);
        assert_eq!(stats.total_pairs, 2);
        assert_eq!(stats.passed_pairs, 1);
    }
}
