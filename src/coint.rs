//! Engle-Granger cointegration testing.
//!
//! Wraps the ADF machinery in `math::adf` with the pair-level contract
//! the pipeline needs: defensive re-alignment, a fail-fast path for
//! short samples, hedge-ratio (beta) estimation through the origin, and
//! spread construction. Batch mode records one row per pair and never
//! propagates an individual pair's failure.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::CointConfig;
use crate::math::{adf, stats};
use crate::types::{Pair, PriceMap, PriceSeries, SpreadSeries};

/// Minimum aligned observations before the statistical test is even
/// attempted; below this the regression is too ill-conditioned to
/// trust.
const MIN_TEST_POINTS: usize = 20;

/// Result of testing one pair for cointegration.
#[derive(Debug, Clone)]
pub struct CointegrationResult {
    /// Engle-Granger p-value (1.0 on fail-fast paths)
    pub p_value: f64,
    /// Log-price hedge ratio (NaN on fail-fast paths)
    pub beta: f64,
    /// `log(price_b) - beta * log(price_a)`, present only when the
    /// regression ran
    pub spread: Option<SpreadSeries>,
    pub passed: bool,
}

/// One row of a batch cointegration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CointBatchRow {
    pub pair: Pair,
    pub p_value: f64,
    pub beta: f64,
    pub passed: bool,
    /// Mean of the constructed spread (NaN when absent)
    pub spread_mean: f64,
    /// Sample std-dev of the constructed spread (NaN when absent)
    pub spread_std: f64,
}

/// Aggregate batch statistics.
#[derive(Debug, Clone)]
pub struct CointStats {
    pub total_pairs: usize,
    pub passed_pairs: usize,
    pub failed_pairs: usize,
    pub pass_rate_pct: f64,
    pub avg_p_value_passed: f64,
    pub avg_p_value_failed: f64,
    pub min_p_value: f64,
    pub max_p_value: f64,
    pub p_value_threshold: f64,
}

/// Engle-Granger two-step cointegration tester.
#[derive(Debug, Clone)]
pub struct CointegrationTester {
    config: CointConfig,
}

impl CointegrationTester {
    pub fn new(config: CointConfig) -> Self {
        info!(max_p = config.max_p_value, "Cointegration tester ready");
        Self { config }
    }

    /// Test one pair.
    ///
    /// The screener guarantees enough overlap upstream, but the series
    /// are re-aligned here anyway so the tester stands on its own.
    /// Fewer than 20 aligned points fails fast with `p_value = 1.0`,
    /// `beta = NaN` and no spread, skipping the statistical test
    /// entirely.
    pub fn test_pair(&self, a: &PriceSeries, b: &PriceSeries) -> CointegrationResult {
        let aligned = a.align(b);

        let failed = CointegrationResult {
            p_value: 1.0,
            beta: f64::NAN,
            spread: None,
            passed: false,
        };

        if aligned.len() < MIN_TEST_POINTS {
            debug!(points = aligned.len(), "Too few points for cointegration test");
            return failed;
        }

        let log_a: Vec<f64> = aligned.a.iter().map(|p| p.ln()).collect();
        let log_b: Vec<f64> = aligned.b.iter().map(|p| p.ln()).collect();

        let Some(eg) = adf::engle_granger(&log_b, &log_a) else {
            debug!("Degenerate regression, recording as not cointegrated");
            return failed;
        };

        // Hedge ratio through the origin on the same log series
        let Some(beta) = stats::ols_through_origin(&log_a, &log_b) else {
            return failed;
        };

        let values: Vec<f64> = log_b
            .iter()
            .zip(log_a.iter())
            .map(|(&lb, &la)| lb - beta * la)
            .collect();

        let passed = eg.p_value < self.config.max_p_value;
        debug!(
            p_value = format!("{:.4}", eg.p_value),
            beta = format!("{:.4}", beta),
            passed,
            "Cointegration test complete"
        );

        CointegrationResult {
            p_value: eg.p_value,
            beta,
            spread: Some(SpreadSeries {
                dates: aligned.dates,
                values,
            }),
            passed,
        }
    }

    /// Test a list of pairs against a shared price map. Missing series
    /// and degenerate regressions are recorded, never raised.
    pub fn test_batch(&self, pairs: &[Pair], prices: &PriceMap) -> Vec<CointBatchRow> {
        info!(pairs = pairs.len(), "Starting batch cointegration tests");

        let mut rows = Vec::with_capacity(pairs.len());

        for (i, pair) in pairs.iter().enumerate() {
            if (i + 1) % 100 == 0 {
                info!(
                    done = i + 1,
                    total = pairs.len(),
                    pct = format!("{:.1}", (i + 1) as f64 / pairs.len() as f64 * 100.0),
                    "Cointegration progress"
                );
            }

            let (Some(series_a), Some(series_b)) =
                (prices.get(pair.first()), prices.get(pair.second()))
            else {
                warn!(pair = %pair, "Missing price data for pair");
                continue;
            };

            let result = self.test_pair(series_a, series_b);
            let (spread_mean, spread_std) = match &result.spread {
                Some(spread) => (
                    stats::mean(&spread.values),
                    stats::sample_std(&spread.values),
                ),
                None => (f64::NAN, f64::NAN),
            };

            rows.push(CointBatchRow {
                pair: pair.clone(),
                p_value: result.p_value,
                beta: result.beta,
                passed: result.passed,
                spread_mean,
                spread_std,
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
            "Batch cointegration complete"
        );

        rows
    }

    /// Aggregate statistics over a batch result table.
    pub fn batch_stats(&self, rows: &[CointBatchRow]) -> CointStats {
        let passed: Vec<&CointBatchRow> = rows.iter().filter(|r| r.passed).collect();
        let failed: Vec<&CointBatchRow> = rows.iter().filter(|r| !r.passed).collect();

        let avg = |set: &[&CointBatchRow]| -> f64 {
            if set.is_empty() {
                f64::NAN
            } else {
                set.iter().map(|r| r.p_value).sum::<f64>() / set.len() as f64
            }
        };

        CointStats {
            total_pairs: rows.len(),
            passed_pairs: passed.len(),
            failed_pairs: failed.len(),
            pass_rate_pct: if rows.is_empty() {
                0.0
            } else {
                passed.len() as f64 / rows.len() as f64 * 100.0
            },
            avg_p_value_passed: avg(&passed),
            avg_p_value_failed: avg(&failed),
            min_p_value: rows.iter().map(|r| r.p_value).fold(f64::INFINITY, f64::min),
            max_p_value: rows
                .iter()
                .map(|r| r.p_value)
                .fold(f64::NEG_INFINITY, f64::max),
            p_value_threshold: self.config.max_p_value,
        }
    }
}
