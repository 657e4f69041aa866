//! Full scan orchestration.
//!
//! Wires the stages into one pass over a price universe:
//!
//! 1. screen every candidate pair (correlation, volatility, length)
//! 2. batch the survivors and, per pair, run the Engle-Granger test
//!    and the OU half-life gate
//! 3. checkpoint completed batches so an interrupted scan resumes
//! 4. score and rank everything that survived, join display names
//!
//! The report carries the ranked table plus the per-stage diagnostic
//! tables (every screened candidate with its rejection reason, and one
//! row per cointegration/half-life verdict), so collaborators can write
//! audit output without re-running anything. Stage rows and statistics
//! cover the pairs processed in the current run; results restored from
//! a checkpoint contribute to the ranking but not to the per-stage
//! tallies.

use tracing::{debug, info};

use crate::coint::{CointBatchRow, CointStats, CointegrationTester};
use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::ou::{OuBatchRow, OuEstimator, OuStats};
use crate::progress::{ProgressInfo, ProgressManager};
use crate::score::{PairScorer, ScoredPair, ScoringStats};
use crate::screen::{PairScreener, ScreenResult, ScreenStats};
use crate::types::{InfoMap, PairRecord, PriceMap};

/// Outcome of a complete scan.
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// Top-N pairs, best first
    pub ranked: Vec<ScoredPair>,
    /// Candidate pairs before sampling
    pub candidate_pairs: usize,
    /// Pairs that passed the pre-screen
    pub screened_survivors: usize,
    /// One row per screened candidate, rejections and reasons included
    pub screen_diagnostics: Vec<ScreenResult>,
    /// One row per pair put through the cointegration test this run
    pub coint_rows: Vec<CointBatchRow>,
    /// One row per cointegrated pair put through the half-life gate
    /// this run
    pub ou_rows: Vec<OuBatchRow>,
    pub screen_stats: ScreenStats,
    pub coint_stats: CointStats,
    pub ou_stats: OuStats,
    pub scoring_stats: ScoringStats,
    pub progress: ProgressInfo,
}

impl ScanReport {
    /// Plain-text summary for logs or the console.
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        out.push_str("=== Pair Scan Summary ===\n");
        out.push_str(&format!(
            "Candidates: {}  Screened survivors: {} ({:.1}%)\n",
            self.candidate_pairs, self.screened_survivors, self.screen_stats.pass_rate_pct
        ));
        out.push_str(&format!(
            "Cointegrated: {}/{} ({:.1}%)  Half-life gate: {}/{} ({:.1}%)\n",
            self.coint_stats.passed_pairs,
            self.coint_stats.total_pairs,
            self.coint_stats.pass_rate_pct,
            self.ou_stats.passed_pairs,
            self.ou_stats.total_pairs,
            self.ou_stats.pass_rate_pct,
        ));
        out.push_str(&format!("Ranked output: {} pairs\n", self.ranked.len()));

        if !self.ranked.is_empty() {
            out.push_str(&format!(
                "Scores: max {:.1}  median {:.1}  min {:.1}\n",
                self.scoring_stats.max_score,
                self.scoring_stats.median_score,
                self.scoring_stats.min_score
            ));
            out.push_str("\nTop pairs:\n");
            for (rank, row) in self.ranked.iter().take(10).enumerate() {
                out.push_str(&format!(
                    "{:>3}. {}-{}  score {:.1}  p {:.4}  half-life {:.1}d  beta {:.3}\n",
                    rank + 1,
                    row.symbol_a,
                    row.symbol_b,
                    row.score,
                    row.p_value,
                    row.half_life,
                    row.beta
                ));
            }
        }
        out
    }
}

/// The end-to-end pair scanner.
pub struct PairScanner {
    config: ScanConfig,
    screener: PairScreener,
    tester: CointegrationTester,
    estimator: OuEstimator,
    scorer: PairScorer,
}

impl PairScanner {
    /// Build a scanner from a validated configuration.
    ///
    /// # Errors
    /// Returns `ScanError::InvalidConfig` when any threshold is out of
    /// range.
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        config.validate().map_err(ScanError::InvalidConfig)?;
        Ok(Self {
            screener: PairScreener::new(config.screen.clone(), config.sampling.clone()),
            tester: CointegrationTester::new(config.coint.clone()),
            estimator: OuEstimator::new(config.ou.clone()),
            scorer: PairScorer::new(config.scoring.clone()),
            config,
        })
    }

    /// Run the full pipeline over a price universe.
    ///
    /// Resumes from the configured checkpoint when one exists for the
    /// same configuration and universe size.
    ///
    /// # Errors
    /// Returns `ScanError::EmptyUniverse` for fewer than two symbols,
    /// or an I/O error from checkpoint persistence.
    pub fn scan(
        &mut self,
        prices: &PriceMap,
        info: Option<&InfoMap>,
    ) -> Result<ScanReport, ScanError> {
        if prices.len() < 2 {
            return Err(ScanError::EmptyUniverse {
                actual: prices.len(),
            });
        }

        info!(symbols = prices.len(), "Starting pair scan");

        // Stage 1: pre-screen
        let outcome = self.screener.screen_all(prices, info);
        let screen_stats = PairScreener::screening_stats(&outcome.diagnostics);

        // Stages 2-3 run batched behind the checkpoint
        let mut progress =
            ProgressManager::load(self.config.progress.clone(), self.config.fingerprint());
        progress.initialize_task(outcome.survivors.len())?;

        let remaining = progress.get_remaining_pairs(&outcome.survivors);
        if remaining.len() < outcome.survivors.len() {
            info!(
                resumed = outcome.survivors.len() - remaining.len(),
                remaining = remaining.len(),
                "Resuming from checkpoint"
            );
        }

        let batches = progress.create_batches(remaining);
        let mut coint_rows: Vec<CointBatchRow> = Vec::new();
        let mut ou_rows: Vec<OuBatchRow> = Vec::new();

        for (batch_index, batch) in batches.iter().enumerate() {
            info!(
                batch = batch_index + 1,
                batches = batches.len(),
                pairs = batch.len(),
                "Processing batch"
            );

            let mut records = Vec::new();
            for pair in batch {
                let (Some(series_a), Some(series_b)) =
                    (prices.get(pair.first()), prices.get(pair.second()))
                else {
                    continue;
                };

                let coint = self.tester.test_pair(series_a, series_b);
                let (spread_mean, spread_std) = match &coint.spread {
                    Some(s) => (
                        crate::math::stats::mean(&s.values),
                        crate::math::stats::sample_std(&s.values),
                    ),
                    None => (f64::NAN, f64::NAN),
                };
                coint_rows.push(CointBatchRow {
                    pair: pair.clone(),
                    p_value: coint.p_value,
                    beta: coint.beta,
                    passed: coint.passed,
                    spread_mean,
                    spread_std,
                });

                if !coint.passed {
                    continue;
                }
                let Some(spread) = coint.spread else {
                    continue;
                };

                let ou = self.estimator.estimate(&spread.values);
                ou_rows.push(OuBatchRow {
                    pair: pair.clone(),
                    half_life: ou.half_life,
                    phi: ou.phi,
                    passed: ou.passed,
                    optimal: ou.optimal,
                });
                if !ou.passed {
                    continue;
                }

                // Screening diagnostics for the row; the pair came out
                // of the survivor set, so the lookup cannot miss unless
                // sampling state was tampered with
                let (correlation, spread_volatility, data_points) = outcome
                    .diagnostics
                    .iter()
                    .find(|d| d.pair == *pair)
                    .map(|d| (d.correlation, d.spread_volatility, d.data_points))
                    .unwrap_or((f64::NAN, f64::NAN, spread.len()));

                let score = self.scorer.score(coint.p_value, ou.half_life);
                debug!(pair = %pair, score = format!("{:.1}", score), "Pair survived all gates");

                records.push(PairRecord {
                    pair: pair.clone(),
                    p_value: coint.p_value,
                    beta: coint.beta,
                    half_life: ou.half_life,
                    phi: ou.phi,
                    score,
                    correlation,
                    spread_volatility,
                    data_points,
                });
            }

            progress.mark_batch_completed(batch, records)?;
        }

        progress.finalize()?;

        // Stage 4: rank everything, including checkpoint-restored rows
        let ranked = self.scorer.rank(progress.get_all_results(), info);
        let scoring_stats = PairScorer::scoring_stats(&ranked);

        let report = ScanReport {
            candidate_pairs: outcome.candidate_pairs,
            screened_survivors: outcome.survivors.len(),
            screen_stats,
            coint_stats: self.tester.batch_stats(&coint_rows),
            ou_stats: self.estimator.batch_stats(&ou_rows),
            scoring_stats,
            progress: progress.progress_info(),
            screen_diagnostics: outcome.diagnostics,
            coint_rows,
            ou_rows,
            ranked,
        };

        info!(
            ranked = report.ranked.len(),
            candidates = report.candidate_pairs,
            "Pair scan complete"
        );
        Ok(report)
    }
}
