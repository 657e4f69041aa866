//! Pair pre-screening.
//!
//! Cheap statistical filters (aligned length, Pearson correlation,
//! annualized log-spread volatility) discard the bulk of the O(N²)
//! candidate pairs before the expensive cointegration stage. Every
//! candidate gets a diagnostics row, including the ones that fail, so
//! rejections stay auditable.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::{SamplingConfig, ScreenConfig, ANNUALIZATION_DAYS};
use crate::math::stats;
use crate::types::{InfoMap, Pair, PriceMap, PriceSeries};

/// Per-pair screening diagnostics row. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenResult {
    pub pair: Pair,
    /// Pearson correlation of raw prices (NaN when not reached)
    pub correlation: f64,
    /// Annualized log-spread volatility (NaN when not reached)
    pub spread_volatility: f64,
    /// Aligned observation count
    pub data_points: usize,
    pub passed: bool,
    /// Human-readable rejection reason; empty when passed
    pub fail_reason: String,
    /// Display name of the first instrument, joined from the metadata
    /// map for passing rows; empty otherwise
    pub name_a: String,
    /// Display name of the second instrument
    pub name_b: String,
    /// Average daily traded value of the first instrument, if known
    pub avg_amount_a: Option<f64>,
    /// Average daily traded value of the second instrument, if known
    pub avg_amount_b: Option<f64>,
}

/// Output of a full screening sweep.
#[derive(Debug, Clone)]
pub struct ScreenOutcome {
    /// Size of the full candidate set before sampling
    pub candidate_pairs: usize,
    /// Pairs actually screened (differs from `candidate_pairs` only in
    /// sampling mode)
    pub screened_pairs: usize,
    /// Pairs that passed all three gates
    pub survivors: Vec<Pair>,
    /// One row per screened pair, failures included
    pub diagnostics: Vec<ScreenResult>,
}

/// Aggregate screening statistics.
#[derive(Debug, Clone)]
pub struct ScreenStats {
    pub total_pairs: usize,
    pub passed_pairs: usize,
    pub failed_pairs: usize,
    pub pass_rate_pct: f64,
    pub avg_correlation: f64,
    pub avg_spread_volatility: f64,
    pub avg_data_points: f64,
    /// Rejection-reason histogram
    pub fail_reasons: HashMap<String, usize>,
}

/// Bounded memo of screening results, keyed by pair.
///
/// Replaces the unbounded memoization of the batch driver: once full,
/// new entries are simply not retained, and `clear` gives callers an
/// explicit invalidation point between runs on different data.
#[derive(Debug)]
pub struct ScreenCache {
    entries: HashMap<Pair, ScreenResult>,
    capacity: usize,
}

impl ScreenCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
        }
    }

    pub fn get(&self, pair: &Pair) -> Option<&ScreenResult> {
        self.entries.get(pair)
    }

    pub fn insert(&mut self, result: ScreenResult) {
        if self.entries.len() < self.capacity || self.entries.contains_key(&result.pair) {
            self.entries.insert(result.pair.clone(), result);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Screening results retained across runs before new entries stop
/// being cached.
const SCREEN_CACHE_CAPACITY: usize = 100_000;

/// Pair pre-screener.
#[derive(Debug)]
pub struct PairScreener {
    config: ScreenConfig,
    sampling: SamplingConfig,
    cache: ScreenCache,
}

impl PairScreener {
    pub fn new(config: ScreenConfig, sampling: SamplingConfig) -> Self {
        info!(
            min_corr = config.min_correlation,
            max_vol = config.max_spread_volatility,
            min_points = config.min_data_points,
            "Pair screener ready"
        );
        Self {
            config,
            sampling,
            cache: ScreenCache::new(SCREEN_CACHE_CAPACITY),
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Drop all memoized screening results. Call between runs over
    /// different price data.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Screen one pair. Gates are applied in cost order: aligned
    /// length, then correlation, then spread volatility. A passing row
    /// satisfies all three simultaneously.
    pub fn screen_pair(&self, pair: Pair, a: &PriceSeries, b: &PriceSeries) -> ScreenResult {
        let aligned = a.align(b);

        let mut result = ScreenResult {
            pair,
            correlation: f64::NAN,
            spread_volatility: f64::NAN,
            data_points: aligned.len(),
            passed: false,
            fail_reason: String::new(),
            name_a: String::new(),
            name_b: String::new(),
            avg_amount_a: None,
            avg_amount_b: None,
        };

        if aligned.len() < self.config.min_data_points {
            result.fail_reason = format!(
                "insufficient data ({} < {})",
                aligned.len(),
                self.config.min_data_points
            );
            return result;
        }

        match stats::correlation(&aligned.a, &aligned.b) {
            Some(corr) => result.correlation = corr,
            None => {
                result.fail_reason = "correlation undefined for this pair".to_string();
                return result;
            }
        }

        if result.correlation < self.config.min_correlation {
            result.fail_reason = format!(
                "correlation too low ({:.3} < {})",
                result.correlation, self.config.min_correlation
            );
            return result;
        }

        let log_spread: Vec<f64> = aligned
            .a
            .iter()
            .zip(aligned.b.iter())
            .map(|(&pa, &pb)| pa.ln() - pb.ln())
            .collect();
        result.spread_volatility = stats::sample_std(&log_spread) * ANNUALIZATION_DAYS.sqrt();

        if result.spread_volatility > self.config.max_spread_volatility {
            result.fail_reason = format!(
                "spread volatility too high ({:.3} > {})",
                result.spread_volatility, self.config.max_spread_volatility
            );
            return result;
        }

        result.passed = true;
        result
    }

    /// Enumerate, optionally sample, and screen every candidate pair.
    ///
    /// Sampling draws a fixed-seed random subset for fast development
    /// iteration; a ratio of 1.0 processes the full candidate set.
    /// Results are memoized in the bounded cache, so rescreening the
    /// same pair across runs reuses the stored row. Passing rows are
    /// annotated with names and traded values from the metadata map.
    pub fn screen_all(&mut self, prices: &PriceMap, info: Option<&InfoMap>) -> ScreenOutcome {
        let mut codes: Vec<&String> = prices.keys().collect();
        // Stable candidate enumeration regardless of map iteration order
        codes.sort();

        let mut all_pairs = Vec::new();
        for i in 0..codes.len() {
            for j in (i + 1)..codes.len() {
                all_pairs.push(Pair::new(codes[i].clone(), codes[j].clone()));
            }
        }
        let candidate_pairs = all_pairs.len();

        let selected: Vec<Pair> = if self.sampling.ratio < 1.0 && candidate_pairs > 0 {
            let sample_size = ((candidate_pairs as f64 * self.sampling.ratio) as usize)
                .clamp(1, candidate_pairs);
            let mut rng = StdRng::seed_from_u64(self.sampling.seed);
            let mut picked: Vec<Pair> = index::sample(&mut rng, candidate_pairs, sample_size)
                .into_iter()
                .map(|idx| all_pairs[idx].clone())
                .collect();
            picked.sort();
            info!(
                candidates = candidate_pairs,
                sampled = picked.len(),
                seed = self.sampling.seed,
                "Sampling mode: screening a deterministic subset"
            );
            picked
        } else {
            all_pairs
        };

        info!(
            symbols = codes.len(),
            pairs = selected.len(),
            "Screening candidate pairs"
        );

        let mut survivors = Vec::new();
        let mut diagnostics = Vec::with_capacity(selected.len());
        let progress_step = (selected.len() / 10).max(1);

        for (i, pair) in selected.iter().enumerate() {
            if (i + 1) % progress_step == 0 || i + 1 == selected.len() {
                info!(
                    done = i + 1,
                    total = selected.len(),
                    pct = format!("{:.1}", (i + 1) as f64 / selected.len() as f64 * 100.0),
                    "Screening progress"
                );
            }

            // Both codes came from the map's own key set
            let (Some(series_a), Some(series_b)) =
                (prices.get(pair.first()), prices.get(pair.second()))
            else {
                continue;
            };

            let mut row = match self.cache.get(pair) {
                Some(hit) => hit.clone(),
                None => {
                    let computed = self.screen_pair(pair.clone(), series_a, series_b);
                    self.cache.insert(computed.clone());
                    computed
                }
            };

            if row.passed {
                if let Some(info) = info {
                    if let Some(meta) = info.get(pair.first()) {
                        row.name_a = meta.name.clone();
                        row.avg_amount_a = meta.avg_amount;
                    }
                    if let Some(meta) = info.get(pair.second()) {
                        row.name_b = meta.name.clone();
                        row.avg_amount_b = meta.avg_amount;
                    }
                }
                survivors.push(pair.clone());
            } else {
                debug!(pair = %pair, reason = %row.fail_reason, "Pair rejected");
            }
            diagnostics.push(row);
        }

        let screened_pairs = diagnostics.len();
        let pass_rate = if screened_pairs > 0 {
            survivors.len() as f64 / screened_pairs as f64 * 100.0
        } else {
            0.0
        };
        info!(
            screened = screened_pairs,
            passed = survivors.len(),
            pass_rate = format!("{:.2}", pass_rate),
            "Screening complete"
        );

        ScreenOutcome {
            candidate_pairs,
            screened_pairs,
            survivors,
            diagnostics,
        }
    }

    /// Aggregate statistics over a diagnostics table.
    pub fn screening_stats(diagnostics: &[ScreenResult]) -> ScreenStats {
        let passed: Vec<&ScreenResult> = diagnostics.iter().filter(|r| r.passed).collect();
        let failed_count = diagnostics.len() - passed.len();

        let avg = |f: fn(&ScreenResult) -> f64| -> f64 {
            if passed.is_empty() {
                f64::NAN
            } else {
                passed.iter().map(|r| f(r)).sum::<f64>() / passed.len() as f64
            }
        };

        let mut fail_reasons: HashMap<String, usize> = HashMap::new();
        for row in diagnostics.iter().filter(|r| !r.passed) {
            // Group by the reason prefix, not the per-pair numbers
            let key = row
                .fail_reason
                .split('(')
                .next()
                .unwrap_or(&row.fail_reason)
                .trim()
                .to_string();
            *fail_reasons.entry(key).or_insert(0) += 1;
        }

        ScreenStats {
            total_pairs: diagnostics.len(),
            passed_pairs: passed.len(),
            failed_pairs: failed_count,
            pass_rate_pct: if diagnostics.is_empty() {
                0.0
            } else {
                passed.len() as f64 / diagnostics.len() as f64 * 100.0
            },
            avg_correlation: avg(|r| r.correlation),
            avg_spread_volatility: avg(|r| r.spread_volatility),
            avg_data_points: avg(|r| r.data_points as f64),
            fail_reasons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn series(prices: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let points = prices
            .iter()
            .enumerate()
            .map(|(i, &p)| (start + chrono::Duration::days(i as i64), p))
            .collect();
        PriceSeries::new(points).unwrap()
    }

    fn screener(min_points: usize) -> PairScreener {
        PairScreener::new(
            ScreenConfig {
                min_correlation: 0.85,
                max_spread_volatility: 0.25,
                min_data_points: min_points,
            },
            SamplingConfig::default(),
        )
    }

    #[test]
    fn test_self_pair_trivially_passes() {
        // Screening a series against itself: correlation 1, volatility 0
        let prices: Vec<f64> = (0..50).map(|i| 100.0 + (i as f64).sin() * 5.0).collect();
        let s = series(&prices);
        let result = screener(10).screen_pair(Pair::new("A", "B"), &s, &s);
        assert!(result.passed, "reason: {}", result.fail_reason);
        assert!((result.correlation - 1.0).abs() < 1e-12);
        assert_eq!(result.spread_volatility, 0.0);
    }

    #[test]
    fn test_insufficient_data_fails_first() {
        let s = series(&[100.0, 101.0, 102.0]);
        let result = screener(10).screen_pair(Pair::new("A", "B"), &s, &s);
        assert!(!result.passed);
        assert!(result.fail_reason.contains("insufficient data"));
        assert!(result.correlation.is_nan());
    }

    #[test]
    fn test_low_correlation_fails() {
        let up: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let down: Vec<f64> = (0..60).map(|i| 160.0 - i as f64).collect();
        let result = screener(10).screen_pair(Pair::new("A", "B"), &series(&up), &series(&down));
        assert!(!result.passed);
        assert!(result.fail_reason.contains("correlation too low"));
    }

    #[test]
    fn test_high_volatility_fails() {
        // Perfectly correlated trends, but with one series swinging an
        // extra multiplicative factor so the log-spread is wild.
        let a: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let b: Vec<f64> = (0..60)
            .map(|i| (100.0 + i as f64) * if i % 2 == 0 { 2.0 } else { 0.5 })
            .collect();
        let corr = stats::correlation(&a, &b).unwrap();
        // Construction sanity: keep correlation above the gate
        if corr >= 0.85 {
            let result =
                screener(10).screen_pair(Pair::new("A", "B"), &series(&a), &series(&b));
            assert!(!result.passed);
            assert!(result.fail_reason.contains("spread volatility too high"));
        }
    }

    #[test]
    fn test_screen_all_reports_every_candidate() {
        let mut prices = PriceMap::new();
        let base: Vec<f64> = (0..40).map(|i| 100.0 + i as f64 * 0.5).collect();
        for code in ["AAA", "BBB", "CCC"] {
            prices.insert(code.to_string(), series(&base));
        }

        let outcome = screener(10).screen_all(&prices, None);
        assert_eq!(outcome.candidate_pairs, 3);
        assert_eq!(outcome.diagnostics.len(), 3);
        assert_eq!(outcome.survivors.len(), 3);
    }

    #[test]
    fn test_sampling_is_deterministic() {
        let mut prices = PriceMap::new();
        let base: Vec<f64> = (0..40).map(|i| 100.0 + i as f64 * 0.5).collect();
        for i in 0..8 {
            prices.insert(format!("S{:02}", i), series(&base));
        }

        let make = || {
            PairScreener::new(
                ScreenConfig {
                    min_data_points: 10,
                    ..Default::default()
                },
                SamplingConfig {
                    ratio: 0.5,
                    seed: 42,
                },
            )
            .screen_all(&prices, None)
        };

        let first = make();
        let second = make();
        assert_eq!(first.candidate_pairs, 28);
        assert_eq!(first.screened_pairs, 14);
        let pairs_a: Vec<String> = first.diagnostics.iter().map(|r| r.pair.to_string()).collect();
        let pairs_b: Vec<String> = second.diagnostics.iter().map(|r| r.pair.to_string()).collect();
        assert_eq!(pairs_a, pairs_b);
    }

    #[test]
    fn test_screening_stats_histogram() {
        let short = series(&[100.0, 101.0]);
        let long = series(&(0..40).map(|i| 100.0 + i as f64).collect::<Vec<_>>());
        let sc = screener(10);
        let rows = vec![
            sc.screen_pair(Pair::new("A", "B"), &short, &short),
            sc.screen_pair(Pair::new("C", "D"), &long, &long),
        ];

        let stats = PairScreener::screening_stats(&rows);
        assert_eq!(stats.total_pairs, 2);
        assert_eq!(stats.passed_pairs, 1);
        assert_eq!(stats.fail_reasons.get("insufficient data"), Some(&1));
    }

    #[test]
    fn test_screen_all_memoizes_results() {
        let mut prices = PriceMap::new();
        let base: Vec<f64> = (0..40).map(|i| 100.0 + i as f64 * 0.5).collect();
        for code in ["AAA", "BBB", "CCC"] {
            prices.insert(code.to_string(), series(&base));
        }

        let mut sc = screener(10);
        assert_eq!(sc.cache_len(), 0);

        let first = sc.screen_all(&prices, None);
        assert_eq!(sc.cache_len(), first.screened_pairs);

        // A second sweep over the same universe is answered from the
        // cache and must report identical rows
        let second = sc.screen_all(&prices, None);
        assert_eq!(sc.cache_len(), first.screened_pairs);
        assert_eq!(first.survivors, second.survivors);

        sc.clear_cache();
        assert_eq!(sc.cache_len(), 0);
    }

    #[test]
    fn test_metadata_joined_on_passing_rows() {
        let mut prices = PriceMap::new();
        let base: Vec<f64> = (0..40).map(|i| 100.0 + i as f64 * 0.5).collect();
        prices.insert("AAA".to_string(), series(&base));
        prices.insert("BBB".to_string(), series(&base));
        prices.insert("SHORT".to_string(), series(&[100.0, 101.0]));

        let mut info = InfoMap::new();
        info.insert(
            "AAA".to_string(),
            crate::types::SymbolInfo {
                name: "Alpha Fund".to_string(),
                avg_amount: Some(2e8),
            },
        );

        let outcome = screener(10).screen_all(&prices, Some(&info));

        let passed = outcome
            .diagnostics
            .iter()
            .find(|r| r.pair == Pair::new("AAA", "BBB"))
            .unwrap();
        assert!(passed.passed);
        assert_eq!(passed.name_a, "Alpha Fund");
        assert_eq!(passed.avg_amount_a, Some(2e8));
        // No metadata supplied for BBB
        assert_eq!(passed.name_b, "");
        assert_eq!(passed.avg_amount_b, None);

        // Rejected rows stay unannotated
        let rejected = outcome
            .diagnostics
            .iter()
            .find(|r| r.pair == Pair::new("AAA", "SHORT"))
            .unwrap();
        assert!(!rejected.passed);
        assert_eq!(rejected.name_a, "");
    }

    #[test]
    fn test_cache_bounds_and_clear() {
        let long = series(&(0..40).map(|i| 100.0 + i as f64).collect::<Vec<_>>());
        let sc = screener(10);
        let mut cache = ScreenCache::new(2);

        for name in ["A", "B", "C"] {
            let pair = Pair::new(name, format!("{}2", name));
            cache.insert(sc.screen_pair(pair, &long, &long));
        }
        // Third entry is dropped once the bound is hit
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }
}
