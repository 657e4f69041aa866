//! Composite scoring and ranking.
//!
//! `score = p_weight * max(0, 1 - p_value)
//!        + hl_weight * max(0, 1 - min(1, half_life / cap))`
//!
//! Both terms are clamped to [0, weight], so a lower p-value and a
//! shorter (but non-degenerate) half-life each raise the score
//! monotonically. Scoring is a pure function of its inputs and the
//! configured weights; ranking uses a stable sort so equal scores keep
//! their original order.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ScoringConfig;
use crate::types::{InfoMap, PairRecord};

/// Final ranked output row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPair {
    pub symbol_a: String,
    pub symbol_b: String,
    pub name_a: String,
    pub name_b: String,
    pub beta: f64,
    pub score: f64,
    pub half_life: f64,
    pub p_value: f64,
    pub correlation: f64,
    pub spread_volatility: f64,
    pub data_points: usize,
}

/// Aggregate scoring statistics.
#[derive(Debug, Clone)]
pub struct ScoringStats {
    pub total_pairs: usize,
    pub max_score: f64,
    pub min_score: f64,
    pub avg_score: f64,
    pub median_score: f64,
}

/// Pair scorer and ranker.
#[derive(Debug, Clone)]
pub struct PairScorer {
    config: ScoringConfig,
}

impl PairScorer {
    pub fn new(config: ScoringConfig) -> Self {
        info!(
            p_weight = config.p_value_weight,
            hl_weight = config.half_life_weight,
            hl_cap = config.half_life_cap,
            "Scorer ready"
        );
        Self { config }
    }

    /// Score one pair from its p-value and half-life.
    pub fn score(&self, p_value: f64, half_life: f64) -> f64 {
        let p_component = self.config.p_value_weight * (1.0 - p_value).max(0.0);

        // Infinite or NaN half-life contributes nothing
        let hl_ratio = if half_life.is_finite() {
            (half_life / self.config.half_life_cap).min(1.0)
        } else {
            1.0
        };
        let hl_component = self.config.half_life_weight * (1.0 - hl_ratio).max(0.0);

        p_component + hl_component
    }

    /// Score, rank descending, and truncate to the configured top N.
    /// The sort is stable: ties keep their input order.
    pub fn rank(&self, records: Vec<PairRecord>, info: Option<&InfoMap>) -> Vec<ScoredPair> {
        let mut rows: Vec<ScoredPair> = records
            .into_iter()
            .map(|r| {
                let name = |code: &str| -> String {
                    info.and_then(|m| m.get(code))
                        .map(|i| i.name.clone())
                        .unwrap_or_default()
                };
                ScoredPair {
                    name_a: name(r.pair.first()),
                    name_b: name(r.pair.second()),
                    symbol_a: r.pair.first().to_string(),
                    symbol_b: r.pair.second().to_string(),
                    beta: r.beta,
                    score: self.score(r.p_value, r.half_life),
                    half_life: r.half_life,
                    p_value: r.p_value,
                    correlation: r.correlation,
                    spread_volatility: r.spread_volatility,
                    data_points: r.data_points,
                }
            })
            .collect();

        rows.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        rows.truncate(self.config.top_n);

        info!(ranked = rows.len(), "Ranking complete");
        rows
    }

    /// Aggregate statistics over scored rows.
    pub fn scoring_stats(rows: &[ScoredPair]) -> ScoringStats {
        if rows.is_empty() {
            return ScoringStats {
                total_pairs: 0,
                max_score: f64::NAN,
                min_score: f64::NAN,
                avg_score: f64::NAN,
                median_score: f64::NAN,
            };
        }

        let mut scores: Vec<f64> = rows.iter().map(|r| r.score).collect();
        scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let n = scores.len();
        let median = if n % 2 == 1 {
            scores[n / 2]
        } else {
            (scores[n / 2 - 1] + scores[n / 2]) / 2.0
        };

        ScoringStats {
            total_pairs: n,
            max_score: scores[n - 1],
            min_score: scores[0],
            avg_score: scores.iter().sum::<f64>() / n as f64,
            median_score: median,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Pair;

    fn scorer() -> PairScorer {
        PairScorer::new(ScoringConfig::default())
    }

    fn record(a: &str, b: &str, p_value: f64, half_life: f64) -> PairRecord {
        PairRecord {
            pair: Pair::new(a, b),
            p_value,
            beta: 1.0,
            half_life,
            phi: 0.9,
            score: 0.0,
            correlation: 0.9,
            spread_volatility: 0.1,
            data_points: 250,
        }
    }

    #[test]
    fn test_score_bounds() {
        let s = scorer();
        // Best possible inputs: both terms at full weight
        assert!((s.score(0.0, 0.0) - 150.0).abs() < 1e-12);
        // Worst: p at 1, half-life at/above the cap
        assert_eq!(s.score(1.0, 60.0), 0.0);
        assert_eq!(s.score(1.0, f64::INFINITY), 0.0);
    }

    #[test]
    fn test_score_monotone_in_p_value() {
        let s = scorer();
        let mut last = f64::INFINITY;
        for p in [0.0, 0.01, 0.05, 0.2, 0.5, 1.0] {
            let score = s.score(p, 30.0);
            assert!(score <= last, "score must not increase with p");
            last = score;
        }
    }

    #[test]
    fn test_score_monotone_in_half_life() {
        let s = scorer();
        let mut last = f64::INFINITY;
        for hl in [1.0, 10.0, 30.0, 59.0, 60.0, 120.0, f64::INFINITY] {
            let score = s.score(0.01, hl);
            assert!(score <= last, "score must not increase with half-life");
            last = score;
        }
    }

    #[test]
    fn test_score_is_pure() {
        let s = scorer();
        assert_eq!(s.score(0.03, 25.0), s.score(0.03, 25.0));
    }

    #[test]
    fn test_rank_descending_and_truncated() {
        let s = PairScorer::new(ScoringConfig {
            top_n: 2,
            ..Default::default()
        });
        let records = vec![
            record("A", "B", 0.04, 50.0),
            record("C", "D", 0.001, 10.0),
            record("E", "F", 0.02, 30.0),
        ];

        let ranked = s.rank(records, None);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].symbol_a, "C");
        assert!(ranked[0].score >= ranked[1].score);
    }

    #[test]
    fn test_rank_ties_keep_input_order() {
        let s = scorer();
        let records = vec![
            record("A", "B", 0.01, 20.0),
            record("C", "D", 0.01, 20.0),
            record("E", "F", 0.01, 20.0),
        ];

        let ranked = s.rank(records, None);
        let order: Vec<&str> = ranked.iter().map(|r| r.symbol_a.as_str()).collect();
        assert_eq!(order, vec!["A", "C", "E"]);
    }

    #[test]
    fn test_rank_joins_names() {
        let mut info = InfoMap::new();
        info.insert(
            "A".to_string(),
            crate::types::SymbolInfo {
                name: "Alpha Fund".to_string(),
                avg_amount: Some(1e8),
            },
        );

        let ranked = scorer().rank(vec![record("A", "B", 0.01, 20.0)], Some(&info));
        assert_eq!(ranked[0].name_a, "Alpha Fund");
        assert_eq!(ranked[0].name_b, "");
    }

    #[test]
    fn test_scoring_stats_median() {
        let s = scorer();
        let ranked = s.rank(
            vec![
                record("A", "B", 0.0, 0.0),
                record("C", "D", 1.0, 60.0),
                record("E", "F", 0.5, 30.0),
            ],
            None,
        );
        let stats = PairScorer::scoring_stats(&ranked);
        assert_eq!(stats.total_pairs, 3);
        assert!((stats.max_score - 150.0).abs() < 1e-9);
        assert_eq!(stats.min_score, 0.0);
        assert!((stats.median_score - 75.0).abs() < 1e-9);
    }
}
