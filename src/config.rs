//! Configuration for the scanning pipeline.
//!
//! One section per stage, each with serde defaults so callers can supply
//! partial configuration files. `ScanConfig::validate` catches values the
//! pipeline cannot work with before any computation starts.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Trading days per year used to annualize daily spread volatility.
pub const ANNUALIZATION_DAYS: f64 = 250.0;

/// Pre-screening thresholds (stage 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenConfig {
    /// Minimum Pearson correlation of raw prices (0.0-1.0)
    #[serde(default = "default_min_correlation")]
    pub min_correlation: f64,

    /// Maximum annualized log-spread volatility
    #[serde(default = "default_max_spread_volatility")]
    pub max_spread_volatility: f64,

    /// Minimum aligned data points per pair
    #[serde(default = "default_min_data_points")]
    pub min_data_points: usize,
}

/// Cointegration test thresholds (stage 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CointConfig {
    /// Maximum Engle-Granger p-value to pass
    #[serde(default = "default_max_p_value")]
    pub max_p_value: f64,
}

/// OU half-life estimation parameters (stage 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OuConfig {
    /// Minimum half-life in trading days to pass
    #[serde(default = "default_min_half_life")]
    pub min_half_life: f64,

    /// Maximum half-life in trading days to pass
    #[serde(default = "default_max_half_life")]
    pub max_half_life: f64,

    /// Lower edge of the "optimal" half-life window (desirability
    /// signal only, not a gate)
    #[serde(default = "default_optimal_half_life_min")]
    pub optimal_half_life_min: f64,

    /// Upper edge of the "optimal" half-life window
    #[serde(default = "default_optimal_half_life_max")]
    pub optimal_half_life_max: f64,

    /// Kalman filter observation-noise variance
    #[serde(default = "default_kf_observation_variance")]
    pub kf_observation_variance: f64,

    /// Kalman filter process-noise variance
    #[serde(default = "default_kf_process_variance")]
    pub kf_process_variance: f64,
}

/// Composite scoring weights (stage 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Weight of the (1 - p_value) term
    #[serde(default = "default_p_value_weight")]
    pub p_value_weight: f64,

    /// Weight of the (1 - half_life / cap) term
    #[serde(default = "default_half_life_weight")]
    pub half_life_weight: f64,

    /// Half-life (days) at which the half-life term bottoms out at zero
    #[serde(default = "default_half_life_cap")]
    pub half_life_cap: f64,

    /// Number of ranked pairs to emit
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

/// Batching and checkpoint persistence (orchestration).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Pairs per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Checkpoint file path
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: String,

    /// Flush the checkpoint to disk every N completed batches
    #[serde(default = "default_save_interval")]
    pub save_interval: usize,
}

/// Deterministic candidate sampling for fast development iteration.
/// A ratio of 1.0 disables sampling (full run).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Fraction of candidate pairs to process (0.0-1.0]
    #[serde(default = "default_sample_ratio")]
    pub ratio: f64,

    /// RNG seed; fixed so sampled subsets are reproducible
    #[serde(default = "default_sample_seed")]
    pub seed: u64,
}

fn default_min_correlation() -> f64 {
    0.85
}
fn default_max_spread_volatility() -> f64 {
    0.25
}
fn default_min_data_points() -> usize {
    200
}
fn default_max_p_value() -> f64 {
    0.05
}
fn default_min_half_life() -> f64 {
    0.0
}
fn default_max_half_life() -> f64 {
    1e11
}
fn default_optimal_half_life_min() -> f64 {
    15.0
}
fn default_optimal_half_life_max() -> f64 {
    40.0
}
fn default_kf_observation_variance() -> f64 {
    1.0
}
fn default_kf_process_variance() -> f64 {
    0.01
}
fn default_p_value_weight() -> f64 {
    100.0
}
fn default_half_life_weight() -> f64 {
    50.0
}
fn default_half_life_cap() -> f64 {
    60.0
}
fn default_top_n() -> usize {
    100
}
fn default_batch_size() -> usize {
    1000
}
fn default_checkpoint_path() -> String {
    "cache/progress.json".to_string()
}
fn default_save_interval() -> usize {
    5
}
fn default_sample_ratio() -> f64 {
    1.0
}
fn default_sample_seed() -> u64 {
    42
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            min_correlation: default_min_correlation(),
            max_spread_volatility: default_max_spread_volatility(),
            min_data_points: default_min_data_points(),
        }
    }
}

impl Default for CointConfig {
    fn default() -> Self {
        Self {
            max_p_value: default_max_p_value(),
        }
    }
}

impl Default for OuConfig {
    fn default() -> Self {
        Self {
            min_half_life: default_min_half_life(),
            max_half_life: default_max_half_life(),
            optimal_half_life_min: default_optimal_half_life_min(),
            optimal_half_life_max: default_optimal_half_life_max(),
            kf_observation_variance: default_kf_observation_variance(),
            kf_process_variance: default_kf_process_variance(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            p_value_weight: default_p_value_weight(),
            half_life_weight: default_half_life_weight(),
            half_life_cap: default_half_life_cap(),
            top_n: default_top_n(),
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            checkpoint_path: default_checkpoint_path(),
            save_interval: default_save_interval(),
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            ratio: default_sample_ratio(),
            seed: default_sample_seed(),
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default)]
    pub screen: ScreenConfig,
    #[serde(default)]
    pub coint: CointConfig,
    #[serde(default)]
    pub ou: OuConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
}

impl ScanConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.screen.min_correlation) {
            return Err(format!(
                "min_correlation must be between 0.0 and 1.0, got {}",
                self.screen.min_correlation
            ));
        }
        if self.screen.max_spread_volatility <= 0.0 {
            return Err(format!(
                "max_spread_volatility must be positive, got {}",
                self.screen.max_spread_volatility
            ));
        }
        if self.screen.min_data_points < 2 {
            return Err("min_data_points must be at least 2".to_string());
        }
        if !(0.0..=1.0).contains(&self.coint.max_p_value) {
            return Err(format!(
                "max_p_value must be between 0.0 and 1.0, got {}",
                self.coint.max_p_value
            ));
        }
        if self.ou.min_half_life < 0.0 || self.ou.max_half_life <= self.ou.min_half_life {
            return Err(format!(
                "half-life window [{}, {}] is empty or negative",
                self.ou.min_half_life, self.ou.max_half_life
            ));
        }
        if self.ou.kf_observation_variance <= 0.0 || self.ou.kf_process_variance <= 0.0 {
            return Err("Kalman noise variances must be positive".to_string());
        }
        if self.scoring.half_life_cap <= 0.0 {
            return Err(format!(
                "half_life_cap must be positive, got {}",
                self.scoring.half_life_cap
            ));
        }
        if self.progress.batch_size == 0 {
            return Err("batch_size must be at least 1".to_string());
        }
        if self.progress.save_interval == 0 {
            return Err("save_interval must be at least 1".to_string());
        }
        if !(self.sampling.ratio > 0.0 && self.sampling.ratio <= 1.0) {
            return Err(format!(
                "sampling ratio must be in (0.0, 1.0], got {}",
                self.sampling.ratio
            ));
        }
        Ok(())
    }

    /// Fingerprint of every parameter that affects analytic results.
    ///
    /// Stored in the checkpoint so a resume against a changed
    /// configuration is detected and the stale checkpoint discarded
    /// instead of silently reusing results computed under different
    /// thresholds.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        // Hash the analytic sections only: batch size and checkpoint
        // path can change without invalidating completed results.
        self.screen.min_correlation.to_bits().hash(&mut hasher);
        self.screen.max_spread_volatility.to_bits().hash(&mut hasher);
        self.screen.min_data_points.hash(&mut hasher);
        self.coint.max_p_value.to_bits().hash(&mut hasher);
        self.ou.min_half_life.to_bits().hash(&mut hasher);
        self.ou.max_half_life.to_bits().hash(&mut hasher);
        self.ou.kf_observation_variance.to_bits().hash(&mut hasher);
        self.ou.kf_process_variance.to_bits().hash(&mut hasher);
        self.scoring.p_value_weight.to_bits().hash(&mut hasher);
        self.scoring.half_life_weight.to_bits().hash(&mut hasher);
        self.scoring.half_life_cap.to_bits().hash(&mut hasher);
        self.sampling.ratio.to_bits().hash(&mut hasher);
        self.sampling.seed.hash(&mut hasher);
        hasher.finish()
    }
}
