//! Scalar Kalman filter for spread smoothing.
//!
//! A one-dimensional linear-Gaussian state-space filter with identity
//! state-transition and observation coefficients:
//!
//! ```text
//! z[t] = z[t-1] + w,  w ~ N(0, Q)     (state: latent spread level)
//! y[t] = z[t]   + v,  v ~ N(0, R)     (observation: noisy spread)
//! ```
//!
//! The OU estimator runs the centered spread through this filter before
//! fitting the AR(1), so transient microstructure spikes do not leak
//! into the mean-reversion speed estimate.

/// One-dimensional Kalman filter over a noisy level observation.
///
/// O(1) per update, no history retained beyond the current state.
#[derive(Debug, Clone)]
pub struct ScalarKalman {
    /// Current state estimate
    state: f64,
    /// State estimation error covariance (P)
    variance: f64,
    /// Process noise covariance (Q)
    process_noise: f64,
    /// Observation noise covariance (R)
    obs_noise: f64,
}

impl ScalarKalman {
    /// Create a filter starting at `initial_state` with unit initial
    /// uncertainty, so the first observations dominate quickly.
    pub fn new(initial_state: f64, process_noise: f64, obs_noise: f64) -> Self {
        Self {
            state: initial_state,
            variance: 1.0,
            process_noise,
            obs_noise,
        }
    }

    /// Fold in one observation and return the updated state estimate.
    ///
    /// Non-finite observations leave the state unchanged.
    pub fn update(&mut self, observation: f64) -> f64 {
        if !observation.is_finite() {
            return self.state;
        }

        // Predict: state carries over, uncertainty grows by Q
        let p_predicted = self.variance + self.process_noise;

        // Update: innovation against the raw observation (H = 1)
        let innovation = observation - self.state;
        let s = p_predicted + self.obs_noise;

        if s.abs() < f64::EPSILON {
            return self.state;
        }

        let gain = p_predicted / s;
        self.state += gain * innovation;
        // Variance floor guards against negative covariance from f64 error
        self.variance = ((1.0 - gain) * p_predicted).max(1e-12);

        self.state
    }

    pub fn state(&self) -> f64 {
        self.state
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    /// Run the filter over a whole series and return the filtered states.
    pub fn filter_series(series: &[f64], process_noise: f64, obs_noise: f64) -> Vec<f64> {
        let mut kf = Self::new(0.0, process_noise, obs_noise);
        series.iter().map(|&obs| kf.update(obs)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kalman_converges_to_constant_level() {
        let mut kf = ScalarKalman::new(0.0, 0.01, 1.0);
        let mut last = 0.0;
        for _ in 0..200 {
            last = kf.update(5.0);
        }
        assert!(
            (last - 5.0).abs() < 0.05,
            "filter should converge to the observed level, got {}",
            last
        );
    }

    #[test]
    fn test_kalman_smooths_noise() {
        // Alternating +1/-1 noise around zero: the filtered series must
        // have lower variance than the raw observations.
        let raw: Vec<f64> = (0..300)
            .map(|i| if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        let filtered = ScalarKalman::filter_series(&raw, 0.01, 1.0);

        let raw_var: f64 = raw.iter().map(|x| x * x).sum::<f64>() / raw.len() as f64;
        let filt_var: f64 =
            filtered.iter().map(|x| x * x).sum::<f64>() / filtered.len() as f64;

        assert!(
            filt_var < raw_var / 2.0,
            "filtered variance {} should be well below raw variance {}",
            filt_var,
            raw_var
        );
    }

    #[test]
    fn test_kalman_ignores_non_finite() {
        let mut kf = ScalarKalman::new(0.0, 0.01, 1.0);
        kf.update(2.0);
        let before = kf.state();
        assert_eq!(kf.update(f64::NAN), before);
        assert_eq!(kf.update(f64::INFINITY), before);
    }

    #[test]
    fn test_kalman_variance_decreases() {
        let mut kf = ScalarKalman::new(0.0, 0.01, 1.0);
        let initial = kf.variance();
        for _ in 0..50 {
            kf.update(1.0);
        }
        assert!(kf.variance() < initial);
    }

    #[test]
    fn test_filter_series_length_preserved() {
        let series = vec![0.1, 0.2, -0.1, 0.05];
        let filtered = ScalarKalman::filter_series(&series, 0.01, 1.0);
        assert_eq!(filtered.len(), series.len());
    }
}
