//! Numerical building blocks: descriptive statistics, OLS, a scalar
//! Kalman filter, and the augmented Dickey-Fuller machinery behind the
//! Engle-Granger cointegration test.

pub mod adf;
pub mod kalman;
pub mod stats;

pub use adf::{adf_test, engle_granger, mackinnon_p_value, AdfResult, EngleGrangerResult};
pub use kalman::ScalarKalman;
