//! Full-universe pairs-trading candidate scanner.
//!
//! Pipeline: correlation/volatility pre-screen, Engle-Granger
//! cointegration test, Kalman-filtered OU half-life gate, composite
//! scoring, with batch checkpointing for interruptible runs.

pub mod coint;
pub mod config;
pub mod error;
pub mod math;
pub mod ou;
pub mod pipeline;
pub mod progress;
pub mod score;
pub mod screen;
pub mod types;

pub use config::ScanConfig;
pub use error::ScanError;
pub use pipeline::{PairScanner, ScanReport};
pub use types::{InfoMap, Pair, PriceMap, PriceSeries, SymbolInfo};
