//! Core data types shared across the scanning pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::ScanError;

/// Daily close prices for one instrument, indexed by trading date.
///
/// Invariants (checked at construction): dates strictly increasing,
/// all prices positive and finite. The series is read-only once built;
/// the upstream data collaborator owns acquisition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    dates: Vec<NaiveDate>,
    prices: Vec<f64>,
}

impl PriceSeries {
    /// Build a series from (date, price) points.
    ///
    /// # Errors
    /// Returns `ScanError::InvalidSeries` if dates are not strictly
    /// increasing or any price is non-positive or non-finite.
    pub fn new(points: Vec<(NaiveDate, f64)>) -> Result<Self, ScanError> {
        let mut dates = Vec::with_capacity(points.len());
        let mut prices = Vec::with_capacity(points.len());

        for (date, price) in points {
            if let Some(last) = dates.last() {
                if date <= *last {
                    return Err(ScanError::InvalidSeries(format!(
                        "dates must be strictly increasing: {} after {}",
                        date, last
                    )));
                }
            }
            if !price.is_finite() || price <= 0.0 {
                return Err(ScanError::InvalidSeries(format!(
                    "price must be positive and finite, got {} on {}",
                    price, date
                )));
            }
            dates.push(date);
            prices.push(price);
        }

        Ok(Self { dates, prices })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    /// Inner-join two series on date. Both inputs have ascending unique
    /// dates, so a single two-pointer sweep suffices.
    pub fn align(&self, other: &PriceSeries) -> AlignedPrices {
        let mut dates = Vec::new();
        let mut a = Vec::new();
        let mut b = Vec::new();

        let (mut i, mut j) = (0usize, 0usize);
        while i < self.dates.len() && j < other.dates.len() {
            match self.dates[i].cmp(&other.dates[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    dates.push(self.dates[i]);
                    a.push(self.prices[i]);
                    b.push(other.prices[j]);
                    i += 1;
                    j += 1;
                }
            }
        }

        AlignedPrices { dates, a, b }
    }
}

/// Result of aligning two price series on common dates.
#[derive(Debug, Clone)]
pub struct AlignedPrices {
    pub dates: Vec<NaiveDate>,
    pub a: Vec<f64>,
    pub b: Vec<f64>,
}

impl AlignedPrices {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// An unordered instrument pair in canonical form.
///
/// `Pair::new("B", "A")` and `Pair::new("A", "B")` are the same value:
/// the lexicographically smaller code is always stored first. This makes
/// dedup and checkpoint membership checks order-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pair {
    a: String,
    b: String,
}

impl Pair {
    /// Canonicalize a symbol pair.
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        let (first, second) = (first.into(), second.into());
        debug_assert_ne!(first, second, "a pair needs two distinct instruments");
        if first <= second {
            Self { a: first, b: second }
        } else {
            Self { a: second, b: first }
        }
    }

    pub fn first(&self) -> &str {
        &self.a
    }

    pub fn second(&self) -> &str {
        &self.b
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.a, self.b)
    }
}

/// Optional per-instrument metadata supplied by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolInfo {
    /// Display name (may be empty).
    pub name: String,
    /// Average daily traded value, if known.
    pub avg_amount: Option<f64>,
}

/// Mapping from instrument code to its price history.
pub type PriceMap = HashMap<String, PriceSeries>;

/// Mapping from instrument code to metadata.
pub type InfoMap = HashMap<String, SymbolInfo>;

/// Spread series produced by the cointegration step:
/// `log(price_b) - beta * log(price_a)` on the aligned dates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadSeries {
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl SpreadSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One fully-analyzed pair that survived cointegration and half-life
/// gates. Accumulated by the progress manager batch by batch, consumed
/// by the scorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairRecord {
    pub pair: Pair,
    pub p_value: f64,
    pub beta: f64,
    pub half_life: f64,
    pub phi: f64,
    pub score: f64,
    pub correlation: f64,
    pub spread_volatility: f64,
    pub data_points: usize,
}
