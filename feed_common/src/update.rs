//! The tick value produced once per production cycle.
use serde::{Deserialize, Serialize};

use crate::tickers::Ticker;

/// One simulated price observation.
///
/// The serde field names double as the text wire format, so renaming a field
/// changes the feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StockUpdate {
    /// Symbol the tick belongs to.
    pub ticker: Ticker,
    /// Wall clock time in nanoseconds since the Unix epoch.
    pub timestamp: i64,
    /// Price in currency units, full precision.
    pub price: f64,
}

impl StockUpdate {
    /// Create a new tick.
    pub fn new(ticker: Ticker, timestamp: i64, price: f64) -> Self {
        Self {
            ticker,
            timestamp,
            price,
        }
    }
}
