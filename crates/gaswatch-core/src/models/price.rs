//! Gas price quote returned by the API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unit every gas price in the system is expressed in
pub const GAS_PRICE_UNIT: &str = "Gwei";

/// A gas price observed at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    /// Rounded gas price
    pub gas_price: i32,

    /// Always [`GAS_PRICE_UNIT`]
    pub unit: String,

    /// Observation time in epoch milliseconds
    pub timestamp: i64,
}

impl PriceQuote {
    /// Quote `gas_price` as observed at `at`
    pub fn new(gas_price: i32, at: DateTime<Utc>) -> Self {
        Self {
            gas_price,
            unit: GAS_PRICE_UNIT.to_string(),
            timestamp: at.timestamp_millis(),
        }
    }
}
