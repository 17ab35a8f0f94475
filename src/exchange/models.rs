//! Binance REST Data Models
//!
//! Response types for the public spot market endpoints. Binance encodes
//! prices and quantities as decimal strings; conversion to `f64` happens
//! here so the rest of the crate only sees numbers.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::types::{MarketTicker, PriceBar, Ticker};

// ============================================================================
// Errors
// ============================================================================

/// Error body returned with non-2xx responses
#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub code: i64,
    pub msg: String,
}

// ============================================================================
// Klines
// ============================================================================

/// One kline row:
/// `[open_time, open, high, low, close, volume, close_time, ...]`
#[derive(Debug, Deserialize)]
pub struct KlineRow(pub Vec<Value>);

impl KlineRow {
    /// Convert to a price bar, `None` if the row is malformed
    pub fn to_price_bar(&self) -> Option<PriceBar> {
        let row = &self.0;
        if row.len() < 6 {
            return None;
        }

        let open_time = row[0].as_i64()?;
        let timestamp: DateTime<Utc> = Utc.timestamp_millis_opt(open_time).single()?;

        Some(PriceBar {
            timestamp,
            open: decimal(&row[1])?,
            high: decimal(&row[2])?,
            low: decimal(&row[3])?,
            close: decimal(&row[4])?,
            volume: decimal(&row[5])?,
        })
    }
}

// ============================================================================
// Tickers
// ============================================================================

/// Response from `/api/v3/ticker/price`
#[derive(Debug, Deserialize)]
pub struct PriceTicker {
    pub symbol: String,
    pub price: String,
}

impl PriceTicker {
    pub fn to_ticker(&self) -> Option<Ticker> {
        Some(Ticker {
            symbol: self.symbol.clone(),
            last_price: self.price.parse().ok()?,
        })
    }
}

/// Entry from `/api/v3/ticker/24hr`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTicker {
    pub symbol: String,
    pub last_price: String,
    pub price_change_percent: String,
    pub volume: String,
    pub high_price: String,
    pub low_price: String,
}

impl DailyTicker {
    pub fn to_market_ticker(&self) -> Option<MarketTicker> {
        Some(MarketTicker {
            symbol: self.symbol.clone(),
            price: self.last_price.parse().ok()?,
            change_24h: self.price_change_percent.parse().ok()?,
            volume: self.volume.parse().ok()?,
            high_24h: self.high_price.parse().ok()?,
            low_24h: self.low_price.parse().ok()?,
        })
    }
}

/// Parse a decimal that may arrive as a JSON string or number
fn decimal(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}
