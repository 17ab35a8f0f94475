//! Exchange Integration
//!
//! The trading core only talks to the market through two capabilities:
//!
//! - [`MarketData`] - OHLCV series, last price and 24h statistics
//! - [`Broker`] - balances and market order placement
//!
//! # Components
//!
//! - [`binance`] - public REST market data client
//! - [`models`] - wire types for the Binance REST API
//! - [`paper`] - in-memory broker that fills at the current ticker price

pub mod binance;
pub mod models;
pub mod paper;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;
use crate::execution::{OrderReceipt, OrderSide};
use crate::types::{MarketTicker, PriceBar, Ticker};

// Re-export commonly used types
pub use binance::BinanceClient;
pub use paper::PaperBroker;

/// Source of market data
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Bars for `symbol` ordered by timestamp ascending
    async fn fetch_series(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<PriceBar>>;

    /// Last traded price
    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker>;

    /// 24h statistics for every listed symbol
    async fn fetch_market_tickers(&self) -> Result<Vec<MarketTicker>>;
}

/// Account and order capability
#[async_trait]
pub trait Broker: Send + Sync {
    /// Available amount per currency
    async fn fetch_balance(&self) -> Result<HashMap<String, f64>>;

    /// Submit a market order for `amount` base units
    async fn place_market_order(&self, symbol: &str, side: OrderSide, amount: f64) -> Result<OrderReceipt>;
}
