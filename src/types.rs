use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::execution::{CloseEvent, ExecutionResult, TradingController, TradingStats};
use crate::trading_core::{MarketScanner, TradeSignal};

/// One OHLCV bar, immutable once fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Latest traded price for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    #[serde(rename = "lastPrice")]
    pub last_price: f64,
}

/// Rolling 24h statistics for a symbol, used by the market scanner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketTicker {
    pub symbol: String,
    pub price: f64,
    #[serde(rename = "change24h")]
    pub change_24h: f64,
    pub volume: f64,
    #[serde(rename = "high24h")]
    pub high_24h: f64,
    #[serde(rename = "low24h")]
    pub low_24h: f64,
}

/// Extract the closing prices from a bar series
pub fn closes(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsMessage {
    Signal(TradeSignal),
    Execution(ExecutionResult),
    PositionClosed(CloseEvent),
    Stats(TradingStats),
    Connected { symbols: Vec<String> },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMessage {
    pub action: String,
    pub symbol: Option<String>,
    pub enabled: Option<bool>,
}

/// Shared application state
pub struct AppState {
    pub controller: Arc<TradingController>,
    pub scanner: MarketScanner,
    pub tx: broadcast::Sender<WsMessage>,
}
