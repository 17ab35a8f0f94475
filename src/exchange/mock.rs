//! Scripted in-memory exchange for tests

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use super::{Broker, MarketData};
use crate::error::{Result, TradingError};
use crate::execution::{OrderReceipt, OrderSide};
use crate::types::{MarketTicker, PriceBar, Ticker};

#[derive(Default)]
struct MockState {
    series: HashMap<String, Vec<PriceBar>>,
    prices: HashMap<String, f64>,
    market_tickers: Vec<MarketTicker>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    balances: HashMap<String, f64>,
    reject_orders: bool,
    orders: Vec<(String, OrderSide, f64)>,
}

#[derive(Default)]
pub struct MockExchange {
    state: Mutex<MockState>,
    ticker_calls: AtomicUsize,
    order_seq: AtomicUsize,
}

impl MockExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_price(&self, symbol: &str, price: f64) {
        self.state.lock().await.prices.insert(symbol.to_string(), price);
    }

    pub async fn set_closes(&self, symbol: &str, closes: &[f64]) {
        self.state.lock().await.series.insert(symbol.to_string(), bars_from(closes));
        if let Some(&last) = closes.last() {
            self.set_price(symbol, last).await;
        }
    }

    pub async fn set_market_tickers(&self, tickers: Vec<MarketTicker>) {
        self.state.lock().await.market_tickers = tickers;
    }

    pub async fn set_failing(&self, symbol: &str, failing: bool) {
        let mut state = self.state.lock().await;
        if failing {
            state.failing.insert(symbol.to_string());
        } else {
            state.failing.remove(symbol);
        }
    }

    pub async fn set_delay(&self, symbol: &str, delay: Duration) {
        self.state.lock().await.delays.insert(symbol.to_string(), delay);
    }

    pub async fn set_balance(&self, currency: &str, amount: f64) {
        self.state.lock().await.balances.insert(currency.to_string(), amount);
    }

    pub async fn set_reject_orders(&self, reject: bool) {
        self.state.lock().await.reject_orders = reject;
    }

    pub async fn orders(&self) -> Vec<(String, OrderSide, f64)> {
        self.state.lock().await.orders.clone()
    }

    pub fn ticker_calls(&self) -> usize {
        self.ticker_calls.load(Ordering::SeqCst)
    }

    /// Applies the scripted delay and failure for `symbol`
    async fn gate(&self, symbol: &str) -> Result<()> {
        let (delay, failing) = {
            let state = self.state.lock().await;
            (state.delays.get(symbol).copied(), state.failing.contains(symbol))
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if failing {
            return Err(TradingError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "scripted failure".to_string(),
            });
        }
        Ok(())
    }
}

/// Flat bars (open = high = low = close) one hour apart, ending now
pub fn bars_from(closes: &[f64]) -> Vec<PriceBar> {
    let start = Utc::now() - ChronoDuration::hours(closes.len() as i64);
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| PriceBar {
            timestamp: start + ChronoDuration::hours(i as i64),
            open: c,
            high: c,
            low: c,
            close: c,
            volume: 1_000.0,
        })
        .collect()
}

#[async_trait]
impl MarketData for MockExchange {
    async fn fetch_series(&self, symbol: &str, _timeframe: &str, limit: usize) -> Result<Vec<PriceBar>> {
        self.gate(symbol).await?;
        let state = self.state.lock().await;
        let bars = state.series.get(symbol).ok_or_else(|| TradingError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: "no series".to_string(),
        })?;
        let skip = bars.len().saturating_sub(limit);
        Ok(bars[skip..].to_vec())
    }

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker> {
        self.ticker_calls.fetch_add(1, Ordering::SeqCst);
        self.gate(symbol).await?;
        let state = self.state.lock().await;
        let last_price = state.prices.get(symbol).copied().ok_or_else(|| TradingError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: "no price".to_string(),
        })?;
        Ok(Ticker {
            symbol: symbol.to_string(),
            last_price,
        })
    }

    async fn fetch_market_tickers(&self) -> Result<Vec<MarketTicker>> {
        Ok(self.state.lock().await.market_tickers.clone())
    }
}

#[async_trait]
impl Broker for MockExchange {
    async fn fetch_balance(&self) -> Result<HashMap<String, f64>> {
        Ok(self.state.lock().await.balances.clone())
    }

    async fn place_market_order(&self, symbol: &str, side: OrderSide, amount: f64) -> Result<OrderReceipt> {
        let mut state = self.state.lock().await;
        if state.reject_orders {
            return Err(TradingError::OrderRejected {
                symbol: symbol.to_string(),
                reason: "scripted rejection".to_string(),
            });
        }
        let fill_price = state.prices.get(symbol).copied().unwrap_or(0.0);
        state.orders.push((symbol.to_string(), side, amount));

        let seq = self.order_seq.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(OrderReceipt {
            order_id: format!("mock-{}", seq),
            symbol: symbol.to_string(),
            side,
            amount,
            fill_price,
            filled_at: Utc::now(),
        })
    }
}
