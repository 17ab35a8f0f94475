//! Paper Broker
//!
//! Simulated execution against live prices. Market orders fill immediately
//! at the current ticker price and move the in-memory balances; nothing is
//! sent to an exchange.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::{Broker, MarketData};
use crate::error::{Result, TradingError};
use crate::execution::{OrderReceipt, OrderSide};

pub struct PaperBroker {
    market: Arc<dyn MarketData>,
    quote_currency: String,
    balances: Mutex<HashMap<String, f64>>,
}

impl PaperBroker {
    /// Create a broker funded with `starting_balance` of the quote currency
    pub fn new(market: Arc<dyn MarketData>, quote_currency: &str, starting_balance: f64) -> Self {
        let mut balances = HashMap::new();
        balances.insert(quote_currency.to_string(), starting_balance);

        Self {
            market,
            quote_currency: quote_currency.to_string(),
            balances: Mutex::new(balances),
        }
    }

    /// Base asset of a symbol quoted in the broker's quote currency
    fn base_asset<'a>(&self, symbol: &'a str) -> &'a str {
        symbol.strip_suffix(self.quote_currency.as_str()).unwrap_or(symbol)
    }
}

#[async_trait]
impl Broker for PaperBroker {
    async fn fetch_balance(&self) -> Result<HashMap<String, f64>> {
        Ok(self.balances.lock().await.clone())
    }

    async fn place_market_order(&self, symbol: &str, side: OrderSide, amount: f64) -> Result<OrderReceipt> {
        let rejected = |reason: String| TradingError::OrderRejected {
            symbol: symbol.to_string(),
            reason,
        };

        if !(amount.is_finite() && amount > 0.0) {
            return Err(rejected(format!("amount must be positive, got {}", amount)));
        }

        let price = self.market.fetch_ticker(symbol).await?.last_price;
        if !(price.is_finite() && price > 0.0) {
            return Err(rejected(format!("no valid price ({})", price)));
        }

        let notional = amount * price;
        let base = self.base_asset(symbol).to_string();

        let snapshot = {
            let mut balances = self.balances.lock().await;
            let quote_balance = balances.get(&self.quote_currency).copied().unwrap_or(0.0);

            match side {
                OrderSide::Buy => {
                    if notional > quote_balance {
                        return Err(rejected(format!(
                            "insufficient {}: need {:.2}, have {:.2}",
                            self.quote_currency, notional, quote_balance
                        )));
                    }
                    balances.insert(self.quote_currency.clone(), quote_balance - notional);
                    *balances.entry(base).or_insert(0.0) += amount;
                }
                OrderSide::Sell => {
                    // Negative base balance represents a short
                    balances.insert(self.quote_currency.clone(), quote_balance + notional);
                    *balances.entry(base).or_insert(0.0) -= amount;
                }
            }
            balances.clone()
        };

        let receipt = OrderReceipt {
            order_id: Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            side,
            amount,
            fill_price: price,
            filled_at: Utc::now(),
        };

        info!(
            "Paper fill: {} {:.6} {} @ {:.4} (order {})",
            side, amount, symbol, price, receipt.order_id
        );
        debug!("Paper balances after fill: {:?}", snapshot);

        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::mock::MockExchange;

    async fn broker_at(price: f64, balance: f64) -> PaperBroker {
        let mock = MockExchange::new();
        mock.set_price("BTCUSDT", price).await;
        PaperBroker::new(Arc::new(mock), "USDT", balance)
    }

    #[tokio::test]
    async fn test_buy_moves_balances() {
        let broker = broker_at(100.0, 1_000.0).await;
        let receipt = broker.place_market_order("BTCUSDT", OrderSide::Buy, 4.0).await.unwrap();

        assert_eq!(receipt.fill_price, 100.0);
        assert!(!receipt.order_id.is_empty());

        let balances = broker.fetch_balance().await.unwrap();
        assert_eq!(balances["USDT"], 600.0);
        assert_eq!(balances["BTC"], 4.0);
    }

    #[tokio::test]
    async fn test_sell_credits_quote() {
        let broker = broker_at(100.0, 1_000.0).await;
        broker.place_market_order("BTCUSDT", OrderSide::Sell, 2.0).await.unwrap();

        let balances = broker.fetch_balance().await.unwrap();
        assert_eq!(balances["USDT"], 1_200.0);
        assert_eq!(balances["BTC"], -2.0);
    }

    #[tokio::test]
    async fn test_rejects_unaffordable_buy() {
        let broker = broker_at(100.0, 50.0).await;
        let err = broker.place_market_order("BTCUSDT", OrderSide::Buy, 1.0).await.unwrap_err();
        assert!(matches!(err, TradingError::OrderRejected { .. }));

        let balances = broker.fetch_balance().await.unwrap();
        assert_eq!(balances["USDT"], 50.0);
    }

    #[tokio::test]
    async fn test_rejects_non_positive_amount() {
        let broker = broker_at(100.0, 1_000.0).await;
        for amount in [0.0, -1.0, f64::NAN] {
            let err = broker.place_market_order("BTCUSDT", OrderSide::Buy, amount).await.unwrap_err();
            assert!(matches!(err, TradingError::OrderRejected { .. }));
        }
    }

    #[tokio::test]
    async fn test_concurrent_fills_all_return_receipts() {
        let broker = Arc::new(broker_at(100.0, 1_000.0).await);

        let orders = (0..10).map(|_| {
            let broker = broker.clone();
            tokio::spawn(async move { broker.place_market_order("BTCUSDT", OrderSide::Buy, 1.0).await })
        });
        let receipts: Vec<_> = futures::future::join_all(orders)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        assert_eq!(receipts.len(), 10);
        let balances = broker.fetch_balance().await.unwrap();
        assert_eq!(balances["USDT"], 0.0);
        assert_eq!(balances["BTC"], 10.0);
    }

    #[tokio::test]
    async fn test_missing_price_propagates() {
        let broker = PaperBroker::new(Arc::new(MockExchange::new()), "USDT", 1_000.0);
        let err = broker.place_market_order("ETHUSDT", OrderSide::Buy, 1.0).await.unwrap_err();
        assert!(matches!(err, TradingError::DataUnavailable { .. }));
    }
}
