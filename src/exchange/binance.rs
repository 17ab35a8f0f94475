//! Binance Market Data Client
//!
//! Read-only HTTP client for the Binance spot REST API. Only public
//! endpoints are used, so no API key is required.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use super::models::{ApiError, DailyTicker, KlineRow, PriceTicker};
use super::MarketData;
use crate::error::{Result, TradingError};
use crate::types::{MarketTicker, PriceBar, Ticker};

/// Default API base URL for Binance spot
pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Binance public REST client
pub struct BinanceClient {
    client: Client,
    base_url: String,
}

impl BinanceClient {
    /// Create a new client with a per-request timeout
    pub fn new(base_url: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Make a GET request, mapping every failure to `DataUnavailable`
    async fn get<R: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, String)], symbol: &str) -> Result<R> {
        let unavailable = |reason: String| TradingError::DataUnavailable {
            symbol: symbol.to_string(),
            reason,
        };

        let response = self
            .client
            .get(format!("{}{}", self.base_url, endpoint))
            .query(query)
            .send()
            .await
            .map_err(|e| unavailable(format!("request to {} failed: {}", endpoint, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = match serde_json::from_str::<ApiError>(&body) {
                Ok(err) => format!("{} (code {})", err.msg, err.code),
                Err(_) => format!("{} returned {}: {}", endpoint, status, body),
            };
            warn!("Binance request failed for {}: {}", symbol, reason);
            return Err(unavailable(reason));
        }

        response
            .json()
            .await
            .map_err(|e| unavailable(format!("failed to parse response from {}: {}", endpoint, e)))
    }
}

#[async_trait]
impl MarketData for BinanceClient {
    async fn fetch_series(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<PriceBar>> {
        debug!("Fetching {} {} klines for {}", limit, timeframe, symbol);

        let query = [
            ("symbol", symbol.to_string()),
            ("interval", timeframe.to_string()),
            ("limit", limit.to_string()),
        ];
        let rows: Vec<KlineRow> = self.get("/api/v3/klines", &query, symbol).await?;

        let mut bars = Vec::with_capacity(rows.len());
        for row in &rows {
            let bar = row.to_price_bar().ok_or_else(|| TradingError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: format!("malformed kline row: {:?}", row.0),
            })?;
            bars.push(bar);
        }

        // Binance returns ascending order already; keep the invariant explicit
        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker> {
        let query = [("symbol", symbol.to_string())];
        let ticker: PriceTicker = self.get("/api/v3/ticker/price", &query, symbol).await?;

        ticker.to_ticker().ok_or_else(|| TradingError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: format!("unparseable price '{}'", ticker.price),
        })
    }

    async fn fetch_market_tickers(&self) -> Result<Vec<MarketTicker>> {
        let tickers: Vec<DailyTicker> = self.get("/api/v3/ticker/24hr", &[], "*").await?;
        let parsed: Vec<MarketTicker> = tickers.iter().filter_map(DailyTicker::to_market_ticker).collect();

        debug!("Fetched {} 24h tickers ({} unparseable)", parsed.len(), tickers.len() - parsed.len());
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalized() {
        let client = BinanceClient::new("https://api.binance.com/".to_string(), Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_data_unavailable() {
        // Port 9 (discard) on localhost refuses connections
        let client = BinanceClient::new("http://127.0.0.1:9".to_string(), Duration::from_millis(500)).unwrap();
        let err = client.fetch_ticker("BTCUSDT").await.unwrap_err();

        assert!(matches!(err, TradingError::DataUnavailable { ref symbol, .. } if symbol == "BTCUSDT"));
    }
}
