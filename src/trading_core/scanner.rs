//! Market Scanner
//!
//! Ranks the quote-currency market by 24h volume and flags low-priced coins
//! with outsized daily gains.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::exchange::MarketData;
use crate::types::MarketTicker;

/// Upside bucket derived from the 24h change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Potential {
    #[serde(rename = "10x+")]
    TenXPlus,
    #[serde(rename = "5x-10x")]
    FiveToTenX,
    #[serde(rename = "2x-5x")]
    TwoToFiveX,
    #[serde(rename = "1x-2x")]
    OneToTwoX,
}

impl Potential {
    pub fn from_change(change_24h: f64) -> Self {
        if change_24h > 100.0 {
            Self::TenXPlus
        } else if change_24h > 50.0 {
            Self::FiveToTenX
        } else if change_24h > 20.0 {
            Self::TwoToFiveX
        } else {
            Self::OneToTwoX
        }
    }
}

/// Liquidity risk derived from 24h volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_volume(volume: f64) -> Self {
        if volume > 1_000_000.0 {
            Self::Low
        } else if volume > 100_000.0 {
            Self::Medium
        } else {
            Self::High
        }
    }
}

/// A coin that passed the explosive-move filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplosiveCoin {
    #[serde(flatten)]
    pub ticker: MarketTicker,
    pub potential: Potential,
    #[serde(rename = "riskLevel")]
    pub risk_level: RiskLevel,
}

/// Configuration for the scanner filters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Quote asset symbols must end with (e.g. "USDT")
    pub quote_currency: String,
    /// Number of coins kept after ranking by volume
    pub top_n: usize,
    /// Minimum 24h change in percent
    pub min_change_pct: f64,
    /// Coins at or above this price are ignored
    pub max_price: f64,
    /// Minimum 24h base volume
    pub min_volume: f64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            quote_currency: "USDT".to_string(),
            top_n: 200,
            min_change_pct: 20.0,
            max_price: 1.0,
            min_volume: 100_000.0,
        }
    }
}

pub struct MarketScanner {
    config: ScannerConfig,
    market: Arc<dyn MarketData>,
}

impl MarketScanner {
    pub fn new(config: ScannerConfig, market: Arc<dyn MarketData>) -> Self {
        Self { config, market }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Top coins quoted in the configured currency, by 24h volume descending
    pub async fn top_coins(&self) -> Result<Vec<MarketTicker>> {
        let tickers = self.market.fetch_market_tickers().await.map_err(|e| {
            warn!("Market scan failed: {}", e);
            e
        })?;
        let ranked = rank_by_volume(tickers, &self.config.quote_currency, self.config.top_n);
        debug!("Scanned {} {} pairs", ranked.len(), self.config.quote_currency);
        Ok(ranked)
    }

    /// Filter coins for large daily moves on cheap, liquid pairs
    pub fn detect_explosive(&self, coins: &[MarketTicker]) -> Vec<ExplosiveCoin> {
        let mut explosive: Vec<ExplosiveCoin> = coins
            .iter()
            .filter(|c| {
                c.change_24h > self.config.min_change_pct
                    && c.price < self.config.max_price
                    && c.volume > self.config.min_volume
            })
            .map(|c| ExplosiveCoin {
                ticker: c.clone(),
                potential: Potential::from_change(c.change_24h),
                risk_level: RiskLevel::from_volume(c.volume),
            })
            .collect();

        explosive.sort_by(|a, b| b.ticker.change_24h.total_cmp(&a.ticker.change_24h));
        explosive
    }
}

/// Keep `quote` pairs, sort by volume descending, truncate to `limit`
pub fn rank_by_volume(tickers: Vec<MarketTicker>, quote: &str, limit: usize) -> Vec<MarketTicker> {
    let mut pairs: Vec<MarketTicker> = tickers
        .into_iter()
        .filter(|t| t.symbol.ends_with(quote) && t.symbol.len() > quote.len())
        .collect();
    pairs.sort_by(|a, b| b.volume.total_cmp(&a.volume));
    pairs.truncate(limit);
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::mock::MockExchange;

    fn ticker(symbol: &str, price: f64, change: f64, volume: f64) -> MarketTicker {
        MarketTicker {
            symbol: symbol.to_string(),
            price,
            change_24h: change,
            volume,
            high_24h: price * 1.1,
            low_24h: price * 0.9,
        }
    }

    #[test]
    fn test_potential_buckets() {
        assert_eq!(Potential::from_change(150.0), Potential::TenXPlus);
        assert_eq!(Potential::from_change(75.0), Potential::FiveToTenX);
        assert_eq!(Potential::from_change(25.0), Potential::TwoToFiveX);
        assert_eq!(Potential::from_change(20.0), Potential::OneToTwoX);
    }

    #[test]
    fn test_risk_levels() {
        assert_eq!(RiskLevel::from_volume(2_000_000.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_volume(500_000.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_volume(100_000.0), RiskLevel::High);
    }

    #[test]
    fn test_rank_by_volume_filters_quote() {
        let tickers = vec![
            ticker("BTCUSDT", 60_000.0, 1.0, 10_000.0),
            ticker("ETHBTC", 0.05, 1.0, 999_999.0),
            ticker("DOGEUSDT", 0.1, 5.0, 50_000_000.0),
            ticker("USDT", 1.0, 0.0, 1e12),
        ];
        let ranked = rank_by_volume(tickers, "USDT", 200);

        let symbols: Vec<&str> = ranked.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["DOGEUSDT", "BTCUSDT"]);

        let limited = rank_by_volume(ranked, "USDT", 1);
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_detect_explosive() {
        let scanner = MarketScanner::new(ScannerConfig::default(), Arc::new(MockExchange::new()));
        let coins = vec![
            ticker("AAAUSDT", 0.5, 30.0, 200_000.0),
            ticker("BBBUSDT", 0.2, 120.0, 5_000_000.0),
            ticker("CCCUSDT", 2.0, 80.0, 5_000_000.0),  // too expensive
            ticker("DDDUSDT", 0.3, 15.0, 5_000_000.0),  // too small a move
            ticker("EEEUSDT", 0.3, 60.0, 50_000.0),     // too illiquid
        ];

        let explosive = scanner.detect_explosive(&coins);
        assert_eq!(explosive.len(), 2);
        assert_eq!(explosive[0].ticker.symbol, "BBBUSDT");
        assert_eq!(explosive[0].potential, Potential::TenXPlus);
        assert_eq!(explosive[0].risk_level, RiskLevel::Low);
        assert_eq!(explosive[1].potential, Potential::TwoToFiveX);
        assert_eq!(explosive[1].risk_level, RiskLevel::Medium);
    }

    #[tokio::test]
    async fn test_top_coins_from_market() {
        let mock = MockExchange::new();
        mock.set_market_tickers(vec![
            ticker("BTCUSDT", 60_000.0, 1.0, 10_000.0),
            ticker("XRPUSDT", 0.5, 2.0, 90_000_000.0),
        ])
        .await;

        let scanner = MarketScanner::new(ScannerConfig::default(), Arc::new(mock));
        let coins = scanner.top_coins().await.unwrap();
        assert_eq!(coins[0].symbol, "XRPUSDT");
    }

    #[test]
    fn test_explosive_serializes_flat() {
        let coin = ExplosiveCoin {
            ticker: ticker("AAAUSDT", 0.5, 30.0, 200_000.0),
            potential: Potential::TwoToFiveX,
            risk_level: RiskLevel::Medium,
        };
        let json = serde_json::to_value(&coin).unwrap();
        assert_eq!(json["symbol"], "AAAUSDT");
        assert_eq!(json["potential"], "2x-5x");
        assert_eq!(json["riskLevel"], "MEDIUM");
    }
}
