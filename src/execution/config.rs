//! Configuration for the trading controller

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::trading_core::{RiskSizer, SignalConfig};

/// Configuration for the trading controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Symbols watched on every tick (e.g., "BTCUSDT")
    pub symbols: Vec<String>,

    /// Currency balances are checked in (e.g., "USDT")
    pub quote_currency: String,

    /// Bar interval requested from the market data source (e.g., "1h")
    pub timeframe: String,

    /// Number of bars fetched per analysis
    pub bar_limit: usize,

    /// Fraction of balance risked per trade (0.02 = 2%)
    pub risk_per_trade: f64,

    /// Maximum position size in base units
    pub max_position_size: f64,

    /// Minimum quote balance required to open a position
    pub min_balance: f64,

    /// Time between ticks
    #[serde(with = "duration_secs")]
    pub tick_interval: Duration,

    /// Deadline for every external call
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,

    /// Whether order placement starts enabled
    pub start_enabled: bool,

    /// Strategy parameters
    pub signal: SignalConfig,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
            quote_currency: "USDT".to_string(),
            timeframe: "1h".to_string(),
            bar_limit: 100,
            risk_per_trade: 0.02,
            max_position_size: 1000.0,
            min_balance: 10.0,
            tick_interval: Duration::from_secs(60),
            request_timeout: Duration::from_secs(10),
            start_enabled: false,
            signal: SignalConfig::default(),
        }
    }
}

impl TradingConfig {
    /// Risk sizer configured from this config
    pub fn risk_sizer(&self) -> RiskSizer {
        RiskSizer::new(self.risk_per_trade, self.max_position_size)
    }

    /// Check that enough bars are requested for the slowest indicator
    pub fn has_enough_bars(&self) -> bool {
        self.bar_limit >= self.signal.slow_period.max(self.signal.rsi_period + 1)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        if !(secs.is_finite() && secs > 0.0) {
            return Err(serde::de::Error::custom("duration must be a positive number of seconds"));
        }
        Ok(Duration::from_secs_f64(secs))
    }
}
