//! Moving-average crossover signal engine
//!
//! Produces one BUY/SELL/HOLD decision per analysis call from the latest bar
//! of an OHLCV series:
//! - BUY when the fast SMA is above the slow SMA and RSI is not overbought
//! - SELL when the fast SMA is below the slow SMA and RSI is not oversold
//! - HOLD otherwise, or when the series is too short to decide

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::indicators::{self, MACD_FAST, MACD_SIGNAL, MACD_SLOW, RSI_PERIOD};
use crate::error::{Result, TradingError};
use crate::execution::OrderSide;
use crate::types::{closes, PriceBar};

/// Signal decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
}

impl SignalAction {
    /// Order side for actionable signals
    pub fn side(&self) -> Option<OrderSide> {
        match self {
            Self::Buy => Some(OrderSide::Buy),
            Self::Sell => Some(OrderSide::Sell),
            Self::Hold => None,
        }
    }
}

impl std::fmt::Display for SignalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Hold => write!(f, "HOLD"),
        }
    }
}

/// Indicator readings at the bar the decision was taken on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub sma_fast: Option<f64>,
    pub sma_slow: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
}

/// Trading signal emitted by the engine, consumed once by the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub symbol: String,
    pub action: SignalAction,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Latest close
    pub price: f64,
    /// Zero for HOLD
    pub stop_loss: f64,
    /// Zero for HOLD
    pub take_profit: f64,
    pub generated_at: DateTime<Utc>,
    pub reason: String,
    #[serde(default)]
    pub indicators: IndicatorSnapshot,
}

impl TradeSignal {
    /// HOLD signal used when analysis could not run
    pub fn fallback(symbol: &str, price: f64, reason: String) -> Self {
        Self {
            symbol: symbol.to_string(),
            action: SignalAction::Hold,
            confidence: FALLBACK_CONFIDENCE,
            price,
            stop_loss: 0.0,
            take_profit: 0.0,
            generated_at: Utc::now(),
            reason,
            indicators: IndicatorSnapshot::default(),
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.action != SignalAction::Hold
    }
}

/// Confidence assigned to HOLD signals produced from a failed analysis
pub const FALLBACK_CONFIDENCE: f64 = 0.1;

/// Configuration for the crossover strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Fast SMA window (default: 20)
    pub fast_period: usize,
    /// Slow SMA window (default: 50)
    pub slow_period: usize,
    /// RSI lookback (default: 14)
    pub rsi_period: usize,
    /// BUY is suppressed at or above this RSI
    pub rsi_overbought: f64,
    /// SELL is suppressed at or below this RSI
    pub rsi_oversold: f64,
    /// Upper bound on crossover confidence
    pub max_confidence: f64,
    /// Confidence for a neutral HOLD
    pub hold_confidence: f64,
    /// Stop distance as a fraction of price (0.05 = 5%)
    pub stop_loss_pct: f64,
    /// Target distance as a fraction of price (0.08 = 8%)
    pub take_profit_pct: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            fast_period: 20,
            slow_period: 50,
            rsi_period: RSI_PERIOD,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            max_confidence: 0.8,
            hold_confidence: 0.5,
            stop_loss_pct: 0.05,
            take_profit_pct: 0.08,
        }
    }
}

/// Stateless signal engine
#[derive(Debug, Clone, Default)]
pub struct SignalEngine {
    config: SignalConfig,
}

impl SignalEngine {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Analyze a bar series, falling back to a low-confidence HOLD on failure
    pub fn analyze(&self, symbol: &str, bars: &[PriceBar]) -> TradeSignal {
        match self.evaluate(symbol, bars) {
            Ok(signal) => signal,
            Err(e) => {
                debug!("{}: analysis failed, holding: {}", symbol, e);
                let price = bars.last().map(|b| b.close).unwrap_or(0.0);
                TradeSignal::fallback(symbol, price, format!("Error: {}", e))
            }
        }
    }

    /// Analyze a bar series, surfacing `InsufficientData` when it is too short
    pub fn evaluate(&self, symbol: &str, bars: &[PriceBar]) -> Result<TradeSignal> {
        let close = closes(bars);

        let fast_ma = indicators::moving_average(&close, self.config.fast_period)?;
        let slow_ma = indicators::moving_average(&close, self.config.slow_period)?;
        let rsi = indicators::rsi(&close, self.config.rsi_period)?;

        let (Some(fast), Some(slow), Some(r)) = (
            indicators::latest(&fast_ma),
            indicators::latest(&slow_ma),
            indicators::latest(&rsi),
        ) else {
            return Err(TradingError::InsufficientData {
                required: self.config.slow_period.max(self.config.rsi_period + 1),
                available: close.len(),
            });
        };

        let price = close[close.len() - 1];

        let macd = indicators::macd(&close, MACD_FAST, MACD_SLOW, MACD_SIGNAL)
            .ok()
            .and_then(|m| m.last());
        let snapshot = IndicatorSnapshot {
            sma_fast: Some(fast),
            sma_slow: Some(slow),
            rsi: Some(r),
            macd: macd.map(|(m, _, _)| m),
            macd_signal: macd.map(|(_, s, _)| s),
            macd_histogram: macd.map(|(_, _, h)| h),
        };

        Ok(self.decide(symbol, fast, slow, r, price, snapshot))
    }

    /// Apply the crossover rule to precomputed indicator values
    pub fn decide(
        &self,
        symbol: &str,
        fast: f64,
        slow: f64,
        rsi: f64,
        price: f64,
        indicators: IndicatorSnapshot,
    ) -> TradeSignal {
        let cfg = &self.config;

        let (action, confidence, stop_loss, take_profit, reason) =
            if fast > slow && rsi < cfg.rsi_overbought {
                (
                    SignalAction::Buy,
                    cfg.max_confidence.min((fast - slow) / slow),
                    price * (1.0 - cfg.stop_loss_pct),
                    price * (1.0 + cfg.take_profit_pct),
                    format!("Uptrend: SMA{} above SMA{}, RSI {:.1}", cfg.fast_period, cfg.slow_period, rsi),
                )
            } else if fast < slow && rsi > cfg.rsi_oversold {
                (
                    SignalAction::Sell,
                    cfg.max_confidence.min((slow - fast) / fast),
                    price * (1.0 + cfg.stop_loss_pct),
                    price * (1.0 - cfg.take_profit_pct),
                    format!("Downtrend: SMA{} below SMA{}, RSI {:.1}", cfg.fast_period, cfg.slow_period, rsi),
                )
            } else {
                (
                    SignalAction::Hold,
                    cfg.hold_confidence,
                    0.0,
                    0.0,
                    format!("Neutral: no clear crossover signal, RSI {:.1}", rsi),
                )
            };

        TradeSignal {
            symbol: symbol.to_string(),
            action,
            confidence: confidence.clamp(0.0, 1.0),
            price,
            stop_loss,
            take_profit,
            generated_at: Utc::now(),
            reason,
            indicators,
        }
    }
}
