//! Fixed-fractional position sizing

use serde::{Deserialize, Serialize};

use super::signal::TradeSignal;

/// Sizes entries so that a stop-out loses at most `risk_fraction` of the balance
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskSizer {
    /// Fraction of balance at risk per trade (0.02 = 2%)
    pub risk_fraction: f64,
    /// Hard cap on position size in base units
    pub max_position_size: f64,
}

impl Default for RiskSizer {
    fn default() -> Self {
        Self {
            risk_fraction: 0.02,
            max_position_size: 1000.0,
        }
    }
}

impl RiskSizer {
    pub fn new(risk_fraction: f64, max_position_size: f64) -> Self {
        Self {
            risk_fraction,
            max_position_size,
        }
    }

    /// Position size for a signal given the available balance
    ///
    /// Returns 0 for HOLD or degenerate signals (no stop distance) and for
    /// non-finite inputs. Never negative, never above `max_position_size`.
    pub fn size(&self, signal: &TradeSignal, balance: f64) -> f64 {
        let risk_amount = balance * self.risk_fraction;
        let price_distance = (signal.price - signal.stop_loss).abs();

        if price_distance == 0.0 || !price_distance.is_finite() || !risk_amount.is_finite() {
            return 0.0;
        }

        let size = (risk_amount / price_distance).min(self.max_position_size);
        if size.is_finite() && size > 0.0 {
            size
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trading_core::signal::{IndicatorSnapshot, SignalAction};
    use chrono::Utc;

    fn signal(action: SignalAction, price: f64, stop_loss: f64) -> TradeSignal {
        TradeSignal {
            symbol: "BTCUSDT".to_string(),
            action,
            confidence: 0.5,
            price,
            stop_loss,
            take_profit: 0.0,
            generated_at: Utc::now(),
            reason: String::new(),
            indicators: IndicatorSnapshot::default(),
        }
    }

    #[test]
    fn test_fixed_fractional_size() {
        let sizer = RiskSizer::default();
        let size = sizer.size(&signal(SignalAction::Buy, 100.0, 95.0), 1000.0);
        // risk 20 / distance 5
        assert!((size - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_size_capped() {
        let sizer = RiskSizer::new(0.02, 3.0);
        let size = sizer.size(&signal(SignalAction::Buy, 100.0, 95.0), 1000.0);
        assert_eq!(size, 3.0);
    }

    #[test]
    fn test_hold_signal_sizes_zero() {
        let sizer = RiskSizer::default();
        assert_eq!(sizer.size(&signal(SignalAction::Hold, 0.0, 0.0), 1000.0), 0.0);
        assert_eq!(sizer.size(&signal(SignalAction::Buy, 100.0, 100.0), 1000.0), 0.0);
    }

    #[test]
    fn test_sell_side_distance() {
        let sizer = RiskSizer::default();
        let size = sizer.size(&signal(SignalAction::Sell, 100.0, 105.0), 1000.0);
        assert!((size - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_never_negative_or_above_cap() {
        let balances = [-500.0, 0.0, 1.0, 1_000.0, 1e12];
        let fractions = [-0.5, 0.0, 0.02, 1.0, 50.0];
        let stops = [1e-9, 0.5, 5.0, 99.0];

        for cap in [0.5, 10.0, 1000.0] {
            let sizer_caps = RiskSizer::new(0.0, cap);
            for &balance in &balances {
                for &fraction in &fractions {
                    let sizer = RiskSizer { risk_fraction: fraction, ..sizer_caps };
                    for &stop in &stops {
                        let s = sizer.size(&signal(SignalAction::Buy, 100.0, 100.0 - stop), balance);
                        assert!(s >= 0.0);
                        assert!(s <= cap);
                    }
                }
            }
        }
    }

    #[test]
    fn test_non_finite_inputs() {
        let sizer = RiskSizer::default();
        assert_eq!(sizer.size(&signal(SignalAction::Buy, f64::NAN, 95.0), 1000.0), 0.0);
        assert_eq!(sizer.size(&signal(SignalAction::Buy, 100.0, 95.0), f64::INFINITY), 0.0);
    }
}
