//! Error taxonomy for the trading core

use thiserror::Error;

/// Errors raised by indicators, the signal engine, the position manager
/// and the exchange boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TradingError {
    /// Not enough bars for the requested indicator window
    #[error("insufficient data: need {required} values, got {available}")]
    InsufficientData { required: usize, available: usize },

    /// Market data could not be fetched for a symbol
    #[error("market data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Exchange (or paper broker) refused an order
    #[error("order rejected for {symbol}: {reason}")]
    OrderRejected { symbol: String, reason: String },

    /// Position size must be strictly positive
    #[error("invalid position size: {0}")]
    InvalidSize(f64),

    /// External call exceeded its deadline
    #[error("{operation} timed out for {symbol}")]
    Timeout { operation: String, symbol: String },

    /// Bad indicator window or malformed signal
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl TradingError {
    /// True for failures at the exchange boundary that are retried on the next tick
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DataUnavailable { .. } | Self::OrderRejected { .. } | Self::Timeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, TradingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = TradingError::InsufficientData { required: 50, available: 12 };
        assert_eq!(err.to_string(), "insufficient data: need 50 values, got 12");

        let err = TradingError::Timeout {
            operation: "fetch_ticker".to_string(),
            symbol: "BTCUSDT".to_string(),
        };
        assert_eq!(err.to_string(), "fetch_ticker timed out for BTCUSDT");
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(TradingError::DataUnavailable {
            symbol: "ETHUSDT".into(),
            reason: "502".into()
        }
        .is_recoverable());
        assert!(!TradingError::InvalidSize(0.0).is_recoverable());
        assert!(!TradingError::InsufficientData { required: 1, available: 0 }.is_recoverable());
    }
}
