//! Order side and broker receipts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Acknowledgement of a filled market order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderReceipt {
    /// Broker-assigned order ID
    pub order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    /// Filled amount in base units
    pub amount: f64,
    /// Average fill price
    pub fill_price: f64,
    pub filled_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposite_side() {
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
        assert_eq!(OrderSide::Sell.opposite(), OrderSide::Buy);
    }

    #[test]
    fn test_side_serializes_uppercase() {
        let json = serde_json::to_string(&OrderSide::Sell).unwrap();
        assert_eq!(json, "\"SELL\"");
        assert_eq!(OrderSide::Buy.to_string(), "BUY");
    }
}
