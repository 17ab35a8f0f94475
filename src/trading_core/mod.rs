//! Trading Core - strategy logic shared by the controller and the web server
//!
//! This module contains the core trading strategy components:
//! - Technical indicators (SMA, RSI, EMA, MACD)
//! - Moving-average crossover signal engine
//! - Risk-based position sizing
//! - Market scanner for high-volume and high-momentum coins

pub mod indicators;
pub mod signal;
pub mod risk;
pub mod scanner;

// Re-export commonly used types
pub use signal::{IndicatorSnapshot, SignalAction, SignalConfig, SignalEngine, TradeSignal};
pub use risk::RiskSizer;
pub use scanner::{ExplosiveCoin, MarketScanner, Potential, RiskLevel, ScannerConfig};
