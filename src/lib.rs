// Library crate - exports the trading core, exchange adapters and web API

pub mod types;
pub mod error;
pub mod api;
pub mod exchange;
pub mod trading_core;
pub mod execution;

// Re-export commonly used types
pub use types::*;
pub use error::{Result, TradingError};
