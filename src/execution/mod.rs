//! Execution module for signal-driven trading
//!
//! This module turns trading signals into orders and tracks the
//! resulting positions until a stop-loss or take-profit closes them.

mod config;
mod order;
mod position;
mod engine;

pub use config::TradingConfig;
pub use order::{OrderReceipt, OrderSide};
pub use position::{
    CloseEvent, CloseReason, MonitorFailure, MonitorOutcome, Position, PositionManager, TradingStats,
};
pub use engine::{ExecutionResult, ExecutionStatus, TickReport, TradingController, TradingEvent};
