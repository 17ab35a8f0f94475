//! Position management and P&L tracking

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::engine::with_timeout;
use super::order::OrderSide;
use crate::error::{Result, TradingError};
use crate::exchange::{Broker, MarketData};
use crate::trading_core::TradeSignal;

/// Why a position was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseReason {
    StopLoss,
    TakeProfit,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StopLoss => write!(f, "STOP_LOSS"),
            Self::TakeProfit => write!(f, "TAKE_PROFIT"),
        }
    }
}

/// Open position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub symbol: String,
    pub side: OrderSide,
    /// Base units, always > 0
    pub amount: f64,
    pub entry_price: f64,
    pub current_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Unrealized P&L in quote currency
    pub pnl: f64,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    /// P&L at `price`
    pub fn pnl_at(&self, price: f64) -> f64 {
        match self.side {
            OrderSide::Buy => (price - self.entry_price) * self.amount,
            OrderSide::Sell => (self.entry_price - price) * self.amount,
        }
    }

    /// Mark the position to `price`
    pub fn update_price(&mut self, price: f64) {
        self.current_price = price;
        self.pnl = self.pnl_at(price);
    }

    /// Boundary crossed at the current price, stop-loss first
    pub fn exit_trigger(&self) -> Option<CloseReason> {
        let price = self.current_price;
        let (stop_hit, target_hit) = match self.side {
            OrderSide::Buy => (price <= self.stop_loss, price >= self.take_profit),
            OrderSide::Sell => (price >= self.stop_loss, price <= self.take_profit),
        };

        if stop_hit {
            Some(CloseReason::StopLoss)
        } else if target_hit {
            Some(CloseReason::TakeProfit)
        } else {
            None
        }
    }
}

/// Terminal record of a closed position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseEvent {
    pub position_id: Uuid,
    pub symbol: String,
    pub side: OrderSide,
    pub reason: CloseReason,
    pub entry_price: f64,
    pub exit_price: f64,
    pub amount: f64,
    /// Realized P&L in quote currency
    pub pnl: f64,
    /// Closing order ID
    pub order_id: String,
    pub closed_at: DateTime<Utc>,
}

/// A symbol or position the monitoring pass could not process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorFailure {
    pub symbol: String,
    /// Set when the failure concerns a single position (closing order)
    pub position_id: Option<Uuid>,
    pub error: String,
}

/// Result of one monitoring pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorOutcome {
    pub closed: Vec<CloseEvent>,
    pub failures: Vec<MonitorFailure>,
}

/// Aggregate statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingStats {
    /// Number of open positions
    pub total_trades: usize,
    pub active_positions: usize,
    /// Unrealized P&L across open positions
    pub total_pnl: f64,
    /// Share of open positions in profit, 0 with no positions
    pub win_rate: f64,
    pub trading_enabled: bool,
    /// Closed positions kept in the in-memory history
    pub closed_trades: usize,
    pub realized_pnl: f64,
    pub realized_win_rate: f64,
    pub last_update: DateTime<Utc>,
}

/// Position manager owns open positions and the close history
#[derive(Debug)]
pub struct PositionManager {
    /// Open positions
    positions: Vec<Position>,

    /// Completed trade history
    history: VecDeque<CloseEvent>,

    /// Max history to keep
    max_history: usize,
}

impl Default for PositionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionManager {
    /// Create a new position manager
    pub fn new() -> Self {
        Self {
            positions: Vec::new(),
            history: VecDeque::new(),
            max_history: 1000,
        }
    }

    /// Open positions
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Get open position by ID
    pub fn get(&self, id: &Uuid) -> Option<&Position> {
        self.positions.iter().find(|p| &p.id == id)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Closed positions, oldest first
    pub fn history(&self) -> &VecDeque<CloseEvent> {
        &self.history
    }

    /// Check that a signal and size can open a position, returning the entry side
    pub fn validate_entry(signal: &TradeSignal, size: f64) -> Result<OrderSide> {
        if !(size.is_finite() && size > 0.0) {
            return Err(TradingError::InvalidSize(size));
        }

        let side = signal.action.side().ok_or_else(|| {
            TradingError::InvalidParameter(format!("cannot open a position from a {} signal", signal.action))
        })?;

        let price = signal.price;
        let bounded = match side {
            OrderSide::Buy => signal.stop_loss < price && price < signal.take_profit,
            OrderSide::Sell => signal.take_profit < price && price < signal.stop_loss,
        };
        if !bounded {
            return Err(TradingError::InvalidParameter(format!(
                "{} {}: stop {:.4} and target {:.4} must straddle entry {:.4}",
                side, signal.symbol, signal.stop_loss, signal.take_profit, price
            )));
        }

        Ok(side)
    }

    /// Open a position from an actionable signal
    pub fn open(&mut self, signal: &TradeSignal, size: f64) -> Result<Position> {
        let side = Self::validate_entry(signal, size)?;
        let price = signal.price;

        let position = Position {
            id: Uuid::new_v4(),
            symbol: signal.symbol.clone(),
            side,
            amount: size,
            entry_price: price,
            current_price: price,
            stop_loss: signal.stop_loss,
            take_profit: signal.take_profit,
            pnl: 0.0,
            opened_at: Utc::now(),
        };

        info!(
            "Position opened: {} {} {:.6} @ {:.4} | Stop: {:.4} | Target: {:.4}",
            position.side, position.symbol, position.amount, position.entry_price,
            position.stop_loss, position.take_profit
        );

        self.positions.push(position.clone());
        Ok(position)
    }

    /// Mark every position on `symbol` to `price`, returning those that crossed a boundary
    pub fn apply_price(&mut self, symbol: &str, price: f64) -> Vec<(Uuid, CloseReason)> {
        self.positions
            .iter_mut()
            .filter(|p| p.symbol == symbol)
            .filter_map(|p| {
                p.update_price(price);
                p.exit_trigger().map(|reason| (p.id, reason))
            })
            .collect()
    }

    /// Remove a position and record its close; `None` if it is no longer open
    fn record_close(&mut self, id: &Uuid, reason: CloseReason, order_id: String) -> Option<CloseEvent> {
        let index = self.positions.iter().position(|p| &p.id == id)?;
        let position = self.positions.remove(index);

        let event = CloseEvent {
            position_id: position.id,
            symbol: position.symbol,
            side: position.side,
            reason,
            entry_price: position.entry_price,
            exit_price: position.current_price,
            amount: position.amount,
            pnl: position.pnl,
            order_id,
            closed_at: Utc::now(),
        };

        self.history.push_back(event.clone());
        if self.history.len() > self.max_history {
            self.history.pop_front();
        }

        Some(event)
    }

    /// Mark all positions to market and close those past stop-loss or take-profit
    ///
    /// Prices are fetched once per symbol, concurrently. A symbol whose fetch
    /// fails or times out is reported and its positions stay open until the
    /// next pass. A rejected closing order likewise leaves the position open.
    pub async fn monitor(
        &mut self,
        market: &dyn MarketData,
        broker: &dyn Broker,
        timeout: Duration,
    ) -> MonitorOutcome {
        let mut outcome = MonitorOutcome::default();
        if self.positions.is_empty() {
            return outcome;
        }

        let symbols: BTreeSet<String> = self.positions.iter().map(|p| p.symbol.clone()).collect();

        let fetches = symbols.iter().map(|symbol| async move {
            let ticker = with_timeout(timeout, "fetch_ticker", symbol, market.fetch_ticker(symbol)).await;
            (symbol.clone(), ticker)
        });
        let prices: HashMap<String, Result<f64>> = join_all(fetches)
            .await
            .into_iter()
            .map(|(symbol, ticker)| (symbol, ticker.map(|t| t.last_price)))
            .collect();

        let mut triggered = Vec::new();
        for (symbol, price) in prices {
            match price {
                Ok(price) => triggered.extend(self.apply_price(&symbol, price)),
                Err(e) => {
                    warn!("Error monitoring positions for {}: {}", symbol, e);
                    outcome.failures.push(MonitorFailure {
                        symbol,
                        position_id: None,
                        error: e.to_string(),
                    });
                }
            }
        }

        for (id, reason) in triggered {
            let Some(position) = self.get(&id).cloned() else {
                continue;
            };

            let exit_side = position.side.opposite();
            let order = with_timeout(
                timeout,
                "place_market_order",
                &position.symbol,
                broker.place_market_order(&position.symbol, exit_side, position.amount),
            )
            .await;

            match order {
                Ok(receipt) => {
                    if let Some(event) = self.record_close(&id, reason, receipt.order_id) {
                        info!(
                            "{} hit on {} {} @ {:.4}: P&L {:.4}",
                            reason, event.side, event.symbol, event.exit_price, event.pnl
                        );
                        outcome.closed.push(event);
                    }
                }
                Err(e) => {
                    warn!("Failed to close {} {} ({}): {}", position.side, position.symbol, reason, e);
                    outcome.failures.push(MonitorFailure {
                        symbol: position.symbol,
                        position_id: Some(id),
                        error: e.to_string(),
                    });
                }
            }
        }

        debug!(
            "Monitor pass: {} open, {} closed, {} failures",
            self.positions.len(),
            outcome.closed.len(),
            outcome.failures.len()
        );

        outcome
    }

    /// Unrealized P&L across open positions
    pub fn unrealized_pnl(&self) -> f64 {
        self.positions.iter().map(|p| p.pnl).sum()
    }

    /// Realized P&L across the close history
    pub fn realized_pnl(&self) -> f64 {
        self.history.iter().map(|e| e.pnl).sum()
    }

    /// Get statistics
    pub fn stats(&self, trading_enabled: bool) -> TradingStats {
        let open = self.positions.len();
        let winning = self.positions.iter().filter(|p| p.pnl > 0.0).count();
        let win_rate = if open == 0 { 0.0 } else { winning as f64 / open as f64 };

        let closed = self.history.len();
        let realized_wins = self.history.iter().filter(|e| e.pnl > 0.0).count();
        let realized_win_rate = if closed == 0 {
            0.0
        } else {
            realized_wins as f64 / closed as f64
        };

        TradingStats {
            total_trades: open,
            active_positions: open,
            total_pnl: self.unrealized_pnl(),
            win_rate,
            trading_enabled,
            closed_trades: closed,
            realized_pnl: self.realized_pnl(),
            realized_win_rate,
            last_update: Utc::now(),
        }
    }

    /// Get statistics summary
    pub fn stats_summary(&self) -> String {
        let stats = self.stats(false);
        format!(
            "Open: {} | Unrealized: {:.2} | Closed: {} | Realized: {:.2} | WR: {:.1}%",
            stats.active_positions,
            stats.total_pnl,
            stats.closed_trades,
            stats.realized_pnl,
            stats.realized_win_rate * 100.0
        )
    }
}
