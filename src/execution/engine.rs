//! Trading controller - drives signal generation, sizing, execution and monitoring

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::config::TradingConfig;
use super::position::{CloseEvent, MonitorFailure, MonitorOutcome, Position, PositionManager, TradingStats};
use crate::error::{Result, TradingError};
use crate::exchange::{Broker, MarketData};
use crate::trading_core::{RiskSizer, SignalAction, SignalEngine, TradeSignal};

/// Run an external call under a deadline, mapping expiry to `TradingError::Timeout`
pub(crate) async fn with_timeout<T, F>(limit: Duration, operation: &str, symbol: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(TradingError::Timeout {
            operation: operation.to_string(),
            symbol: symbol.to_string(),
        }),
    }
}

/// Floor applied to the tick interval and request timeout
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Outcome status of an execution attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Success,
    Skipped,
    Failed,
}

/// Structured result of acting on one signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub symbol: String,
    pub action: SignalAction,
    pub reason: Option<String>,
    pub order_id: Option<String>,
    pub amount: Option<f64>,
    pub price: Option<f64>,
    pub position: Option<Position>,
    pub at: DateTime<Utc>,
}

impl ExecutionResult {
    fn without_order(status: ExecutionStatus, signal: &TradeSignal, reason: String) -> Self {
        Self {
            status,
            symbol: signal.symbol.clone(),
            action: signal.action,
            reason: Some(reason),
            order_id: None,
            amount: None,
            price: None,
            position: None,
            at: Utc::now(),
        }
    }

    fn skipped(signal: &TradeSignal, reason: &str) -> Self {
        Self::without_order(ExecutionStatus::Skipped, signal, reason.to_string())
    }

    fn failed(signal: &TradeSignal, reason: String) -> Self {
        Self::without_order(ExecutionStatus::Failed, signal, reason)
    }
}

/// Everything that happened during one tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickReport {
    pub signals: Vec<TradeSignal>,
    pub executions: Vec<ExecutionResult>,
    pub closed: Vec<CloseEvent>,
    pub failures: Vec<MonitorFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Events emitted by the controller
#[derive(Debug, Clone)]
pub enum TradingEvent {
    /// Signal generated for a watched symbol
    Signal(TradeSignal),
    /// Actionable signal was executed, skipped or failed
    Execution(ExecutionResult),
    /// Position closed on stop-loss or take-profit
    PositionClosed(CloseEvent),
    /// Statistics after a tick
    Stats(TradingStats),
}

/// Trading controller orchestrates the signal → size → order → position pipeline
pub struct TradingController {
    config: TradingConfig,
    market: Arc<dyn MarketData>,
    broker: Arc<dyn Broker>,
    engine: SignalEngine,
    sizer: RiskSizer,
    positions: Mutex<PositionManager>,
    enabled: AtomicBool,
    tick_lock: Mutex<()>,
    event_tx: broadcast::Sender<TradingEvent>,
}

impl TradingController {
    /// Create a new controller
    pub fn new(mut config: TradingConfig, market: Arc<dyn MarketData>, broker: Arc<dyn Broker>) -> Self {
        // tokio::time::interval panics on a zero period
        if config.tick_interval < MIN_PERIOD || config.request_timeout < MIN_PERIOD {
            warn!(
                "tick_interval {:?} / request_timeout {:?} raised to at least {:?}",
                config.tick_interval, config.request_timeout, MIN_PERIOD
            );
            config.tick_interval = config.tick_interval.max(MIN_PERIOD);
            config.request_timeout = config.request_timeout.max(MIN_PERIOD);
        }
        if !config.has_enough_bars() {
            warn!(
                "bar_limit {} is below the slow window {}; every signal will HOLD",
                config.bar_limit, config.signal.slow_period
            );
        }

        let (event_tx, _) = broadcast::channel(1000);

        Self {
            engine: SignalEngine::new(config.signal.clone()),
            sizer: config.risk_sizer(),
            enabled: AtomicBool::new(config.start_enabled),
            config,
            market,
            broker,
            positions: Mutex::new(PositionManager::new()),
            tick_lock: Mutex::new(()),
            event_tx,
        }
    }

    /// Subscribe to controller events
    pub fn subscribe(&self) -> broadcast::Receiver<TradingEvent> {
        self.event_tx.subscribe()
    }

    /// Get current config
    pub fn config(&self) -> &TradingConfig {
        &self.config
    }

    /// Enable or disable order placement
    pub fn set_enabled(&self, enabled: bool) {
        let previous = self.enabled.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            info!("Trading {}", if enabled { "enabled" } else { "disabled" });
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Fetch bars and analyze a symbol; failures become a low-confidence HOLD
    pub async fn get_signal(&self, symbol: &str) -> TradeSignal {
        let series = with_timeout(
            self.config.request_timeout,
            "fetch_series",
            symbol,
            self.market.fetch_series(symbol, &self.config.timeframe, self.config.bar_limit),
        )
        .await;

        match series {
            Ok(bars) => self.engine.analyze(symbol, &bars),
            Err(e) => {
                if e.is_recoverable() {
                    warn!("Error in market analysis for {}: {}", symbol, e);
                } else {
                    error!("Error in market analysis for {}: {}", symbol, e);
                }
                TradeSignal::fallback(symbol, 0.0, format!("Error: {}", e))
            }
        }
    }

    /// Act on a signal: size it, place the entry order and register the position
    pub async fn execute_signal(&self, signal: &TradeSignal) -> ExecutionResult {
        if !self.is_enabled() {
            return ExecutionResult::skipped(signal, "Trading disabled");
        }
        let Some(side) = signal.action.side() else {
            return ExecutionResult::skipped(signal, "HOLD signal");
        };

        let timeout = self.config.request_timeout;
        let balances = match with_timeout(timeout, "fetch_balance", &signal.symbol, self.broker.fetch_balance()).await {
            Ok(balances) => balances,
            Err(e) => return ExecutionResult::failed(signal, e.to_string()),
        };

        let balance = balances.get(&self.config.quote_currency).copied().unwrap_or(0.0);
        if balance < self.config.min_balance {
            return ExecutionResult::failed(
                signal,
                format!(
                    "Insufficient balance: {:.2} {} (minimum {:.2})",
                    balance, self.config.quote_currency, self.config.min_balance
                ),
            );
        }

        let size = self.sizer.size(signal, balance);
        if size <= 0.0 {
            return ExecutionResult::failed(signal, "Invalid position size".to_string());
        }
        if let Err(e) = PositionManager::validate_entry(signal, size) {
            return ExecutionResult::failed(signal, e.to_string());
        }

        let receipt = match with_timeout(
            timeout,
            "place_market_order",
            &signal.symbol,
            self.broker.place_market_order(&signal.symbol, side, size),
        )
        .await
        {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!("Order for {} {} failed: {}", side, signal.symbol, e);
                return ExecutionResult::failed(signal, e.to_string());
            }
        };

        let position = match self.positions.lock().await.open(signal, size) {
            Ok(position) => position,
            Err(e) => {
                // validate_entry passed, so this only fires if the rules diverge
                error!("Order {} filled but position not recorded: {}", receipt.order_id, e);
                return ExecutionResult::failed(signal, e.to_string());
            }
        };

        info!(
            "Signal executed: {} {:.6} {} @ {:.4} (order {})",
            side, size, signal.symbol, signal.price, receipt.order_id
        );

        ExecutionResult {
            status: ExecutionStatus::Success,
            symbol: signal.symbol.clone(),
            action: signal.action,
            reason: None,
            order_id: Some(receipt.order_id),
            amount: Some(size),
            price: Some(signal.price),
            position: Some(position),
            at: Utc::now(),
        }
    }

    /// Run one monitoring pass over the open positions
    pub async fn monitor(&self) -> MonitorOutcome {
        let mut positions = self.positions.lock().await;
        positions
            .monitor(self.market.as_ref(), self.broker.as_ref(), self.config.request_timeout)
            .await
    }

    /// Snapshot of open positions
    pub async fn positions(&self) -> Vec<Position> {
        self.positions.lock().await.positions().to_vec()
    }

    /// Snapshot of the close history, oldest first
    pub async fn history(&self) -> Vec<CloseEvent> {
        self.positions.lock().await.history().iter().cloned().collect()
    }

    /// Get aggregate statistics
    pub async fn get_stats(&self) -> TradingStats {
        self.positions.lock().await.stats(self.is_enabled())
    }

    async fn process_symbol(&self, symbol: &str) -> (TradeSignal, Option<ExecutionResult>) {
        let signal = self.get_signal(symbol).await;
        debug!(
            "{}: {} (confidence {:.2}) - {}",
            symbol, signal.action, signal.confidence, signal.reason
        );
        let _ = self.event_tx.send(TradingEvent::Signal(signal.clone()));

        if !self.is_enabled() || !signal.is_actionable() {
            return (signal, None);
        }

        let result = self.execute_signal(&signal).await;
        let _ = self.event_tx.send(TradingEvent::Execution(result.clone()));
        (signal, Some(result))
    }

    /// One full pass: analyze every watched symbol, execute if enabled, then monitor
    pub async fn tick(&self) -> TickReport {
        let _guard = self.tick_lock.lock().await;
        let started_at = Utc::now();

        let results = join_all(self.config.symbols.iter().map(|s| self.process_symbol(s))).await;

        let mut signals = Vec::with_capacity(results.len());
        let mut executions = Vec::new();
        for (signal, execution) in results {
            signals.push(signal);
            executions.extend(execution);
        }

        // Existing exposure is tracked even while new entries are paused
        let outcome = self.monitor().await;
        for event in &outcome.closed {
            let _ = self.event_tx.send(TradingEvent::PositionClosed(event.clone()));
        }

        let _ = self.event_tx.send(TradingEvent::Stats(self.get_stats().await));

        TickReport {
            signals,
            executions,
            closed: outcome.closed,
            failures: outcome.failures,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Tick on the configured interval until `shutdown` flips to true
    ///
    /// The stop signal is only observed between ticks, so an in-flight tick
    /// always completes its order placement and bookkeeping.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Trading loop started: {} symbols every {:?} (trading {})",
            self.config.symbols.len(),
            self.config.tick_interval,
            if self.is_enabled() { "enabled" } else { "disabled" }
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            if *shutdown.borrow() {
                break;
            }

            let report = self.tick().await;
            let executed = report
                .executions
                .iter()
                .filter(|e| e.status == ExecutionStatus::Success)
                .count();
            info!(
                "Tick complete: {} signals, {} executed, {} closed, {} failures",
                report.signals.len(),
                executed,
                report.closed.len(),
                report.failures.len()
            );
            info!("{}", self.positions.lock().await.stats_summary());
        }

        info!("Trading loop stopped");
    }
}
