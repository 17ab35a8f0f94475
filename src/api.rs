use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::execution::{CloseEvent, Position};
use crate::trading_core::ExplosiveCoin;
use crate::types::{AppState, ClientMessage, MarketTicker, WsMessage};

/// Response for positions list
#[derive(Serialize)]
pub struct PositionsResponse {
    pub positions: Vec<Position>,
    pub total: usize,
}

/// Response for closed positions
#[derive(Serialize)]
pub struct HistoryResponse {
    pub closed: Vec<CloseEvent>,
    pub total: usize,
}

/// Response for top coins list
#[derive(Serialize)]
pub struct TopCoinsResponse {
    pub coins: Vec<MarketTicker>,
    pub total: usize,
}

/// Response for explosive coins list
#[derive(Serialize)]
pub struct ExplosiveCoinsResponse {
    pub coins: Vec<ExplosiveCoin>,
    pub total: usize,
}

/// Body for the trading toggle
#[derive(Debug, Deserialize)]
pub struct TradingToggle {
    pub enabled: bool,
}

/// GET /status - Liveness and controller state
pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "running",
            "trading_enabled": state.controller.is_enabled(),
            "symbols": state.controller.config().symbols,
            "timestamp": Utc::now(),
        })),
    )
}

/// GET /api/signal/{symbol} - Analyze one symbol on demand
pub async fn get_signal(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> impl IntoResponse {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() || !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": format!("invalid symbol: {:?}", symbol)})),
        );
    }

    let signal = state.controller.get_signal(&symbol).await;
    (StatusCode::OK, Json(serde_json::json!(signal)))
}

/// GET /api/stats - Aggregate stats
pub async fn get_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.controller.get_stats().await;
    (StatusCode::OK, Json(serde_json::json!(stats)))
}

/// GET /api/positions - Open positions
pub async fn get_positions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let positions = state.controller.positions().await;
    let total = positions.len();
    (
        StatusCode::OK,
        Json(serde_json::json!(PositionsResponse { positions, total })),
    )
}

/// GET /api/history - Closed positions, oldest first
pub async fn get_history(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let closed = state.controller.history().await;
    let total = closed.len();
    (
        StatusCode::OK,
        Json(serde_json::json!(HistoryResponse { closed, total })),
    )
}

/// POST /api/trading/enabled - Toggle order placement
pub async fn set_trading_enabled(
    State(state): State<Arc<AppState>>,
    Json(toggle): Json<TradingToggle>,
) -> impl IntoResponse {
    state.controller.set_enabled(toggle.enabled);
    (
        StatusCode::OK,
        Json(serde_json::json!({"trading_enabled": state.controller.is_enabled()})),
    )
}

/// GET /api/market/top-coins - Highest-volume coins in the scanner's quote currency
pub async fn get_top_coins(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.scanner.top_coins().await {
        Ok(coins) => {
            let total = coins.len();
            (
                StatusCode::OK,
                Json(serde_json::json!(TopCoinsResponse { coins, total })),
            )
        }
        Err(e) => {
            warn!("Error fetching top coins: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({"error": e.to_string()})),
            )
        }
    }
}

/// GET /api/market/explosive-coins - Top coins with strong 24h momentum
pub async fn get_explosive_coins(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.scanner.top_coins().await {
        Ok(top) => {
            let coins = state.scanner.detect_explosive(&top);
            let total = coins.len();
            (
                StatusCode::OK,
                Json(serde_json::json!(ExplosiveCoinsResponse { coins, total })),
            )
        }
        Err(e) => {
            warn!("Error detecting explosive coins: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({"error": e.to_string()})),
            )
        }
    }
}

/// Answer a WebSocket client request; the reply goes to that client only
pub async fn handle_client_message(state: &AppState, msg: ClientMessage) -> Option<WsMessage> {
    match msg.action.as_str() {
        "set_trading" => {
            if let Some(enabled) = msg.enabled {
                state.controller.set_enabled(enabled);
            }
            None
        }
        "get_signal" => match msg.symbol {
            Some(symbol) => Some(WsMessage::Signal(
                state.controller.get_signal(&symbol.trim().to_uppercase()).await,
            )),
            None => Some(WsMessage::Error {
                message: "get_signal requires a symbol".to_string(),
            }),
        },
        "get_stats" => Some(WsMessage::Stats(state.controller.get_stats().await)),
        other => Some(WsMessage::Error {
            message: format!("unknown action: {}", other),
        }),
    }
}
