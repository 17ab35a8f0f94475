use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use clap::Parser;
use futures::{SinkExt, StreamExt};
use signal_trader::{
    api,
    exchange::{binance::DEFAULT_BASE_URL, BinanceClient, MarketData, PaperBroker},
    execution::{TradingConfig, TradingController, TradingEvent},
    trading_core::{MarketScanner, ScannerConfig},
    AppState, ClientMessage, WsMessage,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::{broadcast, mpsc, watch};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Symbols to trade (comma-separated)
    #[arg(short, long, env = "TRADER_SYMBOLS", default_value = "BTCUSDT,ETHUSDT")]
    symbols: String,

    /// Port to run the web server on
    #[arg(short, long, env = "TRADER_PORT", default_value = "8000")]
    port: u16,

    /// Bar interval used for analysis
    #[arg(short, long, default_value = "1h")]
    timeframe: String,

    /// Seconds between trading ticks
    #[arg(long, default_value = "60")]
    tick_secs: u64,

    /// Timeout for every exchange call, in seconds
    #[arg(long, default_value = "10")]
    timeout_secs: u64,

    /// Starting quote balance of the paper broker
    #[arg(long, env = "PAPER_BALANCE", default_value = "10000")]
    balance: f64,

    /// Fraction of balance risked per trade
    #[arg(long, default_value = "0.02")]
    risk: f64,

    /// Start with order placement enabled
    #[arg(long)]
    enabled: bool,

    /// Binance REST base URL
    #[arg(long, env = "BINANCE_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("signal_trader=info".parse()?)
                .add_directive("tower_http=warn".parse()?),
        )
        .init();

    let args = Args::parse();

    let symbols: Vec<String> = args
        .symbols
        .split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();
    anyhow::ensure!(!symbols.is_empty(), "at least one symbol is required");

    let config = TradingConfig {
        symbols: symbols.clone(),
        timeframe: args.timeframe.clone(),
        risk_per_trade: args.risk,
        tick_interval: Duration::from_secs(args.tick_secs.max(1)),
        request_timeout: Duration::from_secs(args.timeout_secs.max(1)),
        start_enabled: args.enabled,
        ..Default::default()
    };

    info!("Starting Signal Trader");
    info!("Symbols: {}", symbols.join(", "));
    info!("Timeframe: {} | Tick: {:?}", config.timeframe, config.tick_interval);
    info!("Paper balance: {:.2} {}", args.balance, config.quote_currency);
    info!("Trading enabled: {}", config.start_enabled);

    let market: Arc<dyn MarketData> = Arc::new(
        BinanceClient::new(args.base_url.clone(), config.request_timeout)
            .context("Failed to build Binance client")?,
    );
    let broker = Arc::new(PaperBroker::new(market.clone(), &config.quote_currency, args.balance));

    let scanner = MarketScanner::new(
        ScannerConfig {
            quote_currency: config.quote_currency.clone(),
            ..Default::default()
        },
        market.clone(),
    );
    let controller = Arc::new(TradingController::new(config, market, broker));

    // Create broadcast channel for websocket clients
    let (tx, _rx) = broadcast::channel::<WsMessage>(1000);

    let state = Arc::new(AppState {
        controller: controller.clone(),
        scanner,
        tx: tx.clone(),
    });

    // Forward controller events to websocket clients
    let mut events = controller.subscribe();
    let tx_clone = tx.clone();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let msg = match event {
                        TradingEvent::Signal(signal) => WsMessage::Signal(signal),
                        TradingEvent::Execution(result) => WsMessage::Execution(result),
                        TradingEvent::PositionClosed(close) => WsMessage::PositionClosed(close),
                        TradingEvent::Stats(stats) => WsMessage::Stats(stats),
                    };
                    // No receivers is fine
                    let _ = tx_clone.send(msg);
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Event forwarder lagged, dropped {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Spawn trading loop
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let trading_task = tokio::spawn(controller.clone().run(shutdown_rx));

    // Build router
    let app = Router::new()
        .route("/status", get(api::get_status))
        .route("/api/signal/{symbol}", get(api::get_signal))
        .route("/api/stats", get(api::get_stats))
        .route("/api/positions", get(api::get_positions))
        .route("/api/history", get(api::get_history))
        .route("/api/trading/enabled", post(api::set_trading_enabled))
        .route("/api/market/top-coins", get(api::get_top_coins))
        .route("/api/market/explosive-coins", get(api::get_explosive_coins))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any).allow_methods(Any))
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Server running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown requested");
        })
        .await?;

    // The loop finishes any in-flight tick before exiting
    let _ = shutdown_tx.send(true);
    if let Err(e) = trading_task.await {
        error!("Trading loop panicked: {}", e);
    }

    info!("{:?}", controller.get_stats().await);
    Ok(())
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.tx.subscribe();

    // Replies to this client only
    let (reply_tx, mut reply_rx) = mpsc::channel::<WsMessage>(32);

    // Send current state to new client
    let symbols = state.controller.config().symbols.clone();
    let welcome = WsMessage::Connected { symbols };
    if let Ok(json) = serde_json::to_string(&welcome) {
        let _ = sender.send(Message::Text(json.into())).await;
    }

    // Spawn task to forward broadcast events and direct replies to this client
    let send_task = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                event = rx.recv() => match event {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("WebSocket client lagged, dropped {} events", n);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(msg) => msg,
                    None => break,
                },
            };

            if let Ok(json) = serde_json::to_string(&msg) {
                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    // Handle incoming messages from client
    let state_clone = state.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            let Message::Text(text) = msg else {
                continue;
            };
            let client_msg = match serde_json::from_str::<ClientMessage>(&text) {
                Ok(m) => m,
                Err(e) => {
                    let _ = reply_tx
                        .send(WsMessage::Error {
                            message: format!("invalid message: {}", e),
                        })
                        .await;
                    continue;
                }
            };

            let reply = api::handle_client_message(&state_clone, client_msg).await;

            if let Some(reply) = reply {
                if reply_tx.send(reply).await.is_err() {
                    break;
                }
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!("WebSocket client disconnected");
}
