//! # Paperdesk — Paper Futures Trading Backend
//!
//! ```text
//!  ┌──────────────┐  ticker/price · premiumIndex  ┌──────────────────────────┐
//!  │ Binance fapi │ ─────────────────────────────▶│ AppState                 │
//!  └──────────────┘  exchangeInfo · commission    │ ├─ Mutex<Ledger>         │
//!                                                 │ ├─ FeeResolver           │
//!  ┌──────────────┐  POST /api/orders/*           │ ├─ HistoryStore (sqlite) │
//!  │  Dashboard   │ ─────────────────────────────▶│ └─ broadcast_tx ───────┐ │
//!  │              │ ◀──── ws://host/ws/monitor ───└────────────────────────┘─┘
//!  └──────────────┘
//! ```
//!
//! ## Environment Variables
//!
//! | Variable              | Default                    | Description                         |
//! |-----------------------|----------------------------|-------------------------------------|
//! | `BIND_ADDR`           | `0.0.0.0:3000`             | Address Axum listens on             |
//! | `DATABASE_URL`        | `sqlite://trades.db`       | Trade history, or `memory`          |
//! | `BINANCE_FAPI_URL`    | `https://fapi.binance.com` | Futures REST base                   |
//! | `BINANCE_API_KEY`     | -                          | Signed commission-rate lookups      |
//! | `BINANCE_API_SECRET`  | -                          |                                     |
//! | `DEFAULT_SYMBOL`      | `BTCUSDT`                  | Symbol before the first list fetch  |
//! | `FETCH_INTERVAL_MS`   | `500`                      | Price / matching cycle period       |
//! | `SYMBOL_REFRESH_SECS` | `600`                      | Symbol-list refresh period          |
//! | `SYMBOL_LIMIT`        | `30`                       | Symbols kept from exchangeInfo      |
//! | `API_KEY`             | -                          | Required `X-API-Key` when set       |
//! | `RUST_LOG`            | `paperdesk=debug`          | Tracing filter                      |

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use paperdesk::{
    auth::ApiKey,
    config::{Config, StorageBackend},
    engine::cycle::{refresh_symbols, run_price_loop, run_symbol_refresh},
    market::binance::BinanceFutures,
    routes::router,
    state::build_state,
    store::{HistoryStore, MemoryHistoryStore, SqliteHistoryStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Load .env ──────────────────────────────────────────────────────────
    dotenvy::dotenv().ok();

    // ── 2. Structured logging ─────────────────────────────────────────────────
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("paperdesk=debug".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    info!(r#"

  ╔═══════════════════════════════════════════════════════╗
  ║            PAPERDESK — Paper Futures Desk             ║
  ║   Ledger · Matching · Fees · History · Monitor        ║
  ╚═══════════════════════════════════════════════════════╝"#);

    let config = Config::from_env().context("Failed to load configuration")?;

    // ── 3. History store ──────────────────────────────────────────────────────
    let store: Arc<dyn HistoryStore> = match &config.storage {
        StorageBackend::Sqlite(url) => Arc::new(
            SqliteHistoryStore::connect(url)
                .await
                .with_context(|| format!("Failed to open trade history at {url}"))?,
        ),
        StorageBackend::Memory => {
            warn!("DATABASE_URL=memory, closed trades will not survive a restart");
            Arc::new(MemoryHistoryStore::new())
        }
    };
    let history = store
        .load_all_trades()
        .await
        .context("Failed to load trade history")?;
    info!(trades = history.len(), "📚 trade history loaded");

    // ── 4. Market data / fee schedule ─────────────────────────────────────────
    if config.binance_creds.is_none() {
        warn!("BINANCE_API_KEY/SECRET not set, default commission rates will be used");
    }
    let client = reqwest::Client::builder()
        .user_agent(concat!("paperdesk/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    let binance = Arc::new(BinanceFutures::new(client, &config.binance_url, config.binance_creds.clone()));

    // ── 5. Shared state ───────────────────────────────────────────────────────
    let state = build_state(binance.clone(), binance, store, history, &config.default_symbol);

    match refresh_symbols(&state, config.symbol_limit).await {
        Ok(symbols) => {
            let current = state.current_symbol().await;
            info!(count = symbols.len(), current = %current, "symbol list loaded");
        }
        Err(e) => warn!(error = %e, "initial symbol list unavailable, continuing with {}", config.default_symbol),
    }

    // ── 6. Background loops ───────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let price_loop = tokio::spawn(run_price_loop(state.clone(), config.fetch_interval, shutdown_rx.clone()));
    let symbol_loop = tokio::spawn(run_symbol_refresh(
        state.clone(),
        config.symbol_refresh,
        config.symbol_limit,
        shutdown_rx,
    ));

    // ── 7. Bind & Serve ───────────────────────────────────────────────────────
    let app = router(state, ApiKey::new(config.api_key.clone()));

    info!(addr = ?config.bind_addr, "🚀 Paperdesk server starting");
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("🛑 shutdown requested");
        })
        .await?;

    // Loops finish their current cycle before exiting.
    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(price_loop, symbol_loop);
    info!("👋 Paperdesk stopped");

    Ok(())
}
