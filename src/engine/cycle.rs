//! # engine::cycle
//!
//! **Update Cycle** — the periodic driver.
//!
//! ```text
//! every FETCH_INTERVAL_MS:
//!   for symbol in current ∪ symbols with positions/orders
//!     price_tick ──▶ PRICES event
//!       last valid → matching::evaluate → fill events
//!       mark valid → ledger.refresh_unrealized
//!     SNAPSHOT event
//!
//! every SYMBOL_REFRESH_SECS:
//!   current_symbol_list(limit) ──▶ SYMBOLS_UPDATED event
//! ```
//!
//! Errors never end a loop.  A failed or unusable tick skips that symbol's
//! mutations for this cycle; the next cycle retries.  Shutdown is observed
//! only between cycles.

use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::engine::matching;
use crate::error::AppError;
use crate::events::DeskEvent;
use crate::state::SharedState;

/// One pass over every watched symbol.
pub async fn run_cycle(state: &SharedState) {
    for symbol in state.watched_symbols().await {
        if let Err(e) = process_symbol(state, &symbol).await {
            warn!(symbol = %symbol, error = %e, "⚠️ tick skipped");
        }
    }
    state.cycle_count.fetch_add(1, Ordering::Relaxed);
}

async fn process_symbol(state: &SharedState, symbol: &str) -> Result<(), AppError> {
    let tick = state.market.price_tick(symbol).await?;

    state.broadcast(&DeskEvent::Prices {
        symbol: tick.symbol.clone(),
        last:   tick.last.clone(),
        mark:   tick.mark.clone(),
    });
    state.last_ticks.write().await.insert(symbol.to_string(), tick.clone());

    let last = tick.last_price();
    let mark = tick.mark_price();

    {
        let mut ledger = state.ledger.lock().await;

        match &last {
            Ok(price) => {
                let fills =
                    matching::evaluate(&mut ledger, symbol, *price, &state.fees, state.store.as_ref()).await;
                for fill in &fills {
                    state.broadcast(&DeskEvent::from(fill));
                }
                state.fill_count.fetch_add(fills.len() as u64, Ordering::Relaxed);
            }
            Err(e) => debug!(symbol, error = %e, "no last price, matching skipped"),
        }

        match &mark {
            Ok(price) => {
                ledger.refresh_unrealized(symbol, *price);
            }
            Err(e) => debug!(symbol, error = %e, "no mark price, pnl refresh skipped"),
        }
    }

    state.publish_snapshot().await;

    // Surface the first unusable price so the caller logs the skip.
    last.and(mark).map(|_| ())
}

/// Drive [`run_cycle`] every `interval` until `shutdown` flips to `true`.
pub async fn run_price_loop(state: SharedState, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    info!(interval = ?interval, "📈 price loop started");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => run_cycle(&state).await,
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
        if *shutdown.borrow() {
            break;
        }
    }
    info!("📈 price loop stopped");
}

// ─── Symbol list ──────────────────────────────────────────────────────────────

/// Reload the tradable symbols.  If the current symbol is no longer listed,
/// the first listed one replaces it.
pub async fn refresh_symbols(state: &SharedState, limit: usize) -> Result<Vec<String>, AppError> {
    let symbols = state.market.current_symbol_list(limit).await?;
    if symbols.is_empty() {
        return Err(AppError::MarketData("symbol list came back empty".into()));
    }

    let current = {
        let mut current = state.current_symbol.write().await;
        if !symbols.contains(&*current) {
            info!(from = %current.as_str(), to = %symbols[0], "current symbol delisted, switching");
            *current = symbols[0].clone();
        }
        current.clone()
    };
    *state.symbols.write().await = symbols.clone();

    state.broadcast(&DeskEvent::SymbolsUpdated { symbols: symbols.clone(), current });
    Ok(symbols)
}

pub async fn run_symbol_refresh(
    state: SharedState,
    every: Duration,
    limit: usize,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(every) => {
                match refresh_symbols(&state, limit).await {
                    Ok(symbols) => debug!(count = symbols.len(), "symbol list refreshed"),
                    Err(e) => error!(error = %e, "❌ symbol refresh failed, keeping previous list"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
        if *shutdown.borrow() {
            break;
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testkit::harness;
    use crate::engine::trading::{submit_limit_order, submit_market_order, QtyMode};
    use crate::models::Side;
    use crate::store::HistoryStore;

    #[tokio::test]
    async fn test_unavailable_last_price_leaves_orders_untouched() {
        let h = harness();
        let order = submit_limit_order(&h.state, "BTCUSDT", Side::Buy, 1.0, QtyMode::Coin, 50_000.0)
            .await
            .unwrap();
        h.market.quote("BTCUSDT", "n/a", "49000");

        run_cycle(&h.state).await;

        let ledger = h.state.ledger.lock().await;
        assert_eq!(ledger.pending_orders(), vec![order]);
        assert!(ledger.open_positions().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_mark_keeps_previous_pnl() {
        let h = harness();
        let pos = submit_market_order(&h.state, "BTCUSDT", Side::Buy, 1.0, QtyMode::Coin, Some(50_000.0))
            .await
            .unwrap();

        h.market.quote("BTCUSDT", "50500", "50500");
        run_cycle(&h.state).await;
        let marked = h.state.ledger.lock().await.position(&pos.id).unwrap().pnl;
        assert!((marked - 500.0).abs() < 1e-9);

        h.market.quote("BTCUSDT", "52000", "n/a");
        run_cycle(&h.state).await;
        assert_eq!(h.state.ledger.lock().await.position(&pos.id).unwrap().pnl, marked);
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_symbol_and_loop_continues() {
        let h = harness();
        submit_limit_order(&h.state, "ETHUSDT", Side::Sell, 1.0, QtyMode::Coin, 3_000.0)
            .await
            .unwrap();
        h.market.drop_quote("BTCUSDT");
        h.market.quote("ETHUSDT", "3010", "3005");

        run_cycle(&h.state).await;

        let ledger = h.state.ledger.lock().await;
        assert!(ledger.pending_orders().is_empty());
        assert_eq!(ledger.open_positions()[0].entry_price, 3_000.0);
        assert_eq!(h.state.cycle_count.load(Ordering::Relaxed), 1);
        assert_eq!(h.state.fill_count.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_exit_fill_persists_history() {
        let h = harness();
        let pos = submit_market_order(&h.state, "BTCUSDT", Side::Buy, 1.0, QtyMode::Coin, Some(50_000.0))
            .await
            .unwrap();
        crate::engine::trading::place_exit_order(&h.state, &pos.id, 51_000.0).await.unwrap();

        h.market.quote("BTCUSDT", "51000", "50990");
        let mut rx = h.state.broadcast_tx.subscribe();
        run_cycle(&h.state).await;

        let stored = h.store.load_all_trades().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, pos.id);
        assert!(h.state.ledger.lock().await.open_positions().is_empty());

        let events: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert!(events[0].contains("\"PRICES\""));
        assert!(events.iter().any(|e| e.contains("\"POSITION_CLOSED\"")));
        assert!(events.last().unwrap().contains("\"SNAPSHOT\""));
    }

    #[tokio::test]
    async fn test_refresh_replaces_delisted_current_symbol() {
        let h = harness();
        h.market.list(&["ETHUSDT", "SOLUSDT", "XRPUSDT"]);

        let symbols = refresh_symbols(&h.state, 2).await.unwrap();

        assert_eq!(symbols, vec!["ETHUSDT", "SOLUSDT"]);
        assert_eq!(h.state.current_symbol().await, "ETHUSDT");
        assert_eq!(*h.state.symbols.read().await, symbols);
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_previous_list() {
        let h = harness();
        *h.state.symbols.write().await = vec!["BTCUSDT".into()];

        assert!(refresh_symbols(&h.state, 30).await.is_err());
        assert_eq!(*h.state.symbols.read().await, vec!["BTCUSDT".to_string()]);
        assert_eq!(h.state.current_symbol().await, "BTCUSDT");
    }

    #[tokio::test]
    async fn test_price_loop_stops_on_shutdown() {
        let h = harness();
        h.market.quote("BTCUSDT", "50000", "50000");
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(run_price_loop(h.state.clone(), Duration::from_millis(5), rx));
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(h.state.cycle_count.load(Ordering::Relaxed) >= 1);
    }
}
