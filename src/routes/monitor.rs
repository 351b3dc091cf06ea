//! # routes::monitor
//!
//! **Monitor** — real-time stream and read-only views for the dashboard.
//!
//! ## Endpoints
//!
//! | Method    | Path             | Description                                  |
//! |-----------|------------------|----------------------------------------------|
//! | GET (WS)  | `/ws/monitor`    | WebSocket `DeskEvent` stream                 |
//! | GET       | `/api/snapshot`  | Positions + pending orders + history         |
//! | GET       | `/api/history`   | Closed trades, oldest first                  |
//! | GET       | `/api/stats`     | Cycle / fill counters, uptime, realised PnL  |

use std::sync::atomic::Ordering;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tracing::{debug, info};

use crate::{events::DeskEvent, state::SharedState};

// ─── WebSocket Handler ────────────────────────────────────────────────────────

/// Upgrade to a WebSocket and forward every broadcast `DeskEvent`.
pub async fn ws_monitor(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    // Subscribe before reading the ledger so nothing falls between the two.
    let mut rx = state.broadcast_tx.subscribe();
    let (mut sender, mut receiver) = socket.split();

    info!("🔌 WebSocket client connected");

    // ── Send the current ledger as soon as the client connects ───────────────
    let snapshot = DeskEvent::snapshot(state.ledger.lock().await.snapshot()).to_json();
    if sender.send(Message::Text(snapshot)).await.is_err() {
        return; // Client left before the snapshot went out
    }

    // ── Event Loop ────────────────────────────────────────────────────────────
    loop {
        tokio::select! {
            // Broadcast event → forward to this client
            result = rx.recv() => {
                match result {
                    Ok(json_str) => {
                        if sender.send(Message::Text(json_str)).await.is_err() {
                            break; // Client disconnected
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        // Slow reader: some events dropped, the next SNAPSHOT catches it up
                        debug!("WS client lagged, skipped {n} events");
                    }
                    Err(_) => break, // Channel closed
                }
            }

            // Client frames (Ping / Close)
            result = receiver.next() => {
                match result {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sender.send(Message::Pong(data)).await;
                    }
                    _ => {} // Text/Binary from the client is ignored
                }
            }
        }
    }

    info!("🔌 WebSocket client disconnected");
}

// ─── REST Endpoints ───────────────────────────────────────────────────────────

/// GET /api/snapshot
pub async fn get_snapshot(State(state): State<SharedState>) -> impl IntoResponse {
    let snapshot = state.ledger.lock().await.snapshot();
    Json(json!({
        "ok":        true,
        "positions": snapshot.positions,
        "orders":    snapshot.orders,
        "history":   snapshot.history,
    }))
}

/// GET /api/history
pub async fn get_history(State(state): State<SharedState>) -> impl IntoResponse {
    let history = state.ledger.lock().await.history();
    Json(json!({
        "ok":      true,
        "count":   history.len(),
        "records": history,
    }))
}

/// GET /api/stats
pub async fn get_stats(State(state): State<SharedState>) -> impl IntoResponse {
    // ── Ledger totals under one lock ─────────────────────────────────────────
    let (open_positions, pending_orders, closed_trades, realized_net_pnl, unrealized_net_pnl) = {
        let ledger = state.ledger.lock().await;
        let history = ledger.history();
        let positions = ledger.open_positions();
        (
            positions.len(),
            ledger.pending_orders().len(),
            history.len(),
            history.iter().map(|r| r.net_pnl).sum::<f64>(),
            positions.iter().map(|p| p.net_pnl).sum::<f64>(),
        )
    };

    Json(json!({
        "ok":                 true,
        "cycle_count":        state.cycle_count.load(Ordering::Relaxed),
        "fill_count":         state.fill_count.load(Ordering::Relaxed),
        "uptime_secs":        (Utc::now() - state.started_at).num_seconds(),
        "current_symbol":     state.current_symbol().await,
        "open_positions":     open_positions,
        "pending_orders":     pending_orders,
        "closed_trades":      closed_trades,
        "realized_net_pnl":   realized_net_pnl,
        "unrealized_net_pnl": unrealized_net_pnl,
        "fee_rates":          state.fees.cached().await,
    }))
}
