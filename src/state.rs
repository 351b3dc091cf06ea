//! # state
//!
//! `AppState` — the ledger handle plus the collaborators every operation
//! needs, shared by the update cycle, the symbol refresher and every Axum
//! handler.
//!
//! ## Single writer
//!
//! The [`Ledger`] sits behind one `tokio::sync::Mutex`.  The update cycle and
//! user operations (submit / cancel / close) serialise on it, and the guard is
//! held across the history write of a close so that "persist + remove" is one
//! unit.  Price fetches happen *outside* the guard; whoever re-acquires it
//! re-validates against the current ledger.

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Mutex, RwLock};

use crate::events::DeskEvent;
use crate::fees::FeeResolver;
use crate::ledger::Ledger;
use crate::market::{FeeSchedule, MarketData};
use crate::models::{HistoryRecord, PriceTick};
use crate::store::HistoryStore;

// ─── AppState ─────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    // ── Core ──────────────────────────────────────────────────────────────────
    /// Positions, pending orders and history.  Only mutated through the
    /// `Ledger` API while holding this lock.
    pub ledger: Arc<Mutex<Ledger>>,

    // ── Collaborators ─────────────────────────────────────────────────────────
    pub market: Arc<dyn MarketData>,
    pub fees:   Arc<FeeResolver>,
    pub store:  Arc<dyn HistoryStore>,

    // ── Monitor / WebSocket ───────────────────────────────────────────────────
    /// Pre-serialised `DeskEvent` JSON for WebSocket clients.
    pub broadcast_tx: broadcast::Sender<String>,

    // ── Symbol selection ──────────────────────────────────────────────────────
    pub current_symbol: Arc<RwLock<String>>,
    pub symbols:        Arc<RwLock<Vec<String>>>,
    /// Last raw quote seen per symbol.
    pub last_ticks:     Arc<RwLock<HashMap<String, PriceTick>>>,

    // ── Metrics ───────────────────────────────────────────────────────────────
    pub cycle_count: Arc<AtomicU64>,
    pub fill_count:  Arc<AtomicU64>,
    pub started_at:  DateTime<Utc>,
}

impl AppState {
    pub fn new(
        market: Arc<dyn MarketData>,
        fee_schedule: Arc<dyn FeeSchedule>,
        store: Arc<dyn HistoryStore>,
        history: Vec<HistoryRecord>,
        default_symbol: &str,
    ) -> Self {
        let (broadcast_tx, _) = broadcast::channel(256);

        Self {
            ledger:         Arc::new(Mutex::new(Ledger::with_history(history))),
            market,
            fees:           Arc::new(FeeResolver::new(fee_schedule)),
            store,
            broadcast_tx,
            current_symbol: Arc::new(RwLock::new(default_symbol.to_string())),
            symbols:        Arc::new(RwLock::new(Vec::new())),
            last_ticks:     Arc::new(RwLock::new(HashMap::new())),
            cycle_count:    Arc::new(AtomicU64::new(0)),
            fill_count:     Arc::new(AtomicU64::new(0)),
            started_at:     Utc::now(),
        }
    }

    // ── Helper Methods ────────────────────────────────────────────────────────

    /// Send to every WebSocket client.  No listeners is not an error.
    pub fn broadcast(&self, event: &DeskEvent) {
        let _ = self.broadcast_tx.send(event.to_json());
    }

    /// Broadcast a fresh copy of the ledger.
    pub async fn publish_snapshot(&self) {
        let snapshot = self.ledger.lock().await.snapshot();
        self.broadcast(&DeskEvent::snapshot(snapshot));
    }

    pub async fn current_symbol(&self) -> String {
        self.current_symbol.read().await.clone()
    }

    /// The current symbol first, then every symbol with an open position or a
    /// pending order.
    pub async fn watched_symbols(&self) -> Vec<String> {
        let mut symbols = vec![self.current_symbol().await];
        for symbol in self.ledger.lock().await.active_symbols() {
            if !symbols.contains(&symbol) {
                symbols.push(symbol);
            }
        }
        symbols
    }
}

/// Convenience type alias
pub type SharedState = Arc<AppState>;

pub fn build_state(
    market: Arc<dyn MarketData>,
    fee_schedule: Arc<dyn FeeSchedule>,
    store: Arc<dyn HistoryStore>,
    history: Vec<HistoryRecord>,
    default_symbol: &str,
) -> SharedState {
    Arc::new(AppState::new(market, fee_schedule, store, history, default_symbol))
}
