//! In-memory collaborators for engine tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::AppError;
use crate::fees::tests::{raw, FakeSchedule};
use crate::market::MarketData;
use crate::models::PriceTick;
use crate::state::{build_state, SharedState};
use crate::store::MemoryHistoryStore;

/// Parks `price_tick` calls: each call signals `entered`, then waits for
/// `release` before answering.
#[derive(Default)]
pub struct TickGate {
    pub entered: Notify,
    pub release: Notify,
}

/// Scriptable price feed.  Symbols without a scripted quote fail the request.
#[derive(Default)]
pub struct FakeMarket {
    quotes: Mutex<HashMap<String, (String, String)>>,
    symbols: Mutex<Vec<String>>,
    gate: Mutex<Option<Arc<TickGate>>>,
    pub tick_calls: AtomicUsize,
}

impl FakeMarket {
    pub fn quote(&self, symbol: &str, last: &str, mark: &str) {
        self.quotes
            .lock()
            .unwrap()
            .insert(symbol.to_string(), (last.to_string(), mark.to_string()));
    }

    pub fn drop_quote(&self, symbol: &str) {
        self.quotes.lock().unwrap().remove(symbol);
    }

    pub fn list(&self, symbols: &[&str]) {
        *self.symbols.lock().unwrap() = symbols.iter().map(|s| s.to_string()).collect();
    }

    pub fn hold_ticks(&self) -> Arc<TickGate> {
        let gate = Arc::new(TickGate::default());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }
}

#[async_trait]
impl MarketData for FakeMarket {
    async fn current_symbol_list(&self, limit: usize) -> Result<Vec<String>, AppError> {
        let symbols = self.symbols.lock().unwrap();
        if symbols.is_empty() {
            return Err(AppError::MarketData("exchange info unavailable".into()));
        }
        Ok(symbols.iter().take(limit).cloned().collect())
    }

    async fn price_tick(&self, symbol: &str) -> Result<PriceTick, AppError> {
        self.tick_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        self.quotes
            .lock()
            .unwrap()
            .get(symbol)
            .map(|(last, mark)| PriceTick::new(symbol, last.clone(), mark.clone()))
            .ok_or_else(|| AppError::MarketData(format!("{symbol} unreachable")))
    }
}

pub struct Harness {
    pub state: SharedState,
    pub market: Arc<FakeMarket>,
    pub schedule: Arc<FakeSchedule>,
    pub store: Arc<MemoryHistoryStore>,
}

/// BTCUSDT / ETHUSDT at maker 0.0002, taker 0.0004; empty history.
pub fn harness() -> Harness {
    let market = Arc::new(FakeMarket::default());
    let schedule = FakeSchedule::with(&[
        ("BTCUSDT", raw(0.0002, 0.0004)),
        ("ETHUSDT", raw(0.0002, 0.0004)),
    ]);
    let store = Arc::new(MemoryHistoryStore::new());
    let state = build_state(market.clone(), schedule.clone(), store.clone(), Vec::new(), "BTCUSDT");

    Harness { state, market, schedule, store }
}
