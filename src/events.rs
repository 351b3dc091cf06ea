//! # events
//!
//! Defines [`DeskEvent`] — every event the desk broadcasts to the monitor
//! WebSocket.
//!
//! Uses `tokio::sync::broadcast::Sender<String>`: events are serialised to a
//! JSON string before sending, which keeps the channel free of Clone bounds on
//! the payload types.

use serde::Serialize;

use crate::models::{HistoryRecord, LedgerSnapshot, Order, Position};

/// Everything the dashboard receives in real time.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeskEvent {
    /// Latest raw quote of a watched symbol.
    Prices {
        symbol: String,
        last:   String,
        mark:   String,
    },

    /// Tradable symbol list refreshed.
    SymbolsUpdated {
        symbols: Vec<String>,
        current: String,
    },

    /// A resting order was queued (entry or exit).
    OrderPlaced {
        order: Box<Order>,
    },

    OrderCancelled {
        order_id: String,
    },

    /// Market order filled immediately at the taker rate.
    PositionOpened {
        position: Box<Position>,
    },

    /// A resting entry order was reached by price and became a position.
    OrderFilled {
        order_id: String,
        position: Box<Position>,
    },

    /// A position left the open set (market close or exit order fill).
    PositionClosed {
        record: Box<HistoryRecord>,
    },

    /// Full read-only copy of the ledger, sent after every mutation.
    Snapshot {
        positions: Vec<Position>,
        orders:    Vec<Order>,
        history:   Vec<HistoryRecord>,
    },
}

impl DeskEvent {
    pub fn snapshot(snapshot: LedgerSnapshot) -> Self {
        DeskEvent::Snapshot {
            positions: snapshot.positions,
            orders:    snapshot.orders,
            history:   snapshot.history,
        }
    }

    /// Convert to a JSON string for the WebSocket.
    #[inline]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"event":"SERIALIZATION_ERROR"}"#.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_are_tagged() {
        let json = DeskEvent::OrderCancelled { order_id: "BTCUSDT-00aa11".into() }.to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["event"], "ORDER_CANCELLED");
        assert_eq!(value["order_id"], "BTCUSDT-00aa11");
    }

    #[test]
    fn test_snapshot_carries_all_collections() {
        let json = DeskEvent::snapshot(LedgerSnapshot::default()).to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["event"], "SNAPSHOT");
        assert!(value["positions"].as_array().unwrap().is_empty());
        assert!(value["orders"].as_array().unwrap().is_empty());
        assert!(value["history"].as_array().unwrap().is_empty());
    }
}
