//! Domain models shared across the paper desk.

pub mod order;
pub mod position;
pub mod tick;

pub use order::{Order, Side};
pub use position::{CloseReason, HistoryRecord, LedgerSnapshot, Position};
pub use tick::PriceTick;
