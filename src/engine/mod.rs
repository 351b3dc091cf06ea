//! # engine
//!
//! - [`matching`] — resting orders vs. last-traded price
//! - [`trading`]  — caller-facing order / close operations
//! - [`cycle`]    — periodic price loop and symbol-list refresh

pub mod cycle;
pub mod matching;
pub mod trading;

#[cfg(test)]
pub(crate) mod testkit;
