//! Append-only event ledger
//!
//! One immutable record per trade-state change. The segment file is the
//! source of truth for every reconstruction; corrections are compensating
//! events, never edits.

pub mod atomic;
pub mod event;
pub mod store;

pub use atomic::write_atomic;
pub use event::{EventType, TradeEvent};
pub use store::EventLogStore;
