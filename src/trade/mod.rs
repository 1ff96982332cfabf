//! Trade lifecycle
//!
//! Each trade is a uniquely identified entity whose mutations emit exactly
//! one ledger event apiece. The in-memory projection is derived by folding
//! the trade's own events; the ledger stays the source of truth and the
//! per-trade JSON cache is merely a fast-lookup materialization.

pub mod cache;
pub mod entity;
pub mod types;

pub use cache::TradeCache;
pub use entity::TradeEntity;
pub use types::{TradeAction, TradeObject, TradeStatus};
