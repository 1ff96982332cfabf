//! Point-in-time portfolio reconstruction
//!
//! Replays the immutable event ledger into consistent snapshots of cash,
//! positions, P&L, and (in live mode) broker-owned open orders.

pub mod display;
pub mod engine;
pub mod snapshot;

pub use display::{SnapshotFormatter, TradesFormatter};
pub use engine::{ReconstructionEngine, TickerFilter};
pub use snapshot::{
    IssueKind, PortfolioPosition, PortfolioSnapshot, SnapshotIssue, SnapshotMode,
};
