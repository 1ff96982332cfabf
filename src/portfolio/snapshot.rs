//! Portfolio snapshot value objects

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::broker::BrokerOrder;

/// Which event horizon a snapshot was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotMode {
    /// Events at or before an explicit cutoff; no broker contact
    Historical,
    /// Full log plus live marks and broker-owned active orders
    Live,
}

/// One ticker's aggregated holding at the snapshot instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioPosition {
    pub ticker: String,
    pub quantity: Decimal,
    /// Weighted average open price of the remaining lots
    pub avg_cost: Decimal,
    /// None = mark unavailable; the position is still reported at cost
    pub current_mark: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
    /// Marked value when a mark exists, cost basis otherwise
    pub market_value: Decimal,
}

/// Why a ticker's row is degraded rather than fully valued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueKind {
    /// No usable mark (missing, failed, or timed out)
    MarkUnavailable,
    /// A reduction exceeded the open lot inventory during replay
    LotDeficit,
    /// The broker could not serve the active-order overlay
    OrdersUnavailable,
}

/// Structured degradation report attached to a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotIssue {
    pub kind: IssueKind,
    pub ticker: String,
    pub detail: String,
}

/// Computed portfolio state as of a cutoff. Immutable once produced; a
/// reconstruction with the same log and cutoff yields an identical value
/// (live mark data aside).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub as_of: DateTime<Utc>,
    pub mode: SnapshotMode,
    pub cash: Decimal,
    pub equity: Decimal,
    pub realized_pnl_to_date: Decimal,
    /// Ordered by ticker for deterministic output
    pub positions: Vec<PortfolioPosition>,
    /// Broker-owned transient state; populated in LIVE mode only
    pub active_orders: Vec<BrokerOrder>,
    pub issues: Vec<SnapshotIssue>,
}

impl PortfolioSnapshot {
    pub fn total_unrealized_pnl(&self) -> Decimal {
        self.positions
            .iter()
            .filter_map(|p| p.unrealized_pnl)
            .sum()
    }

    pub fn position(&self, ticker: &str) -> Option<&PortfolioPosition> {
        self.positions.iter().find(|p| p.ticker == ticker)
    }
}
