//! Immutable trade event records

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of state change an event records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Entry booked: opens the trade and any initial inventory
    Open,
    /// Broker execution (entry confirmation or reduction)
    Fill,
    /// Stop-loss moved
    StopUpdate,
    /// Exit order submitted
    Exit,
    /// Order cancelled before completion; reverses booked inventory
    Cancel,
    /// Broker sync marker, no position impact
    RefreshSync,
}

/// One immutable record in the event ledger.
///
/// Once appended it is never mutated or deleted; the `seq` number is
/// assigned by the store at append time and breaks timestamp ties so
/// replay order is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub event_id: Uuid,
    pub trade_id: Uuid,
    pub ticker: String,
    pub event_type: EventType,
    /// Signed inventory change: + opens/builds, - reduces
    pub quantity_delta: Decimal,
    /// Execution/booking price for inventory events, zero otherwise
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    /// Stop price carried by OPEN (initial) and STOP_UPDATE events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broker_order_id: Option<String>,
    /// Monotone per-store sequence number, assigned at append
    #[serde(default)]
    pub seq: u64,
}

impl TradeEvent {
    /// Build an event stamped now. The store assigns `seq` on append.
    pub fn record(
        trade_id: Uuid,
        ticker: impl Into<String>,
        event_type: EventType,
        quantity_delta: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            trade_id,
            ticker: ticker.into(),
            event_type,
            quantity_delta,
            price,
            timestamp: Utc::now(),
            stop_price: None,
            broker_order_id: None,
            seq: 0,
        }
    }

    pub fn with_stop(mut self, stop_price: Option<Decimal>) -> Self {
        self.stop_price = stop_price;
        self
    }

    pub fn with_broker_order(mut self, broker_order_id: Option<String>) -> Self {
        self.broker_order_id = broker_order_id;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Whether the event changes inventory (and therefore cash)
    pub fn moves_inventory(&self) -> bool {
        self.quantity_delta != Decimal::ZERO
    }

    /// Signed cash impact: buys consume cash, sells return it
    pub fn cash_delta(&self) -> Decimal {
        -(self.quantity_delta * self.price)
    }
}
