//! Broker capability port
//!
//! The core never owns a broker connection; it receives a `BrokerPort` at
//! construction and calls it for marks, live orders, and order routing.
//! Every call may fail independently and must not be assumed fast.

pub mod paper;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::TradeError;

pub use paper::PaperBroker;

/// Order request handed to the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTicket {
    /// Trade id the order belongs to, echoed back in broker state
    pub order_ref: Uuid,
    pub ticker: String,
    /// Signed: + buys, - sells
    pub quantity: Decimal,
    /// None means market
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
}

/// Broker-side view of a resting order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerOrder {
    pub broker_order_id: String,
    pub ticker: String,
    pub quantity: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_ref: Option<Uuid>,
    pub placed_at: DateTime<Utc>,
}

/// Capability interface to the brokerage.
///
/// Implementations must be safe to share across tasks; the reconstruction
/// engine calls `get_marks` concurrently per ticker.
#[async_trait]
pub trait BrokerPort: Send + Sync {
    /// Current marks for the given tickers. Partial results are allowed;
    /// a missing ticker means "mark unavailable", not an error.
    async fn get_marks(
        &self,
        tickers: &[String],
    ) -> Result<HashMap<String, Decimal>, TradeError>;

    /// All currently resting orders, broker-owned transient state.
    async fn get_active_orders(&self) -> Result<Vec<BrokerOrder>, TradeError>;

    /// Place an order; returns the broker order id.
    async fn place_order(&self, ticket: OrderTicket) -> Result<String, TradeError>;

    /// Cancel a resting order.
    async fn cancel_order(&self, broker_order_id: &str) -> Result<(), TradeError>;
}
