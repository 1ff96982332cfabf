//! Error taxonomy for the trading core
//!
//! Every failure carries structured detail (kind + offending trade/ticker)
//! so callers can render it without parsing free-form text. Mutation errors
//! are returned before any durable state changes; reconstruction errors are
//! partial and recoverable per ticker.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::trade::types::TradeStatus;

/// Top-level error type returned by the trading core.
#[derive(Debug, thiserror::Error)]
pub enum TradeError {
    /// Malformed action input, rejected before any event is written.
    #[error("invalid trade action: {reason}")]
    Validation { reason: String },

    /// Transition not permitted from the trade's current status.
    #[error("trade {trade_id} is {status:?}: cannot {action}")]
    InvalidState {
        trade_id: Uuid,
        status: TradeStatus,
        action: &'static str,
    },

    /// Durable persistence failed; no state change was committed.
    #[error("durable write failed: {0}")]
    Write(#[from] WriteError),

    /// A reduction exceeded the open lot inventory for a ticker.
    #[error("reduction of {requested} exceeds open lots ({available} available) for {ticker}")]
    Consistency {
        ticker: String,
        requested: Decimal,
        available: Decimal,
    },

    /// Broker mark/order call failed or timed out.
    #[error("broker unavailable: {detail}")]
    BrokerUnavailable { detail: String },

    /// The event log itself is corrupt or unreadable. This is the only
    /// error fatal to a snapshot call.
    #[error("event log unreadable: {detail}")]
    Ledger { detail: String },

    /// No trade with the given id exists in the log.
    #[error("unknown trade {0}")]
    UnknownTrade(Uuid),
}

impl TradeError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    pub fn broker(detail: impl Into<String>) -> Self {
        Self::BrokerUnavailable {
            detail: detail.into(),
        }
    }

    pub fn ledger(detail: impl Into<String>) -> Self {
        Self::Ledger {
            detail: detail.into(),
        }
    }
}

/// Failure while persisting through the durable writer.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode: {0}")]
    Encode(#[from] serde_json::Error),
}
