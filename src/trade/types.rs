//! Trade status, action vocabulary, and the folded projection

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::TradeError;
use crate::ledger::{EventType, TradeEvent};

/// Lifecycle status of a trade.
///
/// OPENING -> OPEN -> CLOSING -> CLOSED, with CANCELLED reachable from
/// OPENING and OPEN. CLOSED and CANCELLED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeStatus {
    Opening,
    Open,
    Closing,
    Closed,
    Cancelled,
}

impl TradeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Cancelled)
    }
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Opening => "OPENING",
            Self::Open => "OPEN",
            Self::Closing => "CLOSING",
            Self::Closed => "CLOSED",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

impl FromStr for TradeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OPENING" => Ok(Self::Opening),
            "OPEN" => Ok(Self::Open),
            "CLOSING" => Ok(Self::Closing),
            "CLOSED" => Ok(Self::Closed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(format!("unknown trade status: {}", other)),
        }
    }
}

/// Closed set of mutation requests accepted by the core.
///
/// Replaces the original's dynamic JSON payload dispatch with a tagged
/// union whose per-variant required fields are validated before any state
/// transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    Enter {
        ticker: String,
        quantity: Decimal,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit_price: Option<Decimal>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stop_loss: Option<Decimal>,
    },
    Update {
        trade_id: Uuid,
        stop_loss: Decimal,
    },
    Exit {
        trade_id: Uuid,
    },
    Cancel {
        trade_id: Uuid,
    },
    Refresh {
        trade_id: Uuid,
    },
}

impl TradeAction {
    /// Reject malformed input before anything touches the ledger.
    pub fn validate(&self) -> Result<(), TradeError> {
        match self {
            Self::Enter {
                ticker,
                quantity,
                limit_price,
                stop_loss,
            } => {
                if ticker.trim().is_empty() {
                    return Err(TradeError::validation("ticker must not be empty"));
                }
                if *quantity <= Decimal::ZERO {
                    return Err(TradeError::validation(format!(
                        "quantity must be positive, got {}",
                        quantity
                    )));
                }
                if let Some(limit) = limit_price {
                    if *limit <= Decimal::ZERO {
                        return Err(TradeError::validation(format!(
                            "limit price must be positive, got {}",
                            limit
                        )));
                    }
                }
                if let Some(stop) = stop_loss {
                    if *stop <= Decimal::ZERO {
                        return Err(TradeError::validation(format!(
                            "stop loss must be positive, got {}",
                            stop
                        )));
                    }
                }
                Ok(())
            }
            Self::Update { stop_loss, .. } => {
                if *stop_loss <= Decimal::ZERO {
                    return Err(TradeError::validation(format!(
                        "stop loss must be positive, got {}",
                        stop_loss
                    )));
                }
                Ok(())
            }
            Self::Exit { .. } | Self::Cancel { .. } | Self::Refresh { .. } => Ok(()),
        }
    }
}

/// Point-in-time materialization of one trade, derived by folding its
/// events in (timestamp, seq) order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeObject {
    pub trade_id: Uuid,
    pub ticker: String,
    pub status: TradeStatus,
    /// Net inventory currently booked to this trade
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub stop_loss: Option<Decimal>,
    pub broker_order_id: Option<String>,
    pub opened_at: DateTime<Utc>,
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Sequence number of the last folded event. Lets a cached projection
    /// prove it is current with the ledger without replaying.
    #[serde(default)]
    pub last_seq: u64,
}

impl TradeObject {
    /// Rebuild a projection from a trade's event history.
    ///
    /// Returns None when the slice contains no OPEN event (nothing to
    /// project).
    pub fn replay(events: &[TradeEvent]) -> Option<Self> {
        let mut trade: Option<TradeObject> = None;
        for event in events {
            match trade.as_mut() {
                None => {
                    if event.event_type == EventType::Open {
                        let mut fresh = TradeObject {
                            trade_id: event.trade_id,
                            ticker: event.ticker.clone(),
                            status: TradeStatus::Opening,
                            quantity: Decimal::ZERO,
                            entry_price: event.price,
                            stop_loss: event.stop_price,
                            broker_order_id: event.broker_order_id.clone(),
                            opened_at: event.timestamp,
                            last_synced_at: None,
                            last_seq: event.seq,
                        };
                        fresh.fold(event);
                        trade = Some(fresh);
                    }
                }
                Some(existing) => existing.fold(event),
            }
        }
        trade
    }

    /// Fold one event into the projection. Events are applied in replay
    /// order; out-of-family events are the caller's bug, not checked here.
    pub fn fold(&mut self, event: &TradeEvent) {
        self.last_seq = event.seq;
        match event.event_type {
            EventType::Open => {
                self.quantity += event.quantity_delta;
            }
            EventType::Fill => {
                self.quantity += event.quantity_delta;
                match self.status {
                    TradeStatus::Opening => self.status = TradeStatus::Open,
                    TradeStatus::Closing if self.quantity == Decimal::ZERO => {
                        self.status = TradeStatus::Closed;
                    }
                    _ => {}
                }
            }
            EventType::StopUpdate => {
                self.stop_loss = event.stop_price;
            }
            EventType::Exit => {
                self.status = TradeStatus::Closing;
                if event.broker_order_id.is_some() {
                    self.broker_order_id = event.broker_order_id.clone();
                }
            }
            EventType::Cancel => {
                self.quantity += event.quantity_delta;
                self.status = TradeStatus::Cancelled;
            }
            EventType::RefreshSync => {
                self.last_synced_at = Some(event.timestamp);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn enter_action_validation() {
        let ok = TradeAction::Enter {
            ticker: "AAPL".to_string(),
            quantity: dec!(100),
            limit_price: Some(dec!(150)),
            stop_loss: Some(dec!(140)),
        };
        assert!(ok.validate().is_ok());

        let bad_qty = TradeAction::Enter {
            ticker: "AAPL".to_string(),
            quantity: dec!(-5),
            limit_price: None,
            stop_loss: None,
        };
        assert!(matches!(
            bad_qty.validate(),
            Err(TradeError::Validation { .. })
        ));

        let bad_ticker = TradeAction::Enter {
            ticker: "  ".to_string(),
            quantity: dec!(5),
            limit_price: None,
            stop_loss: None,
        };
        assert!(bad_ticker.validate().is_err());
    }

    #[test]
    fn action_json_tagging() {
        let action = TradeAction::Exit {
            trade_id: Uuid::new_v4(),
        };
        let json = serde_json::to_string(&action).unwrap();
        assert!(json.contains("\"action\":\"EXIT\""));
        let back: TradeAction = serde_json::from_str(&json).unwrap();
        assert_eq!(action, back);
    }

    #[test]
    fn replay_open_fill_sequence() {
        let trade_id = Uuid::new_v4();
        let open = TradeEvent::record(trade_id, "AAPL", EventType::Open, dec!(100), dec!(150))
            .with_stop(Some(dec!(140)));
        let reduce = TradeEvent::record(trade_id, "AAPL", EventType::Fill, dec!(-40), dec!(160));

        let trade = TradeObject::replay(&[open, reduce]).unwrap();
        assert_eq!(trade.status, TradeStatus::Open);
        assert_eq!(trade.quantity, dec!(60));
        assert_eq!(trade.entry_price, dec!(150));
        assert_eq!(trade.stop_loss, Some(dec!(140)));
    }

    #[test]
    fn replay_cancel_reverses_booking() {
        let trade_id = Uuid::new_v4();
        let open = TradeEvent::record(trade_id, "AAPL", EventType::Open, dec!(100), dec!(150));
        let cancel = TradeEvent::record(trade_id, "AAPL", EventType::Cancel, dec!(-100), dec!(150));

        let trade = TradeObject::replay(&[open, cancel]).unwrap();
        assert_eq!(trade.status, TradeStatus::Cancelled);
        assert_eq!(trade.quantity, Decimal::ZERO);
    }

    #[test]
    fn replay_empty_history_is_none() {
        assert!(TradeObject::replay(&[]).is_none());
    }

    #[test]
    fn status_round_trips_from_str() {
        for s in ["OPENING", "OPEN", "CLOSING", "CLOSED", "CANCELLED"] {
            let status: TradeStatus = s.parse().unwrap();
            assert_eq!(status.to_string(), s);
        }
        assert!("LIMBO".parse::<TradeStatus>().is_err());
    }
}
