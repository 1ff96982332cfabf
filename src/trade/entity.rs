//! Trade entity: lifecycle transitions over the event ledger
//!
//! Every mutation validates its precondition, builds exactly one event,
//! appends it, and only then folds it into the in-memory projection. A
//! failed append therefore never leaves memory and disk diverged.

use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::errors::TradeError;
use crate::ledger::{EventLogStore, EventType, TradeEvent};
use crate::trade::types::{TradeObject, TradeStatus};

/// One trade bound to the ledger it writes through.
pub struct TradeEntity<'a> {
    store: &'a EventLogStore,
    state: TradeObject,
}

impl<'a> TradeEntity<'a> {
    /// ENTER: book a new trade. Emits the OPEN event carrying the booked
    /// inventory at the entry price (paper discipline: entries are booked
    /// at their limit/quoted price and confirmed by a later fill).
    pub fn open(
        store: &'a EventLogStore,
        ticker: &str,
        quantity: Decimal,
        entry_price: Decimal,
        stop_loss: Option<Decimal>,
        broker_order_id: Option<String>,
    ) -> Result<Self, TradeError> {
        let trade_id = Uuid::new_v4();
        let event = TradeEvent::record(trade_id, ticker, EventType::Open, quantity, entry_price)
            .with_stop(stop_loss)
            .with_broker_order(broker_order_id);

        let event = store.append(event)?;
        let state = TradeObject::replay(std::slice::from_ref(&event))
            .ok_or_else(|| TradeError::ledger("OPEN event did not project"))?;

        info!(trade_id = %trade_id, ticker = %ticker, quantity = %quantity, "Trade opened");
        Ok(Self { store, state })
    }

    /// Rehydrate a trade by folding its event history.
    pub fn load(store: &'a EventLogStore, trade_id: Uuid) -> Result<Self, TradeError> {
        let events = store.read_for_trade(trade_id);
        let state = TradeObject::replay(&events).ok_or(TradeError::UnknownTrade(trade_id))?;
        Ok(Self { store, state })
    }

    /// Rehydrate from a projection already proven current against the
    /// ledger (see `TradeCache::load_current`), skipping the replay.
    pub fn resume(store: &'a EventLogStore, state: TradeObject) -> Self {
        Self { store, state }
    }

    pub fn state(&self) -> &TradeObject {
        &self.state
    }

    pub fn into_state(self) -> TradeObject {
        self.state
    }

    /// Append first, fold second: the projection only advances once the
    /// event is durable.
    fn commit(&mut self, event: TradeEvent) -> Result<(), TradeError> {
        let event = self.store.append(event)?;
        self.state.fold(&event);
        Ok(())
    }

    fn reject(&self, action: &'static str) -> TradeError {
        TradeError::InvalidState {
            trade_id: self.state.trade_id,
            status: self.state.status,
            action,
        }
    }

    /// UPDATE: move the stop loss. Valid only while the position is OPEN.
    pub fn update_stop(&mut self, stop_loss: Decimal) -> Result<(), TradeError> {
        if self.state.status != TradeStatus::Open {
            return Err(self.reject("update stop"));
        }
        let event = TradeEvent::record(
            self.state.trade_id,
            &self.state.ticker,
            EventType::StopUpdate,
            Decimal::ZERO,
            Decimal::ZERO,
        )
        .with_stop(Some(stop_loss));
        self.commit(event)
    }

    /// EXIT: submit the closing order. Valid only while OPEN.
    pub fn request_exit(&mut self, broker_order_id: Option<String>) -> Result<(), TradeError> {
        if self.state.status != TradeStatus::Open {
            return Err(self.reject("exit"));
        }
        let event = TradeEvent::record(
            self.state.trade_id,
            &self.state.ticker,
            EventType::Exit,
            Decimal::ZERO,
            Decimal::ZERO,
        )
        .with_broker_order(broker_order_id);
        self.commit(event)
    }

    /// CANCEL: abandon an OPENING or OPEN trade before completion. Emits a
    /// compensating event that reverses the booked inventory at its entry
    /// price, realizing nothing.
    pub fn cancel(&mut self) -> Result<(), TradeError> {
        if !matches!(
            self.state.status,
            TradeStatus::Opening | TradeStatus::Open
        ) {
            return Err(self.reject("cancel"));
        }
        let event = TradeEvent::record(
            self.state.trade_id,
            &self.state.ticker,
            EventType::Cancel,
            -self.state.quantity,
            self.state.entry_price,
        );
        self.commit(event)?;
        info!(trade_id = %self.state.trade_id, "Trade cancelled");
        Ok(())
    }

    /// Broker fill confirmed. From OPENING this acknowledges the booked
    /// entry (no further inventory change); from CLOSING it flattens the
    /// position at the fill price and closes the trade.
    pub fn confirm_fill(&mut self, fill_price: Decimal) -> Result<(), TradeError> {
        let (delta, price) = match self.state.status {
            TradeStatus::Opening => (Decimal::ZERO, self.state.entry_price),
            TradeStatus::Closing => (-self.state.quantity, fill_price),
            _ => return Err(self.reject("confirm fill")),
        };
        let event = TradeEvent::record(
            self.state.trade_id,
            &self.state.ticker,
            EventType::Fill,
            delta,
            price,
        );
        self.commit(event)?;
        info!(
            trade_id = %self.state.trade_id,
            status = %self.state.status,
            "Fill confirmed"
        );
        Ok(())
    }

    /// REFRESH: record a broker sync without changing status.
    pub fn mark_synced(&mut self) -> Result<(), TradeError> {
        if self.state.status.is_terminal() {
            return Err(self.reject("refresh"));
        }
        let event = TradeEvent::record(
            self.state.trade_id,
            &self.state.ticker,
            EventType::RefreshSync,
            Decimal::ZERO,
            Decimal::ZERO,
        );
        self.commit(event)
    }
}
