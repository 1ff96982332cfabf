//! In-memory simulated broker
//!
//! Orders rest until filled or cancelled via the test/CLI helpers; marks
//! are settable. Process-local by design: a fresh process starts with an
//! empty active set, which the refresh flow reads as "order completed".

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::debug;

use crate::broker::{BrokerOrder, BrokerPort, OrderTicket};
use crate::errors::TradeError;

#[derive(Default)]
struct PaperState {
    next_id: u64,
    orders: Vec<BrokerOrder>,
    marks: HashMap<String, Decimal>,
}

/// Simulated brokerage backing the default paper mode.
#[derive(Default)]
pub struct PaperBroker {
    state: Mutex<PaperState>,
}

impl PaperBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PaperState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Set (or move) the simulated mark for a ticker.
    pub fn set_mark(&self, ticker: &str, price: Decimal) {
        self.lock().marks.insert(ticker.to_string(), price);
    }

    /// Simulate an execution: the order leaves the active set.
    pub fn fill_order(&self, broker_order_id: &str) -> bool {
        let mut state = self.lock();
        let before = state.orders.len();
        state.orders.retain(|o| o.broker_order_id != broker_order_id);
        state.orders.len() != before
    }

    /// Simulate executions for every resting order.
    pub fn fill_all(&self) -> usize {
        let mut state = self.lock();
        let filled = state.orders.len();
        state.orders.clear();
        filled
    }
}

#[async_trait]
impl BrokerPort for PaperBroker {
    async fn get_marks(
        &self,
        tickers: &[String],
    ) -> Result<HashMap<String, Decimal>, TradeError> {
        let state = self.lock();
        Ok(tickers
            .iter()
            .filter_map(|t| state.marks.get(t).map(|p| (t.clone(), *p)))
            .collect())
    }

    async fn get_active_orders(&self) -> Result<Vec<BrokerOrder>, TradeError> {
        Ok(self.lock().orders.clone())
    }

    async fn place_order(&self, ticket: OrderTicket) -> Result<String, TradeError> {
        let mut state = self.lock();
        state.next_id += 1;
        let broker_order_id = format!("PAPER-{}", state.next_id);
        debug!(
            broker_order_id = %broker_order_id,
            ticker = %ticket.ticker,
            quantity = %ticket.quantity,
            "Paper order placed"
        );
        state.orders.push(BrokerOrder {
            broker_order_id: broker_order_id.clone(),
            ticker: ticket.ticker,
            quantity: ticket.quantity,
            limit_price: ticket.limit_price,
            stop_price: ticket.stop_price,
            order_ref: Some(ticket.order_ref),
            placed_at: Utc::now(),
        });
        Ok(broker_order_id)
    }

    async fn cancel_order(&self, broker_order_id: &str) -> Result<(), TradeError> {
        let mut state = self.lock();
        let before = state.orders.len();
        state.orders.retain(|o| o.broker_order_id != broker_order_id);
        if state.orders.len() == before {
            // Unknown id: already filled or never existed. Treat as done,
            // matching real brokers' idempotent cancel of dead orders.
            debug!(broker_order_id = %broker_order_id, "Cancel for unknown order ignored");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn ticket(ticker: &str, qty: Decimal) -> OrderTicket {
        OrderTicket {
            order_ref: Uuid::new_v4(),
            ticker: ticker.to_string(),
            quantity: qty,
            limit_price: Some(dec!(100)),
            stop_price: None,
        }
    }

    #[tokio::test]
    async fn orders_rest_until_filled() {
        let broker = PaperBroker::new();
        let oid = broker.place_order(ticket("AAPL", dec!(10))).await.unwrap();

        let active = broker.get_active_orders().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].broker_order_id, oid);

        assert!(broker.fill_order(&oid));
        assert!(broker.get_active_orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn marks_are_partial() {
        let broker = PaperBroker::new();
        broker.set_mark("AAPL", dec!(182.5));

        let marks = broker
            .get_marks(&["AAPL".to_string(), "MSFT".to_string()])
            .await
            .unwrap();
        assert_eq!(marks.get("AAPL"), Some(&dec!(182.5)));
        assert!(!marks.contains_key("MSFT"));
    }

    #[test]
    fn order_ids_are_sequential() {
        let broker = PaperBroker::new();
        let first = tokio_test::block_on(broker.place_order(ticket("AAPL", dec!(1)))).unwrap();
        let second = tokio_test::block_on(broker.place_order(ticket("MSFT", dec!(2)))).unwrap();
        assert_eq!(first, "PAPER-1");
        assert_eq!(second, "PAPER-2");
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let broker = PaperBroker::new();
        let oid = broker.place_order(ticket("AAPL", dec!(10))).await.unwrap();
        broker.cancel_order(&oid).await.unwrap();
        broker.cancel_order(&oid).await.unwrap();
        assert!(broker.get_active_orders().await.unwrap().is_empty());
    }
}
