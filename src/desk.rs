//! Trading desk facade
//!
//! The surface the front ends talk to: submit trade actions, take
//! snapshots, list trades. Owns the ledger and projection cache; the
//! broker arrives as an injected capability.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::broker::{BrokerPort, OrderTicket};
use crate::config::Settings;
use crate::costing::LifoCosting;
use crate::data_paths::DataPaths;
use crate::errors::TradeError;
use crate::ledger::{EventLogStore, TradeEvent};
use crate::portfolio::{PortfolioSnapshot, ReconstructionEngine, TickerFilter};
use crate::trade::{TradeAction, TradeCache, TradeEntity, TradeObject, TradeStatus};

pub struct TradingDesk {
    store: EventLogStore,
    cache: TradeCache,
    broker: Arc<dyn BrokerPort>,
    settings: Settings,
}

impl TradingDesk {
    /// Open the desk over the data directory. A wiped or never-written
    /// projection cache is rebuilt from the ledger; otherwise existing
    /// projections are trusted until a read finds one stale.
    pub fn open(
        data_paths: &DataPaths,
        broker: Arc<dyn BrokerPort>,
        settings: Settings,
    ) -> Result<Self, TradeError> {
        let store = EventLogStore::open(data_paths)?;
        let cache = TradeCache::new(data_paths);
        if !store.is_empty() && cache.is_empty() {
            cache.rebuild(&store)?;
        }
        Ok(Self {
            store,
            cache,
            broker,
            settings,
        })
    }

    pub fn store(&self) -> &EventLogStore {
        &self.store
    }

    fn engine(&self) -> ReconstructionEngine<'_> {
        ReconstructionEngine::new(
            &self.store,
            Arc::clone(&self.broker),
            Box::new(LifoCosting),
            self.settings.clone(),
        )
    }

    /// Apply one trade action. Errors are returned before any event is
    /// written; on success the returned projection reflects the new state.
    pub async fn submit(&self, action: TradeAction) -> Result<TradeObject, TradeError> {
        action.validate()?;
        match action {
            TradeAction::Enter {
                ticker,
                quantity,
                limit_price,
                stop_loss,
            } => self.enter(&ticker, quantity, limit_price, stop_loss).await,
            TradeAction::Update { trade_id, stop_loss } => self.update(trade_id, stop_loss).await,
            TradeAction::Exit { trade_id } => self.exit(trade_id).await,
            TradeAction::Cancel { trade_id } => self.cancel(trade_id).await,
            TradeAction::Refresh { trade_id } => self.refresh(trade_id).await,
        }
    }

    async fn enter(
        &self,
        ticker: &str,
        quantity: Decimal,
        limit_price: Option<Decimal>,
        stop_loss: Option<Decimal>,
    ) -> Result<TradeObject, TradeError> {
        // Booking price: the limit if given, otherwise the current mark.
        let entry_price = match limit_price {
            Some(limit) => limit,
            None => {
                let marks = self
                    .broker
                    .get_marks(std::slice::from_ref(&ticker.to_string()))
                    .await?;
                marks.get(ticker).copied().ok_or_else(|| {
                    TradeError::broker(format!(
                        "no mark for {}; market entry needs a quotable price or a limit",
                        ticker
                    ))
                })?
            }
        };

        // Route the order first: if the broker rejects it, nothing is
        // written and the trade never existed.
        let order_ref = Uuid::new_v4();
        let broker_order_id = self
            .broker
            .place_order(OrderTicket {
                order_ref,
                ticker: ticker.to_string(),
                quantity,
                limit_price,
                stop_price: stop_loss,
            })
            .await?;

        let entity = TradeEntity::open(
            &self.store,
            ticker,
            quantity,
            entry_price,
            stop_loss,
            Some(broker_order_id),
        )?;
        self.cache_projection(entity.state());
        Ok(entity.into_state())
    }

    /// Rehydrate a trade, serving the cached projection when it is still
    /// current and falling back to replay (repairing the cache) otherwise.
    fn load_entity(&self, trade_id: Uuid) -> Result<TradeEntity<'_>, TradeError> {
        if let Some(state) = self.cache.load_current(&self.store, trade_id) {
            return Ok(TradeEntity::resume(&self.store, state));
        }
        let entity = TradeEntity::load(&self.store, trade_id)?;
        self.cache_projection(entity.state());
        Ok(entity)
    }

    async fn update(&self, trade_id: Uuid, stop_loss: Decimal) -> Result<TradeObject, TradeError> {
        let mut entity = self.load_entity(trade_id)?;
        entity.update_stop(stop_loss)?;
        self.cache_projection(entity.state());
        Ok(entity.into_state())
    }

    async fn exit(&self, trade_id: Uuid) -> Result<TradeObject, TradeError> {
        let mut entity = self.load_entity(trade_id)?;
        if entity.state().status != TradeStatus::Open {
            return Err(TradeError::InvalidState {
                trade_id,
                status: entity.state().status,
                action: "exit",
            });
        }

        let broker_order_id = self
            .broker
            .place_order(OrderTicket {
                order_ref: trade_id,
                ticker: entity.state().ticker.clone(),
                quantity: -entity.state().quantity,
                limit_price: None,
                stop_price: None,
            })
            .await?;

        entity.request_exit(Some(broker_order_id))?;
        self.cache_projection(entity.state());
        Ok(entity.into_state())
    }

    async fn cancel(&self, trade_id: Uuid) -> Result<TradeObject, TradeError> {
        let mut entity = self.load_entity(trade_id)?;
        if !matches!(
            entity.state().status,
            TradeStatus::Opening | TradeStatus::Open
        ) {
            return Err(TradeError::InvalidState {
                trade_id,
                status: entity.state().status,
                action: "cancel",
            });
        }

        // Pull the broker order before writing the compensating event; a
        // broker failure here must leave the trade untouched.
        if let Some(order_id) = entity.state().broker_order_id.clone() {
            self.broker.cancel_order(&order_id).await?;
        }

        entity.cancel()?;
        self.cache_projection(entity.state());
        Ok(entity.into_state())
    }

    /// REFRESH: sync one trade against the broker's active-order set. An
    /// entry or exit order that has left the set is treated as filled.
    async fn refresh(&self, trade_id: Uuid) -> Result<TradeObject, TradeError> {
        let mut entity = self.load_entity(trade_id)?;
        if entity.state().status.is_terminal() {
            return Err(TradeError::InvalidState {
                trade_id,
                status: entity.state().status,
                action: "refresh",
            });
        }

        let active = self.broker.get_active_orders().await?;
        let order_resting = entity
            .state()
            .broker_order_id
            .as_ref()
            .map(|oid| active.iter().any(|o| &o.broker_order_id == oid))
            .unwrap_or(false);

        if !order_resting {
            match entity.state().status {
                TradeStatus::Opening => {
                    let entry_price = entity.state().entry_price;
                    entity.confirm_fill(entry_price)?;
                }
                TradeStatus::Closing => {
                    let ticker = entity.state().ticker.clone();
                    let fill_price = self.exit_fill_price(&ticker, entity.state().entry_price).await;
                    entity.confirm_fill(fill_price)?;
                }
                _ => {}
            }
        }

        if !entity.state().status.is_terminal() {
            entity.mark_synced()?;
        }
        self.cache_projection(entity.state());
        Ok(entity.into_state())
    }

    /// Closing fill price: current mark when quotable, entry price as the
    /// paper fallback.
    async fn exit_fill_price(&self, ticker: &str, fallback: Decimal) -> Decimal {
        match self
            .broker
            .get_marks(std::slice::from_ref(&ticker.to_string()))
            .await
        {
            Ok(marks) => marks.get(ticker).copied().unwrap_or(fallback),
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "Mark fetch failed; filling at entry price");
                fallback
            }
        }
    }

    /// The cache is derivable state: a failed write is logged, never
    /// surfaced as a mutation failure.
    fn cache_projection(&self, trade: &TradeObject) {
        if let Err(e) = self.cache.save(trade) {
            warn!(trade_id = %trade.trade_id, error = %e, "Projection cache write failed");
        }
    }

    /// Snapshot at a past instant (`Some(cutoff)`) or live (`None`).
    pub async fn snapshot(
        &self,
        cutoff: Option<DateTime<Utc>>,
        filter: Option<&TickerFilter>,
    ) -> Result<PortfolioSnapshot, TradeError> {
        self.engine().reconstruct(cutoff, filter).await
    }

    /// All trades known to the ledger, ordered by open time.
    pub fn list_trades(
        &self,
        status_filter: Option<TradeStatus>,
    ) -> Result<Vec<TradeObject>, TradeError> {
        let mut by_trade: BTreeMap<Uuid, Vec<TradeEvent>> = BTreeMap::new();
        for event in self.store.read_all() {
            by_trade.entry(event.trade_id).or_default().push(event);
        }

        let mut trades: Vec<TradeObject> = Vec::with_capacity(by_trade.len());
        for (trade_id, events) in &by_trade {
            // Current cached projection wins; otherwise replay and repair.
            let trade = match self.cache.load_current(&self.store, *trade_id) {
                Some(trade) => trade,
                None => match TradeObject::replay(events) {
                    Some(trade) => {
                        self.cache_projection(&trade);
                        trade
                    }
                    None => continue,
                },
            };
            if status_filter.map(|s| trade.status == s).unwrap_or(true) {
                trades.push(trade);
            }
        }
        trades.sort_by(|a, b| (a.opened_at, a.trade_id).cmp(&(b.opened_at, b.trade_id)));
        info!(trades = trades.len(), "Listed trades");
        Ok(trades)
    }
}
