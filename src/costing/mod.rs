//! Inventory costing
//!
//! Converts one ticker's ordered event sequence into realized P&L and the
//! remaining open-lot inventory. LIFO is the single costing discipline in
//! the system; every cost basis reported anywhere comes through here. The
//! `CostMethod` trait is the seam an alternate discipline (e.g. FIFO)
//! would plug into without touching the reconstruction engine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::ledger::TradeEvent;

/// A discrete open quantity block at a specific entry price.
///
/// Lots live only inside a costing pass; they are never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Lot {
    pub ticker: String,
    pub quantity: Decimal,
    pub open_price: Decimal,
    pub opened_at: DateTime<Utc>,
}

/// A reduction that exceeded the available lot inventory.
#[derive(Debug, Clone, PartialEq)]
pub struct LotDeficit {
    pub ticker: String,
    /// Quantity the reduction asked for
    pub requested: Decimal,
    /// Quantity actually matched against open lots
    pub matched: Decimal,
    pub at: DateTime<Utc>,
}

/// Result of costing one ticker's events up to a cutoff.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerBook {
    pub ticker: String,
    /// Remaining open lots, oldest first
    pub lots: Vec<Lot>,
    pub realized_pnl: Decimal,
    /// First over-reduction encountered, if any. The book is still usable
    /// for reporting but must be flagged to the caller.
    pub deficit: Option<LotDeficit>,
}

impl TickerBook {
    pub fn open_quantity(&self) -> Decimal {
        self.lots.iter().map(|l| l.quantity).sum()
    }

    /// Weighted average open price of the remaining lots
    pub fn average_cost(&self) -> Decimal {
        let qty = self.open_quantity();
        if qty == Decimal::ZERO {
            return Decimal::ZERO;
        }
        let value: Decimal = self.lots.iter().map(|l| l.quantity * l.open_price).sum();
        value / qty
    }
}

/// Lot-matching strategy applied to one ticker's ordered events.
pub trait CostMethod: Send + Sync {
    fn name(&self) -> &'static str;

    /// `events` must already be in replay order (ascending timestamp/seq)
    /// and belong to a single ticker. Events with a zero quantity delta
    /// are ignored.
    fn cost(&self, ticker: &str, events: &[TradeEvent]) -> TickerBook;
}

/// Last-In-First-Out lot matching: reductions consume the most recently
/// opened lot first.
#[derive(Debug, Default, Clone, Copy)]
pub struct LifoCosting;

impl CostMethod for LifoCosting {
    fn name(&self) -> &'static str {
        "LIFO"
    }

    fn cost(&self, ticker: &str, events: &[TradeEvent]) -> TickerBook {
        let mut lots: Vec<Lot> = Vec::new();
        let mut realized_pnl = Decimal::ZERO;
        let mut deficit: Option<LotDeficit> = None;

        for event in events {
            if !event.moves_inventory() {
                continue;
            }

            if event.quantity_delta > Decimal::ZERO {
                lots.push(Lot {
                    ticker: ticker.to_string(),
                    quantity: event.quantity_delta,
                    open_price: event.price,
                    opened_at: event.timestamp,
                });
                continue;
            }

            // Reduction: match newest lots first.
            let requested = -event.quantity_delta;
            let mut remaining = requested;
            while remaining > Decimal::ZERO {
                let Some(top) = lots.last_mut() else { break };
                let matched = remaining.min(top.quantity);
                realized_pnl += (event.price - top.open_price) * matched;
                top.quantity -= matched;
                remaining -= matched;
                if top.quantity == Decimal::ZERO {
                    lots.pop();
                }
            }

            if remaining > Decimal::ZERO && deficit.is_none() {
                deficit = Some(LotDeficit {
                    ticker: ticker.to_string(),
                    requested,
                    matched: requested - remaining,
                    at: event.timestamp,
                });
            }
        }

        TickerBook {
            ticker: ticker.to_string(),
            lots,
            realized_pnl,
            deficit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::EventType;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn flow(ticker: &str, qty: Decimal, price: Decimal) -> TradeEvent {
        TradeEvent::record(Uuid::new_v4(), ticker, EventType::Fill, qty, price)
    }

    #[test]
    fn open_then_partial_exit() {
        // The worked example: +100@150 then -40@160.
        let events = vec![flow("AAPL", dec!(100), dec!(150)), flow("AAPL", dec!(-40), dec!(160))];
        let book = LifoCosting.cost("AAPL", &events);

        assert_eq!(book.open_quantity(), dec!(60));
        assert_eq!(book.average_cost(), dec!(150));
        assert_eq!(book.realized_pnl, dec!(400));
        assert!(book.deficit.is_none());
    }

    #[test]
    fn reduction_matches_newest_lot_first() {
        let events = vec![
            flow("AAPL", dec!(100), dec!(150)),
            flow("AAPL", dec!(50), dec!(170)),
            flow("AAPL", dec!(-30), dec!(180)),
        ];
        let book = LifoCosting.cost("AAPL", &events);

        // The 170 lot is consumed first.
        assert_eq!(book.realized_pnl, dec!(300)); // (180-170)*30
        assert_eq!(book.open_quantity(), dec!(120));
        assert_eq!(book.lots.len(), 2);
        assert_eq!(book.lots[1].quantity, dec!(20));
        assert_eq!(book.lots[1].open_price, dec!(170));
    }

    #[test]
    fn reduction_spans_multiple_lots() {
        let events = vec![
            flow("AAPL", dec!(100), dec!(150)),
            flow("AAPL", dec!(50), dec!(170)),
            flow("AAPL", dec!(-120), dec!(180)),
        ];
        let book = LifoCosting.cost("AAPL", &events);

        // 50 from the 170 lot, then 70 from the 150 lot.
        assert_eq!(book.realized_pnl, dec!(500) + dec!(2100));
        assert_eq!(book.open_quantity(), dec!(30));
        assert_eq!(book.average_cost(), dec!(150));
    }

    #[test]
    fn over_reduction_reports_deficit() {
        let events = vec![
            flow("AAPL", dec!(50), dec!(150)),
            flow("AAPL", dec!(-80), dec!(160)),
        ];
        let book = LifoCosting.cost("AAPL", &events);

        let deficit = book.deficit.as_ref().expect("deficit must be surfaced");
        assert_eq!(deficit.requested, dec!(80));
        assert_eq!(deficit.matched, dec!(50));
        // The matched portion still realizes.
        assert_eq!(book.realized_pnl, dec!(500));
        assert_eq!(book.open_quantity(), Decimal::ZERO);
    }

    #[test]
    fn zero_delta_events_are_ignored() {
        let events = vec![
            flow("AAPL", dec!(10), dec!(100)),
            TradeEvent::record(
                Uuid::new_v4(),
                "AAPL",
                EventType::StopUpdate,
                Decimal::ZERO,
                Decimal::ZERO,
            ),
        ];
        let book = LifoCosting.cost("AAPL", &events);
        assert_eq!(book.open_quantity(), dec!(10));
        assert_eq!(book.realized_pnl, Decimal::ZERO);
    }

    #[test]
    fn full_roundtrip_flattens() {
        let events = vec![
            flow("AAPL", dec!(100), dec!(150)),
            flow("AAPL", dec!(-100), dec!(150)),
        ];
        let book = LifoCosting.cost("AAPL", &events);
        assert_eq!(book.open_quantity(), Decimal::ZERO);
        assert_eq!(book.average_cost(), Decimal::ZERO);
        assert_eq!(book.realized_pnl, Decimal::ZERO);
    }
}
