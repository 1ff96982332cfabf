//! Snapshot and trade display formatters

use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Table};
use owo_colors::OwoColorize;
use rust_decimal::Decimal;

use crate::portfolio::snapshot::{PortfolioSnapshot, SnapshotMode};
use crate::trade::types::TradeObject;

/// Format the snapshot header block (cash, equity, P&L)
pub struct SnapshotFormatter<'a> {
    pub snapshot: &'a PortfolioSnapshot,
}

impl<'a> SnapshotFormatter<'a> {
    pub fn new(snapshot: &'a PortfolioSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn format_summary(&self) -> String {
        let mode = match self.snapshot.mode {
            SnapshotMode::Historical => "HISTORICAL",
            SnapshotMode::Live => "LIVE",
        };
        let mut output = String::new();
        output.push_str(&format!(
            "Portfolio as of {} ({})\n",
            self.snapshot.as_of.format("%Y-%m-%d %H:%M:%S UTC"),
            mode
        ));
        output.push_str(&format!("  Cash:           ${:.2}\n", self.snapshot.cash));
        output.push_str(&format!("  Equity:         ${:.2}\n", self.snapshot.equity));
        output.push_str(&format!(
            "  Realized P&L:   {}\n",
            Self::pnl(self.snapshot.realized_pnl_to_date)
        ));
        let unrealized = self.snapshot.total_unrealized_pnl();
        if unrealized != Decimal::ZERO {
            output.push_str(&format!("  Unrealized P&L: {}\n", Self::pnl(unrealized)));
        }
        output
    }

    fn pnl(value: Decimal) -> String {
        let text = format!("${:.2}", value);
        if value > Decimal::ZERO {
            text.bright_green().to_string()
        } else if value < Decimal::ZERO {
            text.bright_red().to_string()
        } else {
            text
        }
    }

    pub fn format_positions(&self) -> String {
        if self.snapshot.positions.is_empty() {
            return "No open positions.\n".to_string();
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec!["Ticker", "Qty", "Avg Cost", "Mark", "Unrealized", "Value"]);

        for position in &self.snapshot.positions {
            let mark = position
                .current_mark
                .map(|m| format!("{:.2}", m))
                .unwrap_or_else(|| "n/a".to_string());
            let unrealized = position
                .unrealized_pnl
                .map(|u| format!("{:.2}", u))
                .unwrap_or_else(|| "-".to_string());
            table.add_row(vec![
                Cell::new(&position.ticker),
                Cell::new(format!("{}", position.quantity)),
                Cell::new(format!("{:.2}", position.avg_cost)),
                Cell::new(mark),
                Cell::new(unrealized),
                Cell::new(format!("{:.2}", position.market_value)),
            ]);
        }

        format!("{table}\n")
    }

    pub fn format_orders(&self) -> String {
        if self.snapshot.active_orders.is_empty() {
            return String::new();
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec!["Order ID", "Ticker", "Qty", "Limit", "Stop", "Placed"]);

        for order in &self.snapshot.active_orders {
            table.add_row(vec![
                Cell::new(&order.broker_order_id),
                Cell::new(&order.ticker),
                Cell::new(format!("{}", order.quantity)),
                Cell::new(
                    order
                        .limit_price
                        .map(|p| format!("{:.2}", p))
                        .unwrap_or_else(|| "MKT".to_string()),
                ),
                Cell::new(
                    order
                        .stop_price
                        .map(|p| format!("{:.2}", p))
                        .unwrap_or_else(|| "-".to_string()),
                ),
                Cell::new(order.placed_at.format("%H:%M:%S").to_string()),
            ]);
        }

        format!("Active orders:\n{table}\n")
    }

    pub fn format_issues(&self) -> String {
        if self.snapshot.issues.is_empty() {
            return String::new();
        }
        let mut output = format!("{}\n", "Warnings:".bright_yellow());
        for issue in &self.snapshot.issues {
            if issue.ticker.is_empty() {
                output.push_str(&format!("  [{:?}] {}\n", issue.kind, issue.detail));
            } else {
                output.push_str(&format!(
                    "  [{:?}] {}: {}\n",
                    issue.kind, issue.ticker, issue.detail
                ));
            }
        }
        output
    }
}

/// Format a trade listing
pub struct TradesFormatter<'a> {
    pub trades: &'a [TradeObject],
}

impl<'a> TradesFormatter<'a> {
    pub fn new(trades: &'a [TradeObject]) -> Self {
        Self { trades }
    }

    pub fn format_table(&self) -> String {
        if self.trades.is_empty() {
            return "No trades found.\n".to_string();
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            "Trade ID", "Ticker", "Status", "Qty", "Entry", "Stop", "Opened",
        ]);

        for trade in self.trades {
            table.add_row(vec![
                Cell::new(trade.trade_id.to_string()),
                Cell::new(&trade.ticker),
                Cell::new(trade.status.to_string()),
                Cell::new(format!("{}", trade.quantity)),
                Cell::new(format!("{:.2}", trade.entry_price)),
                Cell::new(
                    trade
                        .stop_loss
                        .map(|s| format!("{:.2}", s))
                        .unwrap_or_else(|| "-".to_string()),
                ),
                Cell::new(trade.opened_at.format("%Y-%m-%d %H:%M").to_string()),
            ]);
        }

        format!("{table}\n")
    }
}
