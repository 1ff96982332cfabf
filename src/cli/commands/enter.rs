use anyhow::Result;
use clap::Args;
use rust_decimal::Decimal;
use tracing::info;

use crate::desk::TradingDesk;
use crate::trade::TradeAction;

#[derive(Args, Clone)]
pub struct EnterArgs {
    /// Ticker symbol (e.g., AAPL)
    pub ticker: String,

    /// Number of units to buy
    #[arg(long)]
    pub quantity: Decimal,

    /// Limit price; omit for a market entry at the current mark
    #[arg(long)]
    pub limit: Option<Decimal>,

    /// Initial stop loss price
    #[arg(long)]
    pub stop: Option<Decimal>,
}

pub struct EnterCommand {
    args: EnterArgs,
}

impl EnterCommand {
    pub fn new(args: EnterArgs) -> Self {
        Self { args }
    }

    pub async fn execute(&self, desk: &TradingDesk) -> Result<()> {
        info!(
            ticker = %self.args.ticker,
            quantity = %self.args.quantity,
            "Submitting entry"
        );

        let trade = desk
            .submit(TradeAction::Enter {
                ticker: self.args.ticker.clone(),
                quantity: self.args.quantity,
                limit_price: self.args.limit,
                stop_loss: self.args.stop,
            })
            .await?;

        println!(
            "Opened trade {} ({} x{} @ {}) status {}",
            trade.trade_id, trade.ticker, trade.quantity, trade.entry_price, trade.status
        );
        Ok(())
    }
}
