use anyhow::Result;
use clap::Args;
use uuid::Uuid;

use crate::desk::TradingDesk;
use crate::trade::TradeAction;

#[derive(Args, Clone)]
pub struct RefreshArgs {
    /// Trade ID
    pub trade_id: Uuid,
}

pub struct RefreshCommand {
    args: RefreshArgs,
}

impl RefreshCommand {
    pub fn new(args: RefreshArgs) -> Self {
        Self { args }
    }

    pub async fn execute(&self, desk: &TradingDesk) -> Result<()> {
        let trade = desk
            .submit(TradeAction::Refresh {
                trade_id: self.args.trade_id,
            })
            .await?;

        println!(
            "Trade {} refreshed: status {}, quantity {}",
            trade.trade_id, trade.status, trade.quantity
        );
        Ok(())
    }
}
