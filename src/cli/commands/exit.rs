use anyhow::Result;
use clap::Args;
use uuid::Uuid;

use crate::desk::TradingDesk;
use crate::trade::TradeAction;

#[derive(Args, Clone)]
pub struct ExitArgs {
    /// Trade ID
    pub trade_id: Uuid,
}

pub struct ExitCommand {
    args: ExitArgs,
}

impl ExitCommand {
    pub fn new(args: ExitArgs) -> Self {
        Self { args }
    }

    pub async fn execute(&self, desk: &TradingDesk) -> Result<()> {
        let trade = desk
            .submit(TradeAction::Exit {
                trade_id: self.args.trade_id,
            })
            .await?;

        println!(
            "Closing order submitted for trade {} ({}), status {}",
            trade.trade_id, trade.ticker, trade.status
        );
        Ok(())
    }
}
