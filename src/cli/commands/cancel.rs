use anyhow::Result;
use clap::Args;
use uuid::Uuid;

use crate::desk::TradingDesk;
use crate::trade::TradeAction;

#[derive(Args, Clone)]
pub struct CancelArgs {
    /// Trade ID
    pub trade_id: Uuid,
}

pub struct CancelCommand {
    args: CancelArgs,
}

impl CancelCommand {
    pub fn new(args: CancelArgs) -> Self {
        Self { args }
    }

    pub async fn execute(&self, desk: &TradingDesk) -> Result<()> {
        let trade = desk
            .submit(TradeAction::Cancel {
                trade_id: self.args.trade_id,
            })
            .await?;

        println!("Trade {} cancelled", trade.trade_id);
        Ok(())
    }
}
