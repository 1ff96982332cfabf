use anyhow::Result;
use clap::Args;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::desk::TradingDesk;
use crate::trade::TradeAction;

#[derive(Args, Clone)]
pub struct UpdateArgs {
    /// Trade ID
    pub trade_id: Uuid,

    /// New stop loss price
    #[arg(long)]
    pub stop: Decimal,
}

pub struct UpdateCommand {
    args: UpdateArgs,
}

impl UpdateCommand {
    pub fn new(args: UpdateArgs) -> Self {
        Self { args }
    }

    pub async fn execute(&self, desk: &TradingDesk) -> Result<()> {
        let trade = desk
            .submit(TradeAction::Update {
                trade_id: self.args.trade_id,
                stop_loss: self.args.stop,
            })
            .await?;

        println!(
            "Trade {} stop moved to {}",
            trade.trade_id,
            trade
                .stop_loss
                .map(|s| s.to_string())
                .unwrap_or_else(|| "none".to_string())
        );
        Ok(())
    }
}
