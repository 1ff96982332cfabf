use anyhow::{anyhow, Result};
use clap::Args;

use crate::desk::TradingDesk;
use crate::portfolio::TradesFormatter;
use crate::trade::TradeStatus;

#[derive(Args, Clone)]
pub struct TradesArgs {
    /// Only show trades in this status (OPENING, OPEN, CLOSING, CLOSED,
    /// CANCELLED)
    #[arg(long)]
    pub status: Option<String>,
}

pub struct TradesCommand {
    args: TradesArgs,
}

impl TradesCommand {
    pub fn new(args: TradesArgs) -> Self {
        Self { args }
    }

    pub async fn execute(&self, desk: &TradingDesk) -> Result<()> {
        let status = match &self.args.status {
            Some(raw) => Some(raw.parse::<TradeStatus>().map_err(|e| anyhow!(e))?),
            None => None,
        };

        let trades = desk.list_trades(status)?;
        if trades.is_empty() {
            println!("No trades.");
            return Ok(());
        }

        print!("{}", TradesFormatter::new(&trades).format_table());
        Ok(())
    }
}
