use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;

use crate::desk::TradingDesk;
use crate::portfolio::{SnapshotFormatter, TickerFilter};

#[derive(Args, Clone)]
pub struct SnapshotArgs {
    /// Reconstruct the portfolio at this RFC 3339 instant instead of now
    /// (e.g., 2026-08-01T15:30:00Z)
    #[arg(long)]
    pub at: Option<String>,

    /// Limit the report to these tickers (repeatable)
    #[arg(long = "ticker")]
    pub tickers: Vec<String>,
}

pub struct SnapshotCommand {
    args: SnapshotArgs,
}

impl SnapshotCommand {
    pub fn new(args: SnapshotArgs) -> Self {
        Self { args }
    }

    pub async fn execute(&self, desk: &TradingDesk) -> Result<()> {
        let cutoff = match &self.args.at {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(raw)
                    .with_context(|| format!("invalid --at timestamp: {}", raw))?
                    .with_timezone(&Utc),
            ),
            None => None,
        };

        let filter = TickerFilter::new(self.args.tickers.iter().cloned());
        let filter = (!filter.is_empty()).then_some(filter);

        let snapshot = desk.snapshot(cutoff, filter.as_ref()).await?;
        let formatter = SnapshotFormatter::new(&snapshot);

        print!("{}", formatter.format_summary());
        print!("{}", formatter.format_positions());
        print!("{}", formatter.format_orders());
        print!("{}", formatter.format_issues());
        Ok(())
    }
}
