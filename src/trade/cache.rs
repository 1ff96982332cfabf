//! Per-trade projection cache
//!
//! One small JSON file per trade under `trades/<ticker>/<trade_id>.json`
//! for fast lookup without full replay. Strictly derivable from the event
//! ledger; `rebuild` rewrites every projection by replaying the log.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::data_paths::DataPaths;
use crate::errors::{TradeError, WriteError};
use crate::ledger::{write_atomic, EventLogStore, TradeEvent};
use crate::trade::types::TradeObject;

#[derive(Clone)]
pub struct TradeCache {
    trades_dir: PathBuf,
}

impl TradeCache {
    pub fn new(data_paths: &DataPaths) -> Self {
        Self {
            trades_dir: data_paths.trades(),
        }
    }

    fn path_for(&self, trade: &TradeObject) -> PathBuf {
        self.trades_dir
            .join(sanitize_filename(&trade.ticker))
            .join(format!("{}.json", trade.trade_id))
    }

    /// Persist one projection atomically.
    pub fn save(&self, trade: &TradeObject) -> Result<(), WriteError> {
        let path = self.path_for(trade);
        let json = serde_json::to_vec_pretty(trade)?;
        write_atomic(&path, &json)?;
        debug!(trade_id = %trade.trade_id, path = %path.display(), "Projection cached");
        Ok(())
    }

    /// Load a cached projection if present. A missing or unreadable file
    /// is not an error; the ledger can always rebuild it.
    pub fn load(&self, ticker: &str, trade_id: Uuid) -> Option<TradeObject> {
        let path = self
            .trades_dir
            .join(sanitize_filename(ticker))
            .join(format!("{}.json", trade_id));
        let content = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(trade) => Some(trade),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Discarding unreadable projection");
                None
            }
        }
    }

    /// Cached projection, but only if it is current with the ledger's
    /// history for the trade. Stale, unreadable, or mismatched files are
    /// discarded so the caller falls back to replay.
    pub fn load_current(&self, store: &EventLogStore, trade_id: Uuid) -> Option<TradeObject> {
        let (ticker, last_seq) = store.head_for_trade(trade_id)?;
        let trade = self.load(&ticker, trade_id)?;
        if trade.trade_id == trade_id && trade.last_seq == last_seq {
            Some(trade)
        } else {
            debug!(
                trade_id = %trade_id,
                cached_seq = trade.last_seq,
                ledger_seq = last_seq,
                "Discarding stale projection"
            );
            None
        }
    }

    /// Whether any projection exists on disk yet.
    pub fn is_empty(&self) -> bool {
        let Ok(tickers) = std::fs::read_dir(&self.trades_dir) else {
            return true;
        };
        for ticker_dir in tickers.flatten() {
            if let Ok(mut files) = std::fs::read_dir(ticker_dir.path()) {
                if files.next().is_some() {
                    return false;
                }
            }
        }
        true
    }

    /// Replay the full ledger and rewrite every projection. Returns the
    /// number of trades materialized.
    pub fn rebuild(&self, store: &EventLogStore) -> Result<usize, TradeError> {
        let mut by_trade: BTreeMap<Uuid, Vec<TradeEvent>> = BTreeMap::new();
        for event in store.read_all() {
            by_trade.entry(event.trade_id).or_default().push(event);
        }

        let mut count = 0;
        for events in by_trade.values() {
            if let Some(trade) = TradeObject::replay(events) {
                self.save(&trade)?;
                count += 1;
            }
        }
        if count > 0 {
            info!(trades = count, "Projection cache rebuilt from ledger");
        }
        Ok(count)
    }
}

/// Sanitize filename to remove invalid characters
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}
