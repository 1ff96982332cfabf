//! Event log store
//!
//! Append-only persistence of trade events in one JSONL segment file under
//! the ledger directory. Append is the single mutating operation and takes
//! the write lock; reconstruction reads run concurrently under read locks.

use std::path::PathBuf;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::data_paths::DataPaths;
use crate::errors::{TradeError, WriteError};
use crate::ledger::atomic::write_atomic;
use crate::ledger::event::TradeEvent;

const SEGMENT_FILE: &str = "events.jsonl";

struct Inner {
    events: Vec<TradeEvent>,
    next_seq: u64,
}

/// Append-only, immutable store of trade events.
pub struct EventLogStore {
    segment_path: PathBuf,
    inner: RwLock<Inner>,
}

impl EventLogStore {
    /// Open (or create) the ledger under the data directory.
    ///
    /// A corrupt segment is fatal: the ledger is the source of truth and
    /// silently skipping records would corrupt every snapshot built on it.
    pub fn open(data_paths: &DataPaths) -> Result<Self, TradeError> {
        let segment_path = data_paths.ledger().join(SEGMENT_FILE);

        let mut events: Vec<TradeEvent> = Vec::new();
        if segment_path.exists() {
            let content = std::fs::read_to_string(&segment_path)
                .map_err(|e| TradeError::ledger(format!("{}: {}", segment_path.display(), e)))?;
            for (lineno, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let event: TradeEvent = serde_json::from_str(line).map_err(|e| {
                    TradeError::ledger(format!(
                        "{} line {}: {}",
                        segment_path.display(),
                        lineno + 1,
                        e
                    ))
                })?;
                events.push(event);
            }
        }

        let next_seq = events.iter().map(|e| e.seq + 1).max().unwrap_or(0);
        info!(
            segment = %segment_path.display(),
            events = events.len(),
            "Event ledger opened"
        );

        Ok(Self {
            segment_path,
            inner: RwLock::new(Inner { events, next_seq }),
        })
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one event, assigning its sequence number.
    ///
    /// Fail-fast: the event counts as written only after the segment has
    /// durably replaced its previous version. On error the in-memory index
    /// and the file are both unchanged.
    pub fn append(&self, mut event: TradeEvent) -> Result<TradeEvent, WriteError> {
        let mut inner = self.write_guard();
        event.seq = inner.next_seq;

        let mut buf = Vec::with_capacity((inner.events.len() + 1) * 160);
        for existing in &inner.events {
            serde_json::to_writer(&mut buf, existing)?;
            buf.push(b'\n');
        }
        serde_json::to_writer(&mut buf, &event)?;
        buf.push(b'\n');

        write_atomic(&self.segment_path, &buf)?;

        inner.next_seq += 1;
        inner.events.push(event.clone());
        debug!(
            event_id = %event.event_id,
            trade_id = %event.trade_id,
            ticker = %event.ticker,
            event_type = ?event.event_type,
            seq = event.seq,
            "Event appended"
        );
        Ok(event)
    }

    /// All events at or before `cutoff`, ascending by (timestamp, seq).
    pub fn read_up_to(&self, cutoff: DateTime<Utc>) -> Vec<TradeEvent> {
        let inner = self.read_guard();
        let mut events: Vec<TradeEvent> = inner
            .events
            .iter()
            .filter(|e| e.timestamp <= cutoff)
            .cloned()
            .collect();
        events.sort_by(|a, b| (a.timestamp, a.seq).cmp(&(b.timestamp, b.seq)));
        events
    }

    /// The full log, ascending by (timestamp, seq).
    pub fn read_all(&self) -> Vec<TradeEvent> {
        let inner = self.read_guard();
        let mut events = inner.events.clone();
        events.sort_by(|a, b| (a.timestamp, a.seq).cmp(&(b.timestamp, b.seq)));
        events
    }

    /// Event history for one trade, ascending by (timestamp, seq).
    pub fn read_for_trade(&self, trade_id: Uuid) -> Vec<TradeEvent> {
        let inner = self.read_guard();
        let mut events: Vec<TradeEvent> = inner
            .events
            .iter()
            .filter(|e| e.trade_id == trade_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| (a.timestamp, a.seq).cmp(&(b.timestamp, b.seq)));
        events
    }

    /// Ticker and highest sequence number recorded for a trade, without
    /// cloning its event history.
    pub fn head_for_trade(&self, trade_id: Uuid) -> Option<(String, u64)> {
        let inner = self.read_guard();
        let mut head: Option<(String, u64)> = None;
        for event in inner.events.iter().filter(|e| e.trade_id == trade_id) {
            match head.as_mut() {
                None => head = Some((event.ticker.clone(), event.seq)),
                Some((_, seq)) => *seq = (*seq).max(event.seq),
            }
        }
        head
    }

    pub fn len(&self) -> usize {
        self.read_guard().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::event::EventType;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn open_store(dir: &std::path::Path) -> (DataPaths, EventLogStore) {
        let paths = DataPaths::new(dir);
        paths.ensure_directories().unwrap();
        let store = EventLogStore::open(&paths).unwrap();
        (paths, store)
    }

    #[test]
    fn append_assigns_monotone_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let (_paths, store) = open_store(dir.path());
        let trade_id = Uuid::new_v4();

        let a = store
            .append(TradeEvent::record(
                trade_id,
                "AAPL",
                EventType::Open,
                dec!(100),
                dec!(150),
            ))
            .unwrap();
        let b = store
            .append(TradeEvent::record(
                trade_id,
                "AAPL",
                EventType::Fill,
                dec!(-40),
                dec!(160),
            ))
            .unwrap();

        assert_eq!(a.seq, 0);
        assert_eq!(b.seq, 1);
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let trade_id = Uuid::new_v4();
        {
            let (_paths, store) = open_store(dir.path());
            store
                .append(TradeEvent::record(
                    trade_id,
                    "AAPL",
                    EventType::Open,
                    dec!(100),
                    dec!(150),
                ))
                .unwrap();
        }

        let (_paths, store) = open_store(dir.path());
        let events = store.read_all();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].trade_id, trade_id);
        assert_eq!(events[0].seq, 0);

        // Sequence numbering continues where the segment left off.
        let next = store
            .append(TradeEvent::record(
                trade_id,
                "AAPL",
                EventType::RefreshSync,
                Decimal::ZERO,
                Decimal::ZERO,
            ))
            .unwrap();
        assert_eq!(next.seq, 1);
    }

    #[test]
    fn read_up_to_excludes_later_events() {
        let dir = tempfile::tempdir().unwrap();
        let (_paths, store) = open_store(dir.path());
        let trade_id = Uuid::new_v4();
        let t0 = Utc::now();

        store
            .append(
                TradeEvent::record(trade_id, "AAPL", EventType::Open, dec!(100), dec!(150))
                    .with_timestamp(t0),
            )
            .unwrap();
        store
            .append(
                TradeEvent::record(trade_id, "AAPL", EventType::Fill, dec!(-40), dec!(160))
                    .with_timestamp(t0 + chrono::Duration::hours(1)),
            )
            .unwrap();

        assert_eq!(store.read_up_to(t0).len(), 1);
        assert_eq!(
            store
                .read_up_to(t0 + chrono::Duration::hours(2))
                .len(),
            2
        );
    }

    #[test]
    fn timestamp_ties_break_by_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let (_paths, store) = open_store(dir.path());
        let trade_id = Uuid::new_v4();
        let ts = Utc::now();

        for qty in [dec!(10), dec!(20), dec!(30)] {
            store
                .append(
                    TradeEvent::record(trade_id, "AAPL", EventType::Fill, qty, dec!(100))
                        .with_timestamp(ts),
                )
                .unwrap();
        }

        let events = store.read_up_to(ts);
        let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn head_tracks_latest_sequence_per_trade() {
        let dir = tempfile::tempdir().unwrap();
        let (_paths, store) = open_store(dir.path());
        let trade_id = Uuid::new_v4();
        let other = Uuid::new_v4();

        store
            .append(TradeEvent::record(
                trade_id,
                "AAPL",
                EventType::Open,
                dec!(100),
                dec!(150),
            ))
            .unwrap();
        store
            .append(TradeEvent::record(
                other,
                "MSFT",
                EventType::Open,
                dec!(10),
                dec!(400),
            ))
            .unwrap();
        store
            .append(TradeEvent::record(
                trade_id,
                "AAPL",
                EventType::Fill,
                Decimal::ZERO,
                dec!(150),
            ))
            .unwrap();

        assert_eq!(store.head_for_trade(trade_id), Some(("AAPL".to_string(), 2)));
        assert_eq!(store.head_for_trade(other), Some(("MSFT".to_string(), 1)));
        assert_eq!(store.head_for_trade(Uuid::new_v4()), None);
    }

    #[test]
    fn failed_append_leaves_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let (paths, store) = open_store(dir.path());
        let trade_id = Uuid::new_v4();

        store
            .append(TradeEvent::record(
                trade_id,
                "AAPL",
                EventType::Open,
                dec!(100),
                dec!(150),
            ))
            .unwrap();

        // Simulate a crash mid-write: the temp path is unusable, so the
        // durable writer fails before touching the segment.
        let blocked_tmp = paths.ledger().join(format!("{}.tmp", SEGMENT_FILE));
        std::fs::create_dir(&blocked_tmp).unwrap();

        let result = store.append(TradeEvent::record(
            trade_id,
            "AAPL",
            EventType::Fill,
            dec!(-40),
            dec!(160),
        ));
        assert!(result.is_err());
        assert_eq!(store.len(), 1);

        // Re-reading from disk shows the pre-write state.
        std::fs::remove_dir(&blocked_tmp).unwrap();
        let reopened = EventLogStore::open(&paths).unwrap();
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn corrupt_segment_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        paths.ensure_directories().unwrap();
        std::fs::write(paths.ledger().join(SEGMENT_FILE), "{broken\n").unwrap();

        assert!(matches!(
            EventLogStore::open(&paths),
            Err(TradeError::Ledger { .. })
        ));
    }
}
