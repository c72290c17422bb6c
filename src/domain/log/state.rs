//! Series state container: app-owned, SDK-provided reconciliation logic.

use super::rate::{compute_rate_with, RateScale};
use super::wire::InboundMessage;
use super::LogEntry;
use crate::error::CollectorError;

/// Handle returned by [`SeriesModel::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&[LogEntry])>;

/// What a successful ingest did to the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The whole series was replaced; `len` entries remain after collapsing
    /// duplicate timestamps.
    Replaced { len: usize },
    /// A new timestamp was inserted at `index`.
    Inserted { index: usize },
    /// An existing timestamp at `index` took the new value.
    Updated { index: usize },
}

/// The single live series of collector readings.
///
/// Entries are always sorted by `time` with no repeated timestamps. Only
/// [`apply`](Self::apply), [`ingest`](Self::ingest) and [`clear`](Self::clear)
/// mutate it, and each call notifies every listener exactly once, after the
/// mutation is complete.
#[derive(Default)]
pub struct SeriesModel {
    entries: Vec<LogEntry>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
    rate_scale: RateScale,
}

impl std::fmt::Debug for SeriesModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeriesModel")
            .field("entries", &self.entries.len())
            .field("listeners", &self.listeners.len())
            .field("rate_scale", &self.rate_scale)
            .finish()
    }
}

impl SeriesModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate_scale(rate_scale: RateScale) -> Self {
        Self {
            rate_scale,
            ..Self::default()
        }
    }

    /// Decode a raw frame and apply it.
    ///
    /// Unrecognized payloads leave the series as it was and notify nobody.
    pub fn ingest(&mut self, payload: &str) -> Result<IngestOutcome, CollectorError> {
        let message = InboundMessage::decode(payload).inspect_err(|e| {
            tracing::warn!("Dropping inbound payload: {} (raw: {})", e, payload);
        })?;
        Ok(self.apply(message))
    }

    /// Apply a decoded message (snapshot replaces, entry merges).
    pub fn apply(&mut self, message: InboundMessage) -> IngestOutcome {
        let outcome = match message {
            InboundMessage::Snapshot(entries) => self.replace(entries),
            InboundMessage::Entry(entry) => self.upsert(entry),
        };
        self.notify();
        outcome
    }

    /// Empty the series.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.notify();
    }

    /// Re-notify listeners without touching the series (render tick).
    pub fn refresh(&mut self) {
        self.notify();
    }

    /// Register a listener. It is not called until the next mutation or refresh.
    pub fn subscribe(&mut self, listener: impl FnMut(&[LogEntry]) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns `false` if the id was unknown.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Entries sorted by time ascending.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Owned copy of the current series.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.clone()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn rate_scale(&self) -> RateScale {
        self.rate_scale
    }

    /// Rate metric of the current series in this model's scale.
    pub fn rate(&self) -> f64 {
        compute_rate_with(&self.entries, self.rate_scale)
    }

    // ── Internal ──────────────────────────────────────────────────────────

    fn replace(&mut self, mut entries: Vec<LogEntry>) -> IngestOutcome {
        // Stable, so among equal timestamps the later entry stays last.
        entries.sort_by_key(|e| e.time);
        let mut collapsed: Vec<LogEntry> = Vec::with_capacity(entries.len());
        for entry in entries {
            match collapsed.last_mut() {
                Some(last) if last.time == entry.time => *last = entry,
                _ => collapsed.push(entry),
            }
        }

        tracing::info!("Replacing series with snapshot of {} entries", collapsed.len());
        self.entries = collapsed;
        IngestOutcome::Replaced {
            len: self.entries.len(),
        }
    }

    fn upsert(&mut self, entry: LogEntry) -> IngestOutcome {
        // Fast path: the feed normally delivers in time order.
        if self.entries.last().map_or(true, |last| last.time < entry.time) {
            self.entries.push(entry);
            tracing::debug!("Appended {}", entry);
            return IngestOutcome::Inserted {
                index: self.entries.len() - 1,
            };
        }

        match self.entries.binary_search_by_key(&entry.time, |e| e.time) {
            Ok(index) => {
                self.entries[index] = entry;
                tracing::debug!("Updated {}", entry);
                IngestOutcome::Updated { index }
            }
            Err(index) => {
                self.entries.insert(index, entry);
                tracing::debug!("Inserted out-of-order {}", entry);
                IngestOutcome::Inserted { index }
            }
        }
    }

    fn notify(&mut self) {
        let entries = &self.entries;
        for (_, listener) in self.listeners.iter_mut() {
            listener(entries);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn entry(time: i64, value: f64) -> LogEntry {
        LogEntry::new(time, value)
    }

    fn is_sorted_unique(entries: &[LogEntry]) -> bool {
        entries.windows(2).all(|w| w[0].time < w[1].time)
    }

    #[test]
    fn test_snapshot_replaces_state() {
        let mut model = SeriesModel::new();
        model.apply(InboundMessage::Snapshot(vec![entry(1, 1.0), entry(2, 2.0)]));
        let outcome = model.apply(InboundMessage::Snapshot(vec![entry(5, 9.0)]));
        assert_eq!(outcome, IngestOutcome::Replaced { len: 1 });
        assert_eq!(model.entries(), &[entry(5, 9.0)]);
    }

    #[test]
    fn test_snapshot_is_idempotent() {
        let raw = r#"[{"time":30,"accumulatedValue":3},{"time":10,"accumulatedValue":1},{"time":20,"accumulatedValue":2}]"#;
        let mut once = SeriesModel::new();
        once.ingest(raw).unwrap();

        let mut twice = SeriesModel::new();
        twice.ingest(raw).unwrap();
        twice.ingest(raw).unwrap();

        assert_eq!(once.snapshot(), twice.snapshot());
        assert_eq!(twice.entries(), &[entry(10, 1.0), entry(20, 2.0), entry(30, 3.0)]);
    }

    #[test]
    fn test_snapshot_sorts_and_collapses_duplicates_last_wins() {
        let mut model = SeriesModel::new();
        model.apply(InboundMessage::Snapshot(vec![
            entry(20, 2.0),
            entry(10, 1.0),
            entry(20, 2.5),
            entry(5, 0.5),
        ]));
        assert_eq!(model.entries(), &[entry(5, 0.5), entry(10, 1.0), entry(20, 2.5)]);
    }

    #[test]
    fn test_duplicate_timestamp_last_write_wins() {
        let mut model = SeriesModel::new();
        model.ingest(r#"{"time":10,"accumulatedValue":5}"#).unwrap();
        let outcome = model.ingest(r#"{"time":10,"accumulatedValue":9}"#).unwrap();
        assert_eq!(outcome, IngestOutcome::Updated { index: 0 });
        assert_eq!(model.entries(), &[entry(10, 9.0)]);
    }

    #[test]
    fn test_out_of_order_entries_stay_sorted() {
        let mut model = SeriesModel::new();
        for t in [50, 10, 40, 20, 30, 10, 60, 0] {
            model.apply(InboundMessage::Entry(entry(t, t as f64)));
            assert!(is_sorted_unique(model.entries()));
        }
        let times: Vec<i64> = model.entries().iter().map(|e| e.time).collect();
        assert_eq!(times, vec![0, 10, 20, 30, 40, 50, 60]);
    }

    #[test]
    fn test_insert_reports_position() {
        let mut model = SeriesModel::new();
        model.apply(InboundMessage::Snapshot(vec![entry(10, 1.0), entry(30, 3.0)]));
        assert_eq!(
            model.apply(InboundMessage::Entry(entry(20, 2.0))),
            IngestOutcome::Inserted { index: 1 }
        );
        assert_eq!(
            model.apply(InboundMessage::Entry(entry(40, 4.0))),
            IngestOutcome::Inserted { index: 3 }
        );
    }

    #[test]
    fn test_snapshot_after_entries_discards_them() {
        let mut model = SeriesModel::new();
        model.apply(InboundMessage::Entry(entry(100, 1.0)));
        model.apply(InboundMessage::Entry(entry(200, 2.0)));
        model.apply(InboundMessage::Entry(entry(5, 0.1)));
        let snapshot = vec![entry(1, 10.0), entry(2, 20.0)];
        model.apply(InboundMessage::Snapshot(snapshot.clone()));
        assert_eq!(model.snapshot(), snapshot);
    }

    #[test]
    fn test_malformed_payload_leaves_series_and_does_not_notify() {
        let mut model = SeriesModel::new();
        model.apply(InboundMessage::Snapshot(vec![entry(1, 1.0)]));

        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        model.subscribe(move |_| *counter.borrow_mut() += 1);

        let result = model.ingest("{}");
        assert!(matches!(result, Err(CollectorError::MalformedMessage(_))));
        assert_eq!(model.entries(), &[entry(1, 1.0)]);
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn test_snapshot_notifies_once() {
        let mut model = SeriesModel::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        model.subscribe(move |entries| sink.borrow_mut().push(entries.len()));

        let big: Vec<LogEntry> = (0..500).map(|t| entry(t, t as f64)).collect();
        model.apply(InboundMessage::Snapshot(big));
        model.apply(InboundMessage::Entry(entry(1000, 1.0)));

        assert_eq!(*seen.borrow(), vec![500, 501]);
    }

    #[test]
    fn test_clear_and_refresh_notify() {
        let mut model = SeriesModel::new();
        model.apply(InboundMessage::Snapshot(vec![entry(1, 1.0), entry(2, 2.0)]));

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        model.subscribe(move |entries| sink.borrow_mut().push(entries.len()));

        model.refresh();
        model.clear();
        assert!(model.is_empty());
        assert_eq!(*seen.borrow(), vec![2, 0]);
    }

    #[test]
    fn test_unsubscribe() {
        let mut model = SeriesModel::new();
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        let id = model.subscribe(move |_| *counter.borrow_mut() += 1);

        model.refresh();
        assert!(model.unsubscribe(id));
        assert!(!model.unsubscribe(id));
        model.refresh();
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn test_latest_and_rate() {
        let mut model = SeriesModel::with_rate_scale(RateScale::PerHour);
        assert_eq!(model.latest(), None);
        assert_eq!(model.rate(), 0.0);
        model.apply(InboundMessage::Snapshot(vec![
            entry(0, 1.0),
            entry(3600, 2.0),
            entry(7200, 3.0),
        ]));
        assert_eq!(model.latest(), Some(&entry(7200, 3.0)));
        assert_eq!(model.rate(), 1.5);
    }
}
