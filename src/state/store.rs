/*!
The seams between the engine and persistent storage.

Extraction writes into a [RouteSink]; state reconstruction reads from a [HistoricalStore].
Both are traits so that a database backed store can be plugged in; [InMemoryStore] implements
both and is what the tests and the command line tool use.
*/
use crate::error::ReplayError;
use crate::models::{EventRow, RibRow};
use crate::state::TimeWindow;
use chrono::{DateTime, Datelike, Utc};
use ipnet::IpNet;
use std::collections::{BTreeMap, BTreeSet};

/// Receives canonical rows as they are extracted.
pub trait RouteSink {
    fn insert_rib(&mut self, row: RibRow) -> Result<(), ReplayError>;

    fn insert_event(&mut self, row: EventRow) -> Result<(), ReplayError>;
}

impl<S: RouteSink + ?Sized> RouteSink for &mut S {
    fn insert_rib(&mut self, row: RibRow) -> Result<(), ReplayError> {
        (**self).insert_rib(row)
    }

    fn insert_event(&mut self, row: EventRow) -> Result<(), ReplayError> {
        (**self).insert_event(row)
    }
}

/// Read side of the historical store.
///
/// Rows come back ordered ascending by time, then by sequence. A store that cannot answer
/// (a database backed one losing its connection, say) returns [ReplayError::Store], which
/// [NetworkState::build](crate::NetworkState::build) passes through unchanged.
pub trait HistoricalStore {
    /// Whether a table dump taken at `snapshot_time` was ever loaded.
    fn has_snapshot(&self, snapshot_time: DateTime<Utc>) -> Result<bool, ReplayError>;

    fn select_rib(
        &self,
        year: i32,
        snapshot_time: DateTime<Utc>,
        prefix: Option<&IpNet>,
    ) -> Result<Vec<RibRow>, ReplayError>;

    /// Update rows of one `(year, month)` partition whose event time falls in
    /// `(window.start, window.end]`.
    fn select_events(
        &self,
        year: i32,
        month: u32,
        window: &TimeWindow,
        prefix: Option<&IpNet>,
    ) -> Result<Vec<EventRow>, ReplayError>;
}

/// Rows held in memory, partitioned the way a wide-column store would partition them.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    ribs: BTreeMap<(i32, DateTime<Utc>), Vec<RibRow>>,
    events: BTreeMap<(i32, u32), Vec<EventRow>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table dump with no routes, e.g. a collector that was up but had no peers.
    pub fn add_empty_snapshot(&mut self, snapshot_time: DateTime<Utc>) {
        self.ribs
            .entry((snapshot_time.year(), snapshot_time))
            .or_default();
    }

    pub fn snapshots(&self) -> BTreeSet<DateTime<Utc>> {
        self.ribs.keys().map(|(_, time)| *time).collect()
    }

    pub fn rib_len(&self) -> usize {
        self.ribs.values().map(Vec::len).sum()
    }

    pub fn event_len(&self) -> usize {
        self.events.values().map(Vec::len).sum()
    }
}

fn matches_prefix(row_prefix: &IpNet, filter: Option<&IpNet>) -> bool {
    filter.is_none_or(|prefix| prefix == row_prefix)
}

impl RouteSink for InMemoryStore {
    fn insert_rib(&mut self, row: RibRow) -> Result<(), ReplayError> {
        self.ribs
            .entry((row.year, row.snapshot_time))
            .or_default()
            .push(row);
        Ok(())
    }

    fn insert_event(&mut self, row: EventRow) -> Result<(), ReplayError> {
        self.events
            .entry((row.year, row.month))
            .or_default()
            .push(row);
        Ok(())
    }
}

impl HistoricalStore for InMemoryStore {
    fn has_snapshot(&self, snapshot_time: DateTime<Utc>) -> Result<bool, ReplayError> {
        Ok(self
            .ribs
            .contains_key(&(snapshot_time.year(), snapshot_time)))
    }

    fn select_rib(
        &self,
        year: i32,
        snapshot_time: DateTime<Utc>,
        prefix: Option<&IpNet>,
    ) -> Result<Vec<RibRow>, ReplayError> {
        let rows = match self.ribs.get(&(year, snapshot_time)) {
            Some(rows) => rows,
            None => return Ok(vec![]),
        };
        let mut selected: Vec<RibRow> = rows
            .iter()
            .filter(|row| matches_prefix(&row.prefix, prefix))
            .cloned()
            .collect();
        selected.sort_by_key(|row| row.observed_time);
        Ok(selected)
    }

    fn select_events(
        &self,
        year: i32,
        month: u32,
        window: &TimeWindow,
        prefix: Option<&IpNet>,
    ) -> Result<Vec<EventRow>, ReplayError> {
        let rows = match self.events.get(&(year, month)) {
            Some(rows) => rows,
            None => return Ok(vec![]),
        };
        let mut selected: Vec<EventRow> = rows
            .iter()
            .filter(|row| window.covers(&row.event_time) && matches_prefix(&row.prefix, prefix))
            .cloned()
            .collect();
        selected.sort_by_key(|row| (row.event_time, row.sequence));
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AsPath, Asn, RouteFlag};
    use chrono::TimeZone;

    fn event(prefix: &str, secs: i64, sequence: u32) -> EventRow {
        EventRow::new(
            prefix.parse().unwrap(),
            DateTime::from_timestamp(secs, 0).unwrap(),
            sequence,
            Asn::new_32bit(65000),
            AsPath::from_sequence([65000, 1]),
            "2001:db8::1".parse().unwrap(),
            RouteFlag::Announce,
        )
    }

    #[test]
    fn test_select_events_orders_and_filters() {
        let base = Utc.with_ymd_and_hms(2018, 9, 1, 0, 0, 0).unwrap().timestamp();
        let mut store = InMemoryStore::new();
        store.insert_event(event("2001:db8::/32", base + 20, 0)).unwrap();
        store.insert_event(event("2001:db8::/32", base + 10, 1)).unwrap();
        store.insert_event(event("2001:db8::/32", base + 10, 0)).unwrap();
        store.insert_event(event("2001:db9::/32", base + 10, 0)).unwrap();
        store.insert_event(event("2001:db8::/32", base, 0)).unwrap();
        assert_eq!(store.event_len(), 5);

        let window = TimeWindow::new(
            DateTime::from_timestamp(base, 0).unwrap(),
            DateTime::from_timestamp(base + 20, 0).unwrap(),
        )
        .unwrap();
        let prefix: IpNet = "2001:db8::/32".parse().unwrap();
        let rows = store.select_events(2018, 9, &window, Some(&prefix)).unwrap();
        let keys: Vec<(i64, u32)> = rows
            .iter()
            .map(|r| (r.event_time.timestamp() - base, r.sequence))
            .collect();
        assert_eq!(keys, vec![(10, 0), (10, 1), (20, 0)]);

        assert_eq!(store.select_events(2018, 9, &window, None).unwrap().len(), 4);
        assert!(store.select_events(2018, 10, &window, None).unwrap().is_empty());
    }

    #[test]
    fn test_snapshots() {
        let snapshot = Utc.with_ymd_and_hms(2018, 9, 1, 0, 0, 0).unwrap();
        let mut store = InMemoryStore::new();
        assert!(!store.has_snapshot(snapshot).unwrap());
        store.add_empty_snapshot(snapshot);
        assert!(store.has_snapshot(snapshot).unwrap());
        assert!(store.select_rib(2018, snapshot, None).unwrap().is_empty());
        assert_eq!(store.snapshots().into_iter().collect::<Vec<_>>(), vec![snapshot]);
    }
}
