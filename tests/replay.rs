//! Rebuilding routing state from dumps ingested into the in-memory store.
mod common;

use chrono::{DateTime, TimeDelta, Utc};
use common::*;
use ipnet::IpNet;
use rib_replay::border::{annotate_peer, BorderConfig, HopDistances, PrefixAsnMapping};
use rib_replay::models::{AsPath, Asn};
use rib_replay::models::{EventRow, RibRow};
use rib_replay::state::{BaselineSchedule, TimeWindow, WithdrawPolicy};
use rib_replay::{
    ingest_file, ingest_reader, DumpKind, HistoricalStore, InMemoryStore, NetworkState,
    ReplayError, SnapshotConfig,
};
use std::collections::BTreeSet;
use std::io::Cursor;
use std::net::IpAddr;

/// 2018-09-25T00:00:00Z
const BASELINE: u32 = 1537833600;

fn at(secs: u32) -> DateTime<Utc> {
    DateTime::from_timestamp(secs as i64, 0).unwrap()
}

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

fn asns(values: &[u32]) -> BTreeSet<Asn> {
    values.iter().copied().map(Asn::from).collect()
}

/// Two peers; P1 reaches 2001:db8::/32 through AS 2, P2 reaches it directly and also carries
/// 2001:db8:ff00::/40 originated by AS 5.
fn rib_dump(time: u32) -> Vec<u8> {
    let peers = [(v6("2001:db8::a"), 65010), (v6("2001:db8::b"), 65020)];
    let mut data = record(time, TABLE_DUMP_V2, PEER_INDEX_TABLE, &peer_index_table(&peers));
    data.extend(record(
        time,
        TABLE_DUMP_V2,
        RIB_IPV6_UNICAST,
        &rib_ipv6(
            0,
            &net("2001:db8::/32"),
            &[(0, &[65010, 2, 3]), (1, &[65020, 3])],
        ),
    ));
    data.extend(record(
        time,
        TABLE_DUMP_V2,
        RIB_IPV6_UNICAST,
        &rib_ipv6(1, &net("2001:db8:ff00::/40"), &[(1, &[65020, 5])]),
    ));
    data
}

/// P1 withdraws 2001:db8::/32 ten seconds after the baseline, then announces 2001:db8:1::/48
/// at +20s.
fn update_dump() -> Vec<u8> {
    let p1 = v6("2001:db8::a");
    let mut data = record(
        BASELINE + 10,
        BGP4MP,
        BGP4MP_MESSAGE_AS4,
        &withdraw_v6(p1, 65010, &[net("2001:db8::/32")]),
    );
    data.extend(record(
        BASELINE + 12,
        BGP4MP,
        BGP4MP_STATE_CHANGE_AS4,
        &state_change(p1, 65010, 6, 1),
    ));
    data.extend(record(
        BASELINE + 20,
        BGP4MP,
        BGP4MP_MESSAGE_AS4,
        &announce_v6(p1, 65010, &[65010, 9], &[net("2001:db8:1::/48")]),
    ));
    data
}

fn loaded_store() -> InMemoryStore {
    let mut store = InMemoryStore::new();
    let rib = ingest_reader(Cursor::new(rib_dump(BASELINE)), DumpKind::Rib, &mut store).unwrap();
    assert_eq!(rib.records, 3);
    assert_eq!(rib.routes, 3);

    let updates = ingest_reader(Cursor::new(update_dump()), DumpKind::Updates, &mut store).unwrap();
    assert_eq!(updates.records, 3);
    assert_eq!(updates.routes, 2);
    assert_eq!(updates.state_changes, 1);
    assert!(!updates.truncated);
    store
}

#[test]
fn withdrawal_deactivates_the_peer() -> anyhow::Result<()> {
    let store = loaded_store();
    let config = SnapshotConfig::default();
    let p1 = ip("2001:db8::a");
    let p2 = ip("2001:db8::b");

    let before = NetworkState::build(&store, at(BASELINE + 5), None, &config)?;
    assert_eq!(before.baseline(), at(BASELINE));
    assert_eq!(before.events_applied(), 0);
    assert_eq!(
        before.advertised_path(&p1),
        Some(&AsPath::from_sequence([65010, 2, 3]))
    );
    assert_eq!(before.active_peers().collect::<Vec<_>>(), vec![p1, p2]);

    let after = NetworkState::build(&store, at(BASELINE + 15), None, &config)?;
    assert_eq!(after.time(), at(BASELINE + 15));
    assert_eq!(after.events_applied(), 1);
    assert!(!after.is_active(&p1));
    assert_eq!(after.active_peers().collect::<Vec<_>>(), vec![p2]);
    // P2 still carries the prefix
    let (prefix, origins) = after.origin_of(&ip("2001:db8::1"))?;
    assert_eq!(prefix, net("2001:db8::/32"));
    assert_eq!(origins, &asns(&[3]));

    let later = NetworkState::build(&store, at(BASELINE + 30), None, &config)?;
    assert!(later.is_active(&p1));
    assert_eq!(later.advertised_path(&p1).unwrap().to_string(), "65010 9");
    assert_eq!(
        later.origin_of(&ip("2001:db8:1::1"))?.0,
        net("2001:db8:1::/48")
    );
    Ok(())
}

#[test]
fn clear_prefix_keeps_the_remaining_summary() -> anyhow::Result<()> {
    let store = loaded_store();
    let config = SnapshotConfig {
        withdraw_policy: WithdrawPolicy::ClearPrefix,
        ..Default::default()
    };
    let state = NetworkState::build(&store, at(BASELINE + 15), None, &config)?;
    // P1 had nothing else left after the withdrawal
    assert!(!state.is_active(&ip("2001:db8::a")));
    assert_eq!(state.advertised_ases(&ip("2001:db8::a")), Some(&BTreeSet::new()));
    assert_eq!(state.advertised_ases(&ip("2001:db8::b")), Some(&asns(&[3, 5])));
    Ok(())
}

#[test]
fn query_at_the_baseline_is_the_dump_itself() -> anyhow::Result<()> {
    let store = loaded_store();
    let state = NetworkState::build(&store, at(BASELINE), None, &SnapshotConfig::default())?;

    let rows = store.select_rib(2018, at(BASELINE), None)?;
    let expected = NetworkState::from_baseline(at(BASELINE), None, WithdrawPolicy::ClearPeer, rows);
    assert_eq!(state, expected);
    assert_eq!(state.prefixes().len(), 2);
    Ok(())
}

#[test]
fn prefix_filter_restricts_the_state() -> anyhow::Result<()> {
    let store = loaded_store();
    let state = NetworkState::build(
        &store,
        at(BASELINE + 30),
        Some(net("2001:db8:ff00::/40")),
        &SnapshotConfig::default(),
    )?;
    assert_eq!(state.prefixes().len(), 1);
    assert!(state.is_active(&ip("2001:db8::b")));
    assert!(!state.is_active(&ip("2001:db8::a")));
    Ok(())
}

#[test]
fn missing_baseline_is_an_error() {
    let store = loaded_store();
    let next_day = at(BASELINE + 86400 + 60);
    assert!(matches!(
        NetworkState::build(&store, next_day, None, &SnapshotConfig::default()),
        Err(ReplayError::NoBaselineAvailable(t)) if t == next_day
    ));
}

/// A store whose backend is unreachable.
struct OfflineStore;

impl HistoricalStore for OfflineStore {
    fn has_snapshot(&self, _: DateTime<Utc>) -> Result<bool, ReplayError> {
        Err(ReplayError::Store("connection refused".to_string()))
    }

    fn select_rib(
        &self,
        _: i32,
        _: DateTime<Utc>,
        _: Option<&IpNet>,
    ) -> Result<Vec<RibRow>, ReplayError> {
        Ok(vec![])
    }

    fn select_events(
        &self,
        _: i32,
        _: u32,
        _: &TimeWindow,
        _: Option<&IpNet>,
    ) -> Result<Vec<EventRow>, ReplayError> {
        Ok(vec![])
    }
}

#[test]
fn store_failure_is_passed_through() {
    let result = NetworkState::build(
        &OfflineStore,
        at(BASELINE + 5),
        None,
        &SnapshotConfig::default(),
    );
    assert!(matches!(result, Err(ReplayError::Store(msg)) if msg == "connection refused"));
}

#[test]
fn replay_crosses_a_month_boundary() -> anyhow::Result<()> {
    // weekly dumps, one of them on Sunday 2018-09-30 00:00
    let sunday = at(1538265600);
    let week = TimeDelta::days(7);
    let config = SnapshotConfig {
        schedule: BaselineSchedule {
            interval: week,
            offset: TimeDelta::seconds(sunday.timestamp().rem_euclid(week.num_seconds())),
        },
        ..Default::default()
    };

    let mut store = InMemoryStore::new();
    ingest_reader(Cursor::new(rib_dump(1538265600)), DumpKind::Rib, &mut store)?;
    let p2 = v6("2001:db8::b");
    let mut updates = record(
        1538265600 + 3600,
        BGP4MP,
        BGP4MP_MESSAGE_AS4,
        &announce_v6(p2, 65020, &[65020, 6], &[net("2001:db8:100::/40")]),
    );
    updates.extend(record(
        1538352000 + 3600,
        BGP4MP,
        BGP4MP_MESSAGE_AS4,
        &announce_v6(p2, 65020, &[65020, 7], &[net("2001:db8:200::/40")]),
    ));
    ingest_reader(Cursor::new(updates), DumpKind::Updates, &mut store)?;

    let state = NetworkState::build(&store, at(1538352000 + 7200), None, &config)?;
    assert_eq!(state.baseline(), sunday);
    assert_eq!(state.events_applied(), 2);
    assert_eq!(state.origin_of(&ip("2001:db8:100::1"))?.1, &asns(&[6]));
    assert_eq!(state.origin_of(&ip("2001:db8:200::1"))?.1, &asns(&[7]));
    assert_eq!(
        state.advertised_path(&ip("2001:db8::b")).unwrap().to_string(),
        "65020 7"
    );
    Ok(())
}

#[test]
fn ingest_archive_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("rib.20180925.0000");
    std::fs::write(&path, rib_dump(BASELINE))?;
    let path = path.to_str().unwrap();

    let kind = DumpKind::from_file_name(path).unwrap();
    assert_eq!(kind, DumpKind::Rib);
    let mut store = InMemoryStore::new();
    let summary = ingest_file(path, kind, &mut store)?;
    assert_eq!(summary.routes, 3);
    assert!(store.has_snapshot(at(BASELINE))?);
    Ok(())
}

#[test]
fn border_distances_from_reconstructed_state() -> anyhow::Result<()> {
    let store = loaded_store();
    let snapshot = SnapshotConfig::default();
    let mut state = NetworkState::build(&store, at(BASELINE + 5), None, &snapshot)?;
    let config = BorderConfig::default();
    let mapping = PrefixAsnMapping::from_network_state(&state, &config);
    assert_eq!(mapping.len(), 2);

    // two hops inside AS 3, then the first reply from AS 5
    let trace = "T\t2001:db8::a\t2001:db8:ff00::1\t1\t1\t1537833700\tC\t0\t0\t0\tC\t5\tI\t\
                 2001:db8::a,0.1,1\t2001:db8::2,1.2,1\t2001:db8:ff00::9,3.4,1";
    let mut distances = HopDistances::new();
    let summary = distances.process_reader(trace.as_bytes(), &mapping, &config)?;
    assert_eq!(summary.used, 1);

    let destination = net("2001:db8:ff00::/40");
    assert_eq!(distances.distance(&ip("2001:db8::a"), &destination), Some(1));
    assert_eq!(distances.distance(&ip("2001:db8::2"), &destination), Some(0));
    assert_eq!(distances.distance(&ip("2001:db8:ff00::9"), &destination), Some(-1));

    let peer = state.peer_mut(&ip("2001:db8::a")).unwrap();
    assert_eq!(annotate_peer(peer, &distances, &mapping), 1);
    assert_eq!(peer.hops_to_as(&Asn::from(5))?, 1);
    Ok(())
}
