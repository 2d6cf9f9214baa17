/*!
Reconstruction of the routing table as seen at an arbitrary point in time.

A [NetworkState] starts from the most recent full table dump at or before the target time (the
baseline) and replays the update stream recorded between the baseline and the target time.

```no_run
use rib_replay::state::{parse_query_time, InMemoryStore, NetworkState, SnapshotConfig};

let store = InMemoryStore::new();
let time = parse_query_time("2018-09-25T23:45:00Z").unwrap();
let state = NetworkState::build(&store, time, None, &SnapshotConfig::default()).unwrap();
for peer in state.active_peers() {
    println!("{} {:?}", peer, state.advertised_path(&peer));
}
```
*/
mod peer;
mod store;
mod time;

pub use peer::{Advertisement, Peer};
pub use store::{HistoricalStore, InMemoryStore, RouteSink};
pub use time::{parse_query_time, BaselineSchedule, TimeWindow};

use crate::error::ReplayError;
use crate::lpm::PrefixTrie;
use crate::models::{AsPath, Asn, EventRow, RibRow, RouteFlag};
use chrono::{DateTime, Datelike, Utc};
use ipnet::IpNet;
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

/// What a withdrawal does to the per-peer summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WithdrawPolicy {
    /// Any withdrawal clears the peer's advertised ASNs and path, as if its session had reset.
    #[default]
    ClearPeer,
    /// Only the withdrawn prefix's contribution is removed; the peer's path becomes its most
    /// recent remaining announcement.
    ClearPrefix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnapshotConfig {
    pub schedule: BaselineSchedule,
    pub withdraw_policy: WithdrawPolicy,
}

/// The store queries needed to rebuild the state at `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub target: DateTime<Utc>,
    pub baseline: DateTime<Utc>,
    pub prefix: Option<IpNet>,
    /// `(baseline, target]`; `None` when the target is the baseline itself.
    pub events: Option<TimeWindow>,
}

impl QueryPlan {
    pub fn new(
        target: DateTime<Utc>,
        prefix: Option<IpNet>,
        schedule: &BaselineSchedule,
    ) -> Result<QueryPlan, ReplayError> {
        let baseline = schedule.previous_boundary(target)?;
        let events = match target == baseline {
            true => None,
            false => Some(TimeWindow::new(baseline, target)?),
        };
        Ok(QueryPlan {
            target,
            baseline,
            prefix: prefix.map(|p| p.trunc()),
            events,
        })
    }

    /// `(year, snapshot_time)` partition of the baseline dump.
    pub fn rib_partition(&self) -> (i32, DateTime<Utc>) {
        (self.baseline.year(), self.baseline)
    }

    /// `(year, month)` partitions the update query has to visit.
    pub fn event_partitions(&self) -> Vec<(i32, u32)> {
        match &self.events {
            Some(window) => window.month_buckets(),
            None => vec![],
        }
    }
}

/// Routing table state at one instant.
///
/// `prefixes` holds every prefix some peer currently advertises, mapped to the union of the
/// origin ASNs announced for it. `advertised_paths` and `advertised_ases` summarise each peer:
/// its last announced path and the origin ASNs it announced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkState {
    time: DateTime<Utc>,
    baseline: DateTime<Utc>,
    prefix: Option<IpNet>,
    policy: WithdrawPolicy,
    prefixes: PrefixTrie<BTreeSet<Asn>>,
    advertised_ases: BTreeMap<IpAddr, BTreeSet<Asn>>,
    advertised_paths: BTreeMap<IpAddr, Option<AsPath>>,
    peers: BTreeMap<IpAddr, Peer>,
    events_applied: usize,
}

impl NetworkState {
    /// Builds the state at `time`, optionally restricted to one prefix.
    ///
    /// Fails with [ReplayError::NoBaselineAvailable] when the store has no table dump at the
    /// baseline instant. A baseline dump without routes yields an empty state.
    pub fn build<S: HistoricalStore + ?Sized>(
        store: &S,
        time: DateTime<Utc>,
        prefix: Option<IpNet>,
        config: &SnapshotConfig,
    ) -> Result<NetworkState, ReplayError> {
        let plan = QueryPlan::new(time, prefix, &config.schedule)?;
        NetworkState::build_from_plan(store, &plan, config.withdraw_policy)
    }

    pub fn build_from_plan<S: HistoricalStore + ?Sized>(
        store: &S,
        plan: &QueryPlan,
        policy: WithdrawPolicy,
    ) -> Result<NetworkState, ReplayError> {
        if !store.has_snapshot(plan.baseline)? {
            return Err(ReplayError::NoBaselineAvailable(plan.target));
        }
        let (year, snapshot_time) = plan.rib_partition();
        let rows = store.select_rib(year, snapshot_time, plan.prefix.as_ref())?;
        let mut state = NetworkState::from_baseline(plan.baseline, plan.prefix, policy, rows);

        if let Some(window) = &plan.events {
            let mut events = vec![];
            for (year, month) in plan.event_partitions() {
                events.extend(store.select_events(year, month, window, plan.prefix.as_ref())?);
            }
            state.replay(events, plan.target);
        }
        info!(
            "state at {}: {} prefixes, {} of {} peers active, {} events replayed",
            state.time,
            state.prefixes.len(),
            state.active_peers().count(),
            state.peers.len(),
            state.events_applied
        );
        Ok(state)
    }

    /// State as of the baseline dump alone.
    pub fn from_baseline<I: IntoIterator<Item = RibRow>>(
        baseline: DateTime<Utc>,
        prefix: Option<IpNet>,
        policy: WithdrawPolicy,
        rows: I,
    ) -> NetworkState {
        let mut state = NetworkState {
            time: baseline,
            baseline,
            prefix,
            policy,
            prefixes: PrefixTrie::new(),
            advertised_ases: BTreeMap::new(),
            advertised_paths: BTreeMap::new(),
            peers: BTreeMap::new(),
            events_applied: 0,
        };
        for row in rows {
            state.announce(row.peer, row.prefix, row.path);
        }
        state
    }

    /// Applies update rows in `(event_time, sequence)` order and moves the state to `until`.
    /// Rows after `until` or at or before the current time are ignored.
    pub fn replay<I: IntoIterator<Item = EventRow>>(&mut self, events: I, until: DateTime<Utc>) {
        let current = self.time;
        let mut events: Vec<EventRow> = events
            .into_iter()
            .filter(|row| row.event_time > current && row.event_time <= until)
            .collect();
        events.sort_by_key(|row| (row.event_time, row.sequence));
        for row in &events {
            self.apply_event(row);
        }
        if until > self.time {
            self.time = until;
        }
    }

    /// Applies a single update row, regardless of its time.
    pub fn apply_event(&mut self, row: &EventRow) {
        match row.flag {
            RouteFlag::Withdraw => self.withdraw(row.peer, &row.prefix),
            _ if row.path.is_empty() => {
                debug!("ignoring {} from {} without a path", row.flag, row.peer);
                return;
            }
            _ => self.announce(row.peer, row.prefix, row.path.clone()),
        }
        self.events_applied += 1;
    }

    fn announce(&mut self, peer_ip: IpAddr, prefix: IpNet, path: AsPath) {
        if path.is_empty() {
            debug!("{} advertises {} with an empty path", peer_ip, prefix);
        }
        let origins = path.origin_asns();
        self.peers
            .entry(peer_ip)
            .or_insert_with(|| Peer::new(peer_ip))
            .announce(prefix, path.clone());
        self.advertised_ases
            .entry(peer_ip)
            .or_default()
            .extend(origins);
        self.advertised_paths.insert(peer_ip, Some(path));
        self.refresh_prefix(&prefix);
    }

    fn withdraw(&mut self, peer_ip: IpAddr, prefix: &IpNet) {
        let peer = self.peers.entry(peer_ip).or_insert_with(|| Peer::new(peer_ip));
        peer.withdraw(prefix);
        match self.policy {
            WithdrawPolicy::ClearPeer => {
                self.advertised_ases.insert(peer_ip, BTreeSet::new());
                self.advertised_paths.insert(peer_ip, None);
            }
            WithdrawPolicy::ClearPrefix => {
                self.advertised_ases.insert(peer_ip, peer.origin_asns());
                self.advertised_paths
                    .insert(peer_ip, peer.latest_path().cloned());
            }
        }
        self.refresh_prefix(prefix);
    }

    /// Recomputes the origin set of `prefix` from the peers still advertising it.
    fn refresh_prefix(&mut self, prefix: &IpNet) {
        let mut advertised = false;
        let mut origins = BTreeSet::new();
        for path in self.peers.values().filter_map(|peer| peer.path_to(prefix).ok()) {
            advertised = true;
            origins.extend(path.origin_asns());
        }
        match advertised {
            true => {
                self.prefixes.insert(*prefix, origins);
            }
            false => {
                self.prefixes.remove(prefix);
            }
        }
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn baseline(&self) -> DateTime<Utc> {
        self.baseline
    }

    pub fn prefix_filter(&self) -> Option<&IpNet> {
        self.prefix.as_ref()
    }

    pub fn withdraw_policy(&self) -> WithdrawPolicy {
        self.policy
    }

    pub fn events_applied(&self) -> usize {
        self.events_applied
    }

    pub fn prefixes(&self) -> &PrefixTrie<BTreeSet<Asn>> {
        &self.prefixes
    }

    /// Origin ASNs of the most specific advertised prefix covering `addr`.
    pub fn origin_of(&self, addr: &IpAddr) -> Result<(IpNet, &BTreeSet<Asn>), ReplayError> {
        self.prefixes.lookup_longest_match(addr)
    }

    pub fn advertised_ases(&self, peer: &IpAddr) -> Option<&BTreeSet<Asn>> {
        self.advertised_ases.get(peer)
    }

    pub fn advertised_path(&self, peer: &IpAddr) -> Option<&AsPath> {
        self.advertised_paths.get(peer)?.as_ref()
    }

    /// Peers whose advertised path is still set after replay.
    pub fn active_peers(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.advertised_paths
            .iter()
            .filter(|(_, path)| path.is_some())
            .map(|(peer, _)| *peer)
    }

    pub fn is_active(&self, peer: &IpAddr) -> bool {
        self.advertised_path(peer).is_some()
    }

    pub fn peers(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    /// The peer known under `address`, directly or as an alias.
    pub fn peer(&self, address: &IpAddr) -> Option<&Peer> {
        self.peers
            .get(address)
            .or_else(|| self.peers.values().find(|peer| peer.is_known_as(address)))
    }

    pub fn peer_mut(&mut self, address: &IpAddr) -> Option<&mut Peer> {
        if self.peers.contains_key(address) {
            return self.peers.get_mut(address);
        }
        self.peers
            .values_mut()
            .find(|peer| peer.is_known_as(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    fn baseline() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 9, 25, 0, 0, 0).unwrap()
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn net(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    fn rib(peer: &str, prefix: &str, path: &[u32]) -> RibRow {
        RibRow::new(
            net(prefix),
            baseline(),
            ip(peer),
            AsPath::from_sequence(path.iter().copied()),
            Asn::new_32bit(path[0]),
            baseline(),
        )
    }

    fn event(peer: &str, prefix: &str, secs: i64, flag: RouteFlag, path: &[u32]) -> EventRow {
        EventRow::new(
            net(prefix),
            baseline() + TimeDelta::seconds(secs),
            0,
            Asn::new_32bit(65000),
            AsPath::from_sequence(path.iter().copied()),
            ip(peer),
            flag,
        )
    }

    #[test]
    fn test_query_plan() {
        let schedule = BaselineSchedule::default();
        let target = baseline() + TimeDelta::hours(30);
        let plan = QueryPlan::new(target, Some(net("2001:db8::1/32")), &schedule).unwrap();
        assert_eq!(plan.baseline, baseline() + TimeDelta::days(1));
        assert_eq!(plan.prefix, Some(net("2001:db8::/32")));
        assert_eq!(plan.event_partitions(), vec![(2018, 9)]);

        let plan = QueryPlan::new(baseline(), None, &schedule).unwrap();
        assert!(plan.events.is_none());
        assert!(plan.event_partitions().is_empty());
    }

    #[test]
    fn test_baseline_load() {
        let state = NetworkState::from_baseline(
            baseline(),
            None,
            WithdrawPolicy::ClearPeer,
            vec![
                rib("2001:db8::a", "2001:db8::/32", &[1, 2, 3]),
                rib("2001:db8::b", "2001:db8::/32", &[4, 5, 6]),
            ],
        );
        let (prefix, origins) = state.origin_of(&ip("2001:db8::99")).unwrap();
        assert_eq!(prefix, net("2001:db8::/32"));
        assert_eq!(origins.iter().map(|a| a.asn).collect::<Vec<_>>(), vec![3, 6]);
        assert_eq!(state.active_peers().count(), 2);
        assert!(state.origin_of(&ip("2001:db9::1")).is_err());
    }

    #[test]
    fn test_set_origin_expands() {
        let path: AsPath = "1 2 {3,4}".parse().unwrap();
        let row = RibRow::new(
            net("2001:db8::/32"),
            baseline(),
            ip("2001:db8::a"),
            path,
            Asn::new_32bit(1),
            baseline(),
        );
        let state =
            NetworkState::from_baseline(baseline(), None, WithdrawPolicy::ClearPeer, vec![row]);
        let ases = state.advertised_ases(&ip("2001:db8::a")).unwrap();
        assert_eq!(ases.iter().map(|a| a.asn).collect::<Vec<_>>(), vec![3, 4]);
    }

    #[test]
    fn test_withdraw_policies() {
        let rows = vec![
            rib("2001:db8::a", "2001:db8::/32", &[1, 2, 3]),
            rib("2001:db8::a", "2001:db9::/32", &[1, 7]),
        ];
        let withdraw = event("2001:db8::a", "2001:db9::/32", 10, RouteFlag::Withdraw, &[]);
        let peer = ip("2001:db8::a");

        let mut clear_peer =
            NetworkState::from_baseline(baseline(), None, WithdrawPolicy::ClearPeer, rows.clone());
        clear_peer.replay(vec![withdraw.clone()], baseline() + TimeDelta::seconds(20));
        assert!(!clear_peer.is_active(&peer));
        assert!(clear_peer.advertised_ases(&peer).unwrap().is_empty());
        // the prefix index still reflects what the peer advertises
        assert!(clear_peer.prefixes().contains(&net("2001:db8::/32")));
        assert!(!clear_peer.prefixes().contains(&net("2001:db9::/32")));

        let mut clear_prefix =
            NetworkState::from_baseline(baseline(), None, WithdrawPolicy::ClearPrefix, rows);
        clear_prefix.replay(vec![withdraw], baseline() + TimeDelta::seconds(20));
        assert_eq!(
            clear_prefix.advertised_path(&peer),
            Some(&AsPath::from_sequence([1, 2, 3]))
        );
        assert_eq!(
            clear_prefix
                .advertised_ases(&peer)
                .unwrap()
                .iter()
                .map(|a| a.asn)
                .collect::<Vec<_>>(),
            vec![3]
        );
    }

    #[test]
    fn test_replay_order_and_bounds() {
        let mut state = NetworkState::from_baseline(
            baseline(),
            None,
            WithdrawPolicy::ClearPeer,
            vec![rib("2001:db8::a", "2001:db8::/32", &[1, 2, 3])],
        );
        let mut second = event("2001:db8::a", "2001:db8::/32", 10, RouteFlag::Announce, &[1, 9]);
        second.sequence = 1;
        let first = event("2001:db8::a", "2001:db8::/32", 10, RouteFlag::Withdraw, &[]);
        let too_late = event("2001:db8::a", "2001:db8::/32", 100, RouteFlag::Withdraw, &[]);
        state.replay(vec![second, too_late, first], baseline() + TimeDelta::seconds(50));

        assert_eq!(state.events_applied(), 2);
        assert_eq!(state.time(), baseline() + TimeDelta::seconds(50));
        assert_eq!(
            state.advertised_path(&ip("2001:db8::a")),
            Some(&AsPath::from_sequence([1, 9]))
        );
    }

    #[test]
    fn test_announce_without_path_is_ignored() {
        let mut state =
            NetworkState::from_baseline(baseline(), None, WithdrawPolicy::ClearPeer, vec![]);
        state.apply_event(&event("2001:db8::a", "2001:db8::/32", 1, RouteFlag::Announce, &[]));
        assert_eq!(state.events_applied(), 0);
        assert!(state.prefixes().is_empty());
        assert!(state.peer(&ip("2001:db8::a")).is_none());
    }

    #[test]
    fn test_no_baseline() {
        let store = InMemoryStore::new();
        let result = NetworkState::build(
            &store,
            baseline() + TimeDelta::hours(1),
            None,
            &SnapshotConfig::default(),
        );
        assert!(matches!(result, Err(ReplayError::NoBaselineAvailable(_))));

        let mut store = InMemoryStore::new();
        store.add_empty_snapshot(baseline());
        let state = NetworkState::build(
            &store,
            baseline() + TimeDelta::hours(1),
            None,
            &SnapshotConfig::default(),
        )
        .unwrap();
        assert!(state.prefixes().is_empty());
        assert_eq!(state.active_peers().count(), 0);
    }
}
