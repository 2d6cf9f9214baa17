/*!
Border-distance inference.

Given the addresses seen along a traceroute toward some destination, the border of the
destination AS is the first hop whose longest-matching prefix is originated by one of the ASNs
originating the destination prefix. Every hop before it is then some number of hops away from
that border.

Distances are kept per `(hop address, destination prefix)`; repeated observations keep the
minimum. When no border is found but probing stopped at the gap limit, the hop's distance to the
end of the trace is recorded instead, in a separate slot.
*/
mod mapping;
mod trace;

pub use mapping::PrefixAsnMapping;
pub use trace::{StopReason, TraceRecord};

use crate::error::ReplayError;
use crate::models::Asn;
use crate::state::Peer;
use ipnet::IpNet;
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::io::BufRead;
use std::net::IpAddr;
use std::ops::RangeInclusive;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorderConfig {
    /// Prefix lengths kept in the prefix to AS mapping.
    pub prefix_lengths: RangeInclusive<u8>,
    /// Hops outside this range end the walk along a trace. `None` accepts every address.
    pub routable: Option<IpNet>,
}

impl Default for BorderConfig {
    fn default() -> Self {
        BorderConfig {
            prefix_lengths: 16..=64,
            routable: "2000::/3".parse().ok(),
        }
    }
}

impl BorderConfig {
    pub fn keeps_prefix(&self, prefix: &IpNet) -> bool {
        self.prefix_lengths.contains(&prefix.prefix_len())
    }

    pub fn is_routable(&self, addr: &IpAddr) -> bool {
        self.routable.is_none_or(|range| range.contains(addr))
    }
}

/// Index of the first hop that belongs to one of `destination_asns`.
pub fn border_index(
    hops: &[Option<IpAddr>],
    destination_asns: &BTreeSet<Asn>,
    mapping: &PrefixAsnMapping,
) -> Option<usize> {
    hops.iter().position(|hop| {
        let Some(addr) = hop else {
            return false;
        };
        match mapping.origins_of(addr) {
            Ok((_, origins)) => !origins.is_disjoint(destination_asns),
            Err(_) => false,
        }
    })
}

/// Best known distances of one hop address to the border of one destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Distance {
    /// Hops before the inferred border; `-1` is the border hop itself.
    pub to_border: Option<i32>,
    /// Hops to the end of a trace that stopped at the gap limit without reaching the border.
    pub in_path: Option<i32>,
}

impl Distance {
    /// `to_border` when known, else `in_path`.
    pub fn best(&self) -> Option<i32> {
        self.to_border.or(self.in_path)
    }
}

fn keep_min(slot: &mut Option<i32>, value: i32) {
    *slot = Some(slot.map_or(value, |known| known.min(value)));
}

/// Counters of one [HopDistances::process_reader] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraceSummary {
    pub traces: u64,
    pub used: u64,
    pub skipped: u64,
    pub malformed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HopDistances {
    entries: BTreeMap<IpAddr, BTreeMap<IpNet, Distance>>,
}

impl HopDistances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records distances for the hops of one trace toward `destination`.
    ///
    /// With a border at index `b`, hop `i` is `b - i - 1` hops away from it. Without a border,
    /// gap-limited traces record `hops.len() - i`; other traces record nothing.
    pub fn record(
        &mut self,
        hops: &[Option<IpAddr>],
        border: Option<usize>,
        gap_limit: bool,
        destination: IpNet,
        config: &BorderConfig,
    ) {
        if border.is_none() && !gap_limit {
            return;
        }
        for (i, hop) in hops.iter().enumerate() {
            let Some(addr) = hop else {
                continue;
            };
            if !config.is_routable(addr) {
                debug!("stopping at unroutable hop {}", addr);
                return;
            }
            let distance = self
                .entries
                .entry(*addr)
                .or_default()
                .entry(destination)
                .or_default();
            match border {
                Some(border) => keep_min(&mut distance.to_border, border as i32 - i as i32 - 1),
                None => keep_min(&mut distance.in_path, hops.len() as i32 - i as i32),
            }
        }
    }

    /// Locates the border for one trace and records the distances. Returns whether the trace was
    /// used: looping traces and traces toward unmapped destinations are not.
    pub fn process_trace(
        &mut self,
        trace: &TraceRecord,
        mapping: &PrefixAsnMapping,
        config: &BorderConfig,
    ) -> bool {
        if trace.stop_reason == StopReason::Loop {
            return false;
        }
        let Ok((destination, destination_asns)) = mapping.origins_of(&trace.destination) else {
            return false;
        };
        let border = border_index(&trace.hops, destination_asns, mapping);
        self.record(
            &trace.hops,
            border,
            trace.stop_reason == StopReason::GapLimit,
            destination,
            config,
        );
        true
    }

    /// Processes every trace line of `reader`. Malformed trace lines are logged and skipped.
    pub fn process_reader<R: BufRead>(
        &mut self,
        reader: R,
        mapping: &PrefixAsnMapping,
        config: &BorderConfig,
    ) -> Result<TraceSummary, ReplayError> {
        let mut summary = TraceSummary::default();
        for line in reader.lines() {
            let line = line?;
            let trace = match TraceRecord::parse_line(&line) {
                Ok(Some(trace)) => trace,
                Ok(None) => continue,
                Err(e) => {
                    warn!("{}", e);
                    summary.malformed += 1;
                    continue;
                }
            };
            summary.traces += 1;
            match self.process_trace(&trace, mapping, config) {
                true => summary.used += 1,
                false => summary.skipped += 1,
            }
        }
        Ok(summary)
    }

    pub fn get(&self, addr: &IpAddr, destination: &IpNet) -> Option<&Distance> {
        self.entries.get(addr)?.get(destination)
    }

    /// Best distance of `addr` toward `destination`.
    pub fn distance(&self, addr: &IpAddr, destination: &IpNet) -> Option<i32> {
        self.get(addr, destination)?.best()
    }

    /// All entries, ordered by address then destination.
    pub fn iter(&self) -> impl Iterator<Item = (IpAddr, IpNet, &Distance)> {
        self.entries.iter().flat_map(|(addr, destinations)| {
            destinations
                .iter()
                .map(move |(destination, distance)| (*addr, *destination, distance))
        })
    }
}

/// Copies the distances measured for any of the peer's addresses into its per-AS hop counts,
/// attributing each destination prefix to the ASNs that originate it. Returns the number of
/// distances recorded.
pub fn annotate_peer(
    peer: &mut Peer,
    distances: &HopDistances,
    mapping: &PrefixAsnMapping,
) -> usize {
    let mut updates = vec![];
    for alias in peer.aliases() {
        let Some(destinations) = distances.entries.get(alias) else {
            continue;
        };
        for (destination, distance) in destinations {
            let Some(hops) = distance.best() else {
                continue;
            };
            let Some(origins) = mapping.origins_of_prefix(destination) else {
                continue;
            };
            updates.extend(origins.iter().map(|asn| (*asn, hops)));
        }
    }
    let recorded = updates.len();
    for (asn, hops) in updates {
        peer.record_hops(asn, hops);
    }
    recorded
}
