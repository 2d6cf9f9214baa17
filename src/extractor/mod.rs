/*!
Turns decoded MRT records into canonical [RouteRecord]s.

A [RouteExtractor] holds the per-file session state: the peer index table of the current
TABLE_DUMP_V2 dump, the dump's snapshot time, and the [SequenceGenerator]. Call
[RouteExtractor::begin_file] before feeding records of a new file.

The same attribute handling serves both dump kinds. [DumpKind] only decides how the final
records are shaped: table dump routes carry the snapshot time, update routes carry a sequence
number.
*/
mod route_attributes;
mod sequence;

pub use sequence::SequenceGenerator;

use crate::archive::file_base_name;
use crate::error::ReplayError;
use crate::models::*;
use log::debug;
use route_attributes::RouteAttributes;
use std::net::IpAddr;

#[cfg(feature = "parser")]
use crate::parser::{MrtParser, RecordIterator};
#[cfg(feature = "parser")]
use std::collections::VecDeque;
#[cfg(feature = "parser")]
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum DumpKind {
    /// Full table snapshot; every record shares one snapshot time.
    Rib,
    /// Incremental update stream.
    Updates,
}

impl DumpKind {
    /// Picks the kind from an archive file name such as `rib.20180901.0000.bz2` or
    /// `updates.20180901.0015.bz2`.
    pub fn from_file_name(name: &str) -> Option<DumpKind> {
        let base = file_base_name(name);
        if base.starts_with("rib") || base.starts_with("bview") {
            Some(DumpKind::Rib)
        } else if base.starts_with("updates") {
            Some(DumpKind::Updates)
        } else {
            None
        }
    }
}

pub struct RouteExtractor {
    kind: DumpKind,
    peer_table: Option<PeerIndexTable>,
    snapshot_time: Option<u32>,
    sequence: SequenceGenerator,
}

impl RouteExtractor {
    pub fn new(kind: DumpKind) -> Self {
        RouteExtractor {
            kind,
            peer_table: None,
            snapshot_time: None,
            sequence: SequenceGenerator::new(),
        }
    }

    pub fn kind(&self) -> DumpKind {
        self.kind
    }

    /// Drops all state tied to the previous file.
    pub fn begin_file(&mut self) {
        self.peer_table = None;
        self.snapshot_time = None;
        self.sequence.reset();
    }

    pub fn peer_table(&self) -> Option<&PeerIndexTable> {
        self.peer_table.as_ref()
    }

    /// Timestamp of the first record of the current table dump.
    pub fn snapshot_time(&self) -> Option<u32> {
        self.snapshot_time
    }

    /// Extracts the routes of one record: one per withdrawn prefix, one per announced prefix and
    /// next hop, one per session state change.
    ///
    /// Fails with [ReplayError::DataIntegrity] when a RIB entry refers to a peer the file never
    /// defined. The rest of that file cannot be trusted either.
    pub fn extract(&mut self, record: MrtRecord) -> Result<Vec<RouteRecord>, ReplayError> {
        let timestamp = record.common_header.timestamp;
        if self.kind == DumpKind::Rib && self.snapshot_time.is_none() {
            self.snapshot_time = Some(timestamp);
        }

        let mut routes = match record.message {
            MrtMessage::TableDumpMessage(msg) => {
                let attrs = RouteAttributes::collect(&msg.attributes);
                announcements(timestamp, msg.peer_ip, msg.peer_asn, &[msg.prefix], &attrs)
            }
            MrtMessage::TableDumpV2Message(TableDumpV2Message::PeerIndexTable(table)) => {
                self.peer_table = Some(table);
                vec![]
            }
            MrtMessage::TableDumpV2Message(TableDumpV2Message::RibAfi(entries)) => {
                self.rib_entries(timestamp, &entries)?
            }
            MrtMessage::Bgp4Mp(Bgp4Mp::StateChange(msg)) => vec![state_change(timestamp, &msg)],
            MrtMessage::Bgp4Mp(Bgp4Mp::Message(msg)) => match &msg.bgp_message {
                BgpMessage::Update(update) => {
                    let attrs = RouteAttributes::collect(&update.attributes);
                    let withdrawn: Vec<NetworkPrefix> = update
                        .withdrawn_prefixes
                        .iter()
                        .chain(attrs.withdrawn.iter())
                        .copied()
                        .collect();
                    let announced: Vec<NetworkPrefix> = update
                        .announced_prefixes
                        .iter()
                        .chain(attrs.announced.iter())
                        .copied()
                        .collect();
                    let mut routes = withdrawals(timestamp, msg.peer_ip, msg.peer_asn, &withdrawn);
                    routes.extend(announcements(
                        timestamp,
                        msg.peer_ip,
                        msg.peer_asn,
                        &announced,
                        &attrs,
                    ));
                    routes
                }
                other => {
                    debug!(
                        "ignoring {:?} message from {}",
                        other.msg_type(),
                        msg.peer_ip
                    );
                    vec![]
                }
            },
        };

        for route in routes.iter_mut() {
            self.shape(route);
        }
        Ok(routes)
    }

    fn rib_entries(
        &self,
        timestamp: u32,
        entries: &RibAfiEntries,
    ) -> Result<Vec<RouteRecord>, ReplayError> {
        let table = self.peer_table.as_ref().ok_or_else(|| {
            ReplayError::DataIntegrity(format!(
                "RIB entries for {} before any peer index table",
                entries.prefix
            ))
        })?;

        let mut routes = vec![];
        for entry in &entries.rib_entries {
            let peer = table.get_peer_by_id(&entry.peer_index).ok_or_else(|| {
                ReplayError::DataIntegrity(format!(
                    "peer index {} is not in the peer index table",
                    entry.peer_index
                ))
            })?;
            let attrs = RouteAttributes::collect(&entry.attributes);
            let prefix = NetworkPrefix::new(entries.prefix.prefix, entry.path_id);
            routes.extend(announcements(
                timestamp,
                peer.peer_ip,
                peer.peer_asn,
                &[prefix],
                &attrs,
            ));
        }
        Ok(routes)
    }

    fn shape(&mut self, route: &mut RouteRecord) {
        match self.kind {
            DumpKind::Rib => {
                route.snapshot_time = self.snapshot_time;
                route.sequence = None;
            }
            DumpKind::Updates => {
                route.snapshot_time = None;
                route.sequence = route
                    .prefix
                    .map(|p| self.sequence.next(&p.prefix, route.timestamp));
            }
        }
    }
}

fn blank_route(flag: RouteFlag, timestamp: u32, peer_ip: IpAddr, peer_asn: Asn) -> RouteRecord {
    RouteRecord {
        flag,
        timestamp,
        peer_ip,
        peer_asn,
        prefix: None,
        as_path: AsPath::new(),
        next_hop: None,
        origin: None,
        local_pref: None,
        med: None,
        communities: None,
        atomic: false,
        aggregator: None,
        sequence: None,
        snapshot_time: None,
        session: None,
    }
}

fn withdrawals(
    timestamp: u32,
    peer_ip: IpAddr,
    peer_asn: Asn,
    prefixes: &[NetworkPrefix],
) -> Vec<RouteRecord> {
    prefixes
        .iter()
        .map(|prefix| RouteRecord {
            prefix: Some(*prefix),
            ..blank_route(RouteFlag::Withdraw, timestamp, peer_ip, peer_asn)
        })
        .collect()
}

/// One route per prefix and next hop. A route without any next hop yields nothing.
fn announcements(
    timestamp: u32,
    peer_ip: IpAddr,
    peer_asn: Asn,
    prefixes: &[NetworkPrefix],
    attrs: &RouteAttributes,
) -> Vec<RouteRecord> {
    let as_path = attrs.path();
    let mut routes = Vec::with_capacity(prefixes.len() * attrs.next_hops.len());
    for prefix in prefixes {
        for next_hop in &attrs.next_hops {
            routes.push(RouteRecord {
                prefix: Some(*prefix),
                as_path: as_path.clone(),
                next_hop: Some(*next_hop),
                origin: attrs.origin,
                local_pref: attrs.local_pref,
                med: attrs.med,
                communities: attrs.communities.clone(),
                atomic: attrs.atomic,
                aggregator: attrs.aggregator(),
                ..blank_route(RouteFlag::Announce, timestamp, peer_ip, peer_asn)
            });
        }
    }
    routes
}

fn state_change(timestamp: u32, msg: &Bgp4MpStateChange) -> RouteRecord {
    RouteRecord {
        session: Some(SessionChange {
            old_state: msg.old_state,
            new_state: msg.new_state,
        }),
        ..blank_route(RouteFlag::StateChange, timestamp, msg.peer_ip, msg.peer_asn)
    }
}

/// Lazily extracts routes from every record of one dump.
///
/// Undecodable records are skipped (see [RecordIterator]). A [ReplayError::DataIntegrity] is
/// yielded once and ends the iteration.
#[cfg(feature = "parser")]
pub struct RouteIterator<R> {
    records: RecordIterator<R>,
    extractor: RouteExtractor,
    cache: VecDeque<RouteRecord>,
    done: bool,
}

#[cfg(feature = "parser")]
impl<R> RouteIterator<R> {
    pub fn records(&self) -> &RecordIterator<R> {
        &self.records
    }

    pub fn extractor(&self) -> &RouteExtractor {
        &self.extractor
    }
}

#[cfg(feature = "parser")]
impl<R: Read> Iterator for RouteIterator<R> {
    type Item = Result<RouteRecord, ReplayError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(route) = self.cache.pop_front() {
                return Some(Ok(route));
            }
            if self.done {
                return None;
            }
            let Some(record) = self.records.next() else {
                self.done = true;
                return None;
            };
            match self.extractor.extract(record) {
                Ok(routes) => self.cache.extend(routes),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(feature = "parser")]
impl<R: Read> MrtParser<R> {
    /// Iterates the canonical routes of this dump, with a fresh extraction session.
    pub fn into_route_iter(self, kind: DumpKind) -> RouteIterator<R> {
        RouteIterator {
            records: self.into_record_iter(),
            extractor: RouteExtractor::new(kind),
            cache: VecDeque::new(),
            done: false,
        }
    }
}
