//! Canonical route records and the row shapes exchanged with the historical store.
use crate::error::{BgpModelsError, ReplayError};
use crate::models::{AsPath, Asn, BgpState, Community, NetworkPrefix, Origin};
use chrono::{DateTime, Datelike, Utc};
use ipnet::IpNet;
use itertools::Itertools;
use std::fmt::{Display, Formatter};
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum RouteFlag {
    Announce,
    Withdraw,
    StateChange,
}

impl Display for RouteFlag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RouteFlag::Announce => "A",
            RouteFlag::Withdraw => "W",
            RouteFlag::StateChange => "STATE",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for RouteFlag {
    type Err = BgpModelsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(RouteFlag::Announce),
            "W" => Ok(RouteFlag::Withdraw),
            "STATE" => Ok(RouteFlag::StateChange),
            _ => Err(BgpModelsError::FlagParsingError(s.to_string())),
        }
    }
}

/// Old and new session state carried by a state change record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SessionChange {
    pub old_state: BgpState,
    pub new_state: BgpState,
}

/// One observed routing event.
///
/// Withdrawals carry an empty `as_path` and no `next_hop`. State changes carry no prefix and no
/// path; only the peer identity and `session` matter.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RouteRecord {
    pub flag: RouteFlag,
    /// Seconds since the epoch, from the MRT header.
    pub timestamp: u32,
    pub peer_ip: IpAddr,
    pub peer_asn: Asn,
    pub prefix: Option<NetworkPrefix>,
    pub as_path: AsPath,
    pub next_hop: Option<IpAddr>,
    pub origin: Option<Origin>,
    pub local_pref: Option<u32>,
    pub med: Option<u32>,
    pub communities: Option<Vec<Community>>,
    pub atomic: bool,
    pub aggregator: Option<(Asn, Ipv4Addr)>,
    /// Disambiguates update records sharing `(prefix, timestamp)` within one file.
    pub sequence: Option<u32>,
    /// Timestamp of the table dump this record came from. Update records have none.
    pub snapshot_time: Option<u32>,
    pub session: Option<SessionChange>,
}

impl RouteRecord {
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp as i64 * 1000
    }
}

fn option_to_string<T: Display>(value: &Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => String::new(),
    }
}

/// Pipe-separated form: `flag|timestamp|peer_ip|peer_asn|prefix|as_path|next_hop|origin|
/// local_pref|med|communities|atomic|aggregator|sequence|snapshot_time`.
impl Display for RouteRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let flag = match &self.session {
            Some(s) => format!("{}({}->{})", self.flag, s.old_state, s.new_state),
            None => self.flag.to_string(),
        };
        let communities = match &self.communities {
            Some(v) => v.iter().join(" "),
            None => String::new(),
        };
        let aggregator = match &self.aggregator {
            Some((asn, id)) => format!("{} {}", asn, id),
            None => String::new(),
        };
        write!(
            f,
            "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
            flag,
            self.timestamp,
            self.peer_ip,
            self.peer_asn,
            option_to_string(&self.prefix),
            self.as_path,
            option_to_string(&self.next_hop),
            option_to_string(&self.origin),
            option_to_string(&self.local_pref),
            option_to_string(&self.med),
            communities,
            match self.atomic {
                true => "AG",
                false => "NAG",
            },
            aggregator,
            option_to_string(&self.sequence),
            option_to_string(&self.snapshot_time),
        )
    }
}

pub(crate) fn utc_from_secs(secs: u32) -> Result<DateTime<Utc>, ReplayError> {
    DateTime::from_timestamp(secs as i64, 0)
        .ok_or_else(|| ReplayError::InvalidTime(format!("timestamp {} out of range", secs)))
}

/// A table dump row: `(prefix, year, snapshot_time, peer, path, asn, observed_time)`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RibRow {
    pub prefix: IpNet,
    pub year: i32,
    pub snapshot_time: DateTime<Utc>,
    pub peer: IpAddr,
    pub path: AsPath,
    pub asn: Asn,
    pub observed_time: DateTime<Utc>,
}

impl RibRow {
    pub fn new(
        prefix: IpNet,
        snapshot_time: DateTime<Utc>,
        peer: IpAddr,
        path: AsPath,
        asn: Asn,
        observed_time: DateTime<Utc>,
    ) -> RibRow {
        RibRow {
            prefix,
            year: snapshot_time.year(),
            snapshot_time,
            peer,
            path,
            asn,
            observed_time,
        }
    }

    pub fn snapshot_time_ms(&self) -> i64 {
        self.snapshot_time.timestamp_millis()
    }
}

impl TryFrom<&RouteRecord> for RibRow {
    type Error = ReplayError;

    fn try_from(record: &RouteRecord) -> Result<Self, Self::Error> {
        let (Some(prefix), Some(snapshot)) = (record.prefix, record.snapshot_time) else {
            return Err(ReplayError::DataIntegrity(format!(
                "record is not a table dump route: {}",
                record
            )));
        };
        Ok(RibRow::new(
            prefix.prefix,
            utc_from_secs(snapshot)?,
            record.peer_ip,
            record.as_path.clone(),
            record.peer_asn,
            utc_from_secs(record.timestamp)?,
        ))
    }
}

/// An update stream row: `(prefix, year, month, event_time, sequence, asn, path, peer, flag)`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EventRow {
    pub prefix: IpNet,
    pub year: i32,
    pub month: u32,
    pub event_time: DateTime<Utc>,
    pub sequence: u32,
    pub asn: Asn,
    pub path: AsPath,
    pub peer: IpAddr,
    pub flag: RouteFlag,
}

impl EventRow {
    pub fn new(
        prefix: IpNet,
        event_time: DateTime<Utc>,
        sequence: u32,
        asn: Asn,
        path: AsPath,
        peer: IpAddr,
        flag: RouteFlag,
    ) -> EventRow {
        EventRow {
            prefix,
            year: event_time.year(),
            month: event_time.month(),
            event_time,
            sequence,
            asn,
            path,
            peer,
            flag,
        }
    }

    pub fn event_time_ms(&self) -> i64 {
        self.event_time.timestamp_millis()
    }
}

impl TryFrom<&RouteRecord> for EventRow {
    type Error = ReplayError;

    fn try_from(record: &RouteRecord) -> Result<Self, Self::Error> {
        let (Some(prefix), Some(sequence)) = (record.prefix, record.sequence) else {
            return Err(ReplayError::DataIntegrity(format!(
                "record is not a prefix update: {}",
                record
            )));
        };
        Ok(EventRow::new(
            prefix.prefix,
            utc_from_secs(record.timestamp)?,
            sequence,
            record.peer_asn,
            record.as_path.clone(),
            record.peer_ip,
            record.flag,
        ))
    }
}
