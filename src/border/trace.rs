//! Trace records in the `sc_analysis_dump` text form.
//!
//! A trace is one line starting with `T`. Whitespace separated fields:
//!
//! | index | field                                   |
//! |-------|-----------------------------------------|
//! | 1     | source address                          |
//! | 2     | destination address                     |
//! | 10    | halt reason (`G` gap limit, `L` loop)   |
//! | 13..  | one field per hop, `ip,rtt,tries` or `q` |
use crate::error::ReplayError;
use std::net::IpAddr;
use std::str::FromStr;

const MIN_FIELDS: usize = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Probing gave up after too many unresponsive hops in a row.
    GapLimit,
    Loop,
    Other(char),
}

impl From<&str> for StopReason {
    fn from(value: &str) -> Self {
        match value {
            "G" => StopReason::GapLimit,
            "L" => StopReason::Loop,
            other => StopReason::Other(other.chars().next().unwrap_or('?')),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    pub source: IpAddr,
    pub destination: IpAddr,
    pub stop_reason: StopReason,
    /// Responding address per hop; `None` where no reply came back.
    pub hops: Vec<Option<IpAddr>>,
}

impl TraceRecord {
    /// Parses one output line. Comments and lines of other record types yield `Ok(None)`.
    pub fn parse_line(line: &str) -> Result<Option<TraceRecord>, ReplayError> {
        let line = line.trim();
        if line.starts_with('#') {
            return Ok(None);
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.first() != Some(&"T") {
            return Ok(None);
        }
        if fields.len() < MIN_FIELDS {
            return Err(ReplayError::TraceParsing(format!(
                "expected at least {} fields, got {}",
                MIN_FIELDS,
                fields.len()
            )));
        }
        let address = |idx: usize| {
            IpAddr::from_str(fields[idx])
                .map_err(|_| ReplayError::TraceParsing(format!("bad address {}", fields[idx])))
        };
        Ok(Some(TraceRecord {
            source: address(1)?,
            destination: address(2)?,
            stop_reason: StopReason::from(fields[10]),
            hops: fields[MIN_FIELDS..].iter().map(|f| hop_address(f)).collect(),
        }))
    }
}

impl FromStr for TraceRecord {
    type Err = ReplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TraceRecord::parse_line(s)?
            .ok_or_else(|| ReplayError::TraceParsing(format!("not a trace line: {}", s)))
    }
}

/// Address of the first reply recorded for a hop.
fn hop_address(field: &str) -> Option<IpAddr> {
    let (addr, _) = field.split_once(',')?;
    IpAddr::from_str(addr).ok()
}
