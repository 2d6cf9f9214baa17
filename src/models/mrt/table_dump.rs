use crate::models::{Asn, Attributes, NetworkPrefix};
use std::net::IpAddr;

/// Legacy TABLE_DUMP (v1) RIB entry ([RFC6396 section 4.2]).
///
/// Each record carries one prefix as seen from one peer, with the peer identity inline.
///
/// [RFC6396 section 4.2]: https://datatracker.ietf.org/doc/html/rfc6396#section-4.2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDumpMessage {
    pub view_number: u16,
    pub sequence_number: u16,
    pub prefix: NetworkPrefix,
    pub status: u8,
    pub originated_time: u32,
    pub peer_ip: IpAddr,
    pub peer_asn: Asn,
    pub attributes: Attributes,
}
