//! TABLE_DUMP_V2 records ([RFC6396 section 4.3]).
//!
//! A dump starts with a [PeerIndexTable]; every following RIB entry refers to its peer by index
//! into that table.
//!
//! [RFC6396 section 4.3]: https://datatracker.ietf.org/doc/html/rfc6396#section-4.3
use crate::models::{Asn, Attributes, NetworkPrefix};
use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};

#[derive(Debug, PartialEq, Clone)]
pub enum TableDumpV2Message {
    PeerIndexTable(PeerIndexTable),
    RibAfi(RibAfiEntries),
}

#[derive(Debug, TryFromPrimitive, IntoPrimitive, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TableDumpV2Type {
    PeerIndexTable = 1,
    RibIpv4Unicast = 2,
    RibIpv4Multicast = 3,
    RibIpv6Unicast = 4,
    RibIpv6Multicast = 5,
    RibGeneric = 6,
    GeoPeerTable = 7,
    RibIpv4UnicastAddPath = 8,
    RibIpv4MulticastAddPath = 9,
    RibIpv6UnicastAddPath = 10,
    RibIpv6MulticastAddPath = 11,
    RibGenericAddPath = 12,
}

impl TableDumpV2Type {
    pub const fn is_add_path(&self) -> bool {
        matches!(
            self,
            TableDumpV2Type::RibIpv4UnicastAddPath
                | TableDumpV2Type::RibIpv4MulticastAddPath
                | TableDumpV2Type::RibIpv6UnicastAddPath
                | TableDumpV2Type::RibIpv6MulticastAddPath
                | TableDumpV2Type::RibGenericAddPath
        )
    }
}

bitflags! {
    /// Peer type octet of a peer index table entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PeerType: u8 {
        const ADDRESS_FAMILY_IPV6 = 0b1;
        const AS_SIZE_32BIT = 0b10;
    }
}

/// Per-file mapping from peer index to peer identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIndexTable {
    pub collector_bgp_id: Ipv4Addr,
    pub view_name: String,
    pub id_peer_map: HashMap<u16, IndexedPeer>,
}

impl PeerIndexTable {
    pub fn get_peer_by_id(&self, peer_index: &u16) -> Option<&IndexedPeer> {
        self.id_peer_map.get(peer_index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedPeer {
    pub peer_type: PeerType,
    pub peer_bgp_id: Ipv4Addr,
    pub peer_ip: IpAddr,
    pub peer_asn: Asn,
}

/// All entries of one prefix in an AFI/SAFI specific RIB record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RibAfiEntries {
    pub rib_type: TableDumpV2Type,
    pub sequence_number: u32,
    pub prefix: NetworkPrefix,
    pub rib_entries: Vec<RibEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RibEntry {
    pub peer_index: u16,
    pub originated_time: u32,
    pub path_id: Option<u32>,
    pub attributes: Attributes,
}
