//! Builders for small MRT dumps, written byte by byte.
#![allow(dead_code)]

use bytes::{BufMut, BytesMut};
use ipnet::IpNet;
use std::net::{IpAddr, Ipv6Addr};

pub const TABLE_DUMP_V2: u16 = 13;
pub const BGP4MP: u16 = 16;

pub const PEER_INDEX_TABLE: u16 = 1;
pub const RIB_IPV6_UNICAST: u16 = 4;

pub const BGP4MP_STATE_CHANGE_AS4: u16 = 5;
pub const BGP4MP_MESSAGE: u16 = 1;
pub const BGP4MP_MESSAGE_AS4: u16 = 4;

pub fn v6(s: &str) -> Ipv6Addr {
    s.parse().unwrap()
}

pub fn net(s: &str) -> IpNet {
    s.parse().unwrap()
}

pub fn record(timestamp: u32, entry_type: u16, subtype: u16, body: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    buf.put_u32(timestamp);
    buf.put_u16(entry_type);
    buf.put_u16(subtype);
    buf.put_u32(body.len() as u32);
    buf.put_slice(body);
    buf.to_vec()
}

fn put_prefix(buf: &mut BytesMut, prefix: &IpNet) {
    let len = prefix.prefix_len();
    buf.put_u8(len);
    let bytes = match prefix.addr() {
        IpAddr::V4(addr) => addr.octets().to_vec(),
        IpAddr::V6(addr) => addr.octets().to_vec(),
    };
    buf.put_slice(&bytes[..(len as usize).div_ceil(8)]);
}

fn put_attr(buf: &mut BytesMut, flags: u8, attr_type: u8, value: &[u8]) {
    if value.len() > 255 {
        buf.put_u8(flags | 0x10);
        buf.put_u8(attr_type);
        buf.put_u16(value.len() as u16);
    } else {
        buf.put_u8(flags);
        buf.put_u8(attr_type);
        buf.put_u8(value.len() as u8);
    }
    buf.put_slice(value);
}

pub fn origin_attr(buf: &mut BytesMut) {
    put_attr(buf, 0x40, 1, &[0]);
}

/// AS_PATH (or AS4_PATH when `as4_attr`) made of one AS_SEQUENCE.
pub fn as_path_attr(buf: &mut BytesMut, asns: &[u32], four_byte: bool, as4_attr: bool) {
    let mut value = BytesMut::new();
    value.put_u8(2);
    value.put_u8(asns.len() as u8);
    for asn in asns {
        match four_byte {
            true => value.put_u32(*asn),
            false => value.put_u16(*asn as u16),
        }
    }
    match as4_attr {
        true => put_attr(buf, 0xc0, 17, &value),
        false => put_attr(buf, 0x40, 2, &value),
    }
}

pub fn next_hop_attr(buf: &mut BytesMut, next_hop: [u8; 4]) {
    put_attr(buf, 0x40, 3, &next_hop);
}

pub fn mp_reach_attr(buf: &mut BytesMut, next_hop: Ipv6Addr, prefixes: &[IpNet]) {
    let mut value = BytesMut::new();
    value.put_u16(2);
    value.put_u8(1);
    value.put_u8(16);
    value.put_slice(&next_hop.octets());
    value.put_u8(0);
    for prefix in prefixes {
        put_prefix(&mut value, prefix);
    }
    put_attr(buf, 0x80, 14, &value);
}

pub fn mp_unreach_attr(buf: &mut BytesMut, prefixes: &[IpNet]) {
    let mut value = BytesMut::new();
    value.put_u16(2);
    value.put_u8(1);
    for prefix in prefixes {
        put_prefix(&mut value, prefix);
    }
    put_attr(buf, 0x80, 15, &value);
}

/// TABLE_DUMP_V2 peer index table of IPv6 peers with 4-byte ASNs.
pub fn peer_index_table(peers: &[(Ipv6Addr, u32)]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    buf.put_u32(0x0a00_0001);
    buf.put_u16(0);
    buf.put_u16(peers.len() as u16);
    for (ip, asn) in peers {
        buf.put_u8(0b11);
        buf.put_u32(0x0a00_0002);
        buf.put_slice(&ip.octets());
        buf.put_u32(*asn);
    }
    buf.to_vec()
}

/// RIB_IPV6_UNICAST with one entry per `(peer index, path)`, next hops in the abbreviated
/// MP_REACH_NLRI form.
pub fn rib_ipv6(sequence: u32, prefix: &IpNet, entries: &[(u16, &[u32])]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    buf.put_u32(sequence);
    put_prefix(&mut buf, prefix);
    buf.put_u16(entries.len() as u16);
    for (peer_index, path) in entries {
        let mut attrs = BytesMut::new();
        origin_attr(&mut attrs);
        as_path_attr(&mut attrs, path, true, false);
        let mut mp = BytesMut::new();
        mp.put_u8(16);
        mp.put_slice(&v6("2001:db8::fe").octets());
        put_attr(&mut attrs, 0x80, 14, &mp);

        buf.put_u16(*peer_index);
        buf.put_u32(0);
        buf.put_u16(attrs.len() as u16);
        buf.put_slice(&attrs);
    }
    buf.to_vec()
}

fn bgp_update(withdrawn: &[IpNet], attrs: &[u8], announced: &[IpNet]) -> Vec<u8> {
    let mut body = BytesMut::new();
    let mut withdrawn_bytes = BytesMut::new();
    for prefix in withdrawn {
        put_prefix(&mut withdrawn_bytes, prefix);
    }
    body.put_u16(withdrawn_bytes.len() as u16);
    body.put_slice(&withdrawn_bytes);
    body.put_u16(attrs.len() as u16);
    body.put_slice(attrs);
    for prefix in announced {
        put_prefix(&mut body, prefix);
    }

    let mut msg = BytesMut::new();
    msg.put_slice(&[0xff; 16]);
    msg.put_u16(19 + body.len() as u16);
    msg.put_u8(2);
    msg.put_slice(&body);
    msg.to_vec()
}

fn bgp4mp_wrapper(peer: Ipv6Addr, peer_asn: u32, four_byte: bool, payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    match four_byte {
        true => {
            buf.put_u32(peer_asn);
            buf.put_u32(65001);
        }
        false => {
            buf.put_u16(peer_asn as u16);
            buf.put_u16(65001);
        }
    }
    buf.put_u16(0);
    buf.put_u16(2);
    buf.put_slice(&peer.octets());
    buf.put_slice(&v6("2001:db8::ffff").octets());
    buf.put_slice(payload);
    buf.to_vec()
}

/// BGP4MP_MESSAGE_AS4 announcing IPv6 prefixes through MP_REACH_NLRI.
pub fn announce_v6(peer: Ipv6Addr, peer_asn: u32, path: &[u32], prefixes: &[IpNet]) -> Vec<u8> {
    let mut attrs = BytesMut::new();
    origin_attr(&mut attrs);
    as_path_attr(&mut attrs, path, true, false);
    mp_reach_attr(&mut attrs, peer, prefixes);
    bgp4mp_wrapper(peer, peer_asn, true, &bgp_update(&[], &attrs, &[]))
}

/// BGP4MP_MESSAGE_AS4 withdrawing IPv6 prefixes through MP_UNREACH_NLRI.
pub fn withdraw_v6(peer: Ipv6Addr, peer_asn: u32, prefixes: &[IpNet]) -> Vec<u8> {
    let mut attrs = BytesMut::new();
    mp_unreach_attr(&mut attrs, prefixes);
    bgp4mp_wrapper(peer, peer_asn, true, &bgp_update(&[], &attrs, &[]))
}

/// BGP4MP_MESSAGE from a 2-byte speaker: IPv4 NLRI, AS_PATH with 2-byte ASNs plus AS4_PATH.
pub fn announce_v4_as4_path(
    peer: Ipv6Addr,
    path: &[u32],
    as4_path: &[u32],
    prefixes: &[IpNet],
) -> Vec<u8> {
    let mut attrs = BytesMut::new();
    origin_attr(&mut attrs);
    as_path_attr(&mut attrs, path, false, false);
    next_hop_attr(&mut attrs, [192, 0, 2, 1]);
    as_path_attr(&mut attrs, as4_path, true, true);
    bgp4mp_wrapper(peer, path[0], false, &bgp_update(&[], &attrs, prefixes))
}

/// BGP4MP_STATE_CHANGE_AS4.
pub fn state_change(peer: Ipv6Addr, peer_asn: u32, old_state: u16, new_state: u16) -> Vec<u8> {
    let mut payload = BytesMut::new();
    payload.put_u16(old_state);
    payload.put_u16(new_state);
    bgp4mp_wrapper(peer, peer_asn, true, &payload)
}
