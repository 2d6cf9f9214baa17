//! BGP path attributes consumed by the route extractor.
use crate::models::{Afi, AsPath, Asn, NetworkPrefix, Safi};
use bitflags::bitflags;
use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};
use std::fmt::{Display, Formatter};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

bitflags! {
    /// The high-order bits of the attribute flags octet.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AttrFlags: u8 {
        const OPTIONAL   = 0b10000000;
        const TRANSITIVE = 0b01000000;
        const PARTIAL    = 0b00100000;
        const EXTENDED   = 0b00010000;
    }
}

/// Attribute type codes this crate interprets. Anything else is kept as raw bytes.
#[allow(non_camel_case_types)]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum AttrType {
    ORIGIN = 1,
    AS_PATH = 2,
    NEXT_HOP = 3,
    MULTI_EXIT_DISCRIMINATOR = 4,
    LOCAL_PREFERENCE = 5,
    ATOMIC_AGGREGATE = 6,
    AGGREGATOR = 7,
    COMMUNITIES = 8,
    MP_REACHABLE_NLRI = 14,
    MP_UNREACHABLE_NLRI = 15,
    AS4_PATH = 17,
    AS4_AGGREGATOR = 18,
    #[num_enum(catch_all)]
    Unknown(u8),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u8)]
pub enum Origin {
    IGP = 0,
    EGP = 1,
    INCOMPLETE = 2,
}

impl Display for Origin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Origin::IGP => "IGP",
            Origin::EGP => "EGP",
            Origin::INCOMPLETE => "INCOMPLETE",
        };
        write!(f, "{}", s)
    }
}

/// A regular (RFC 1997) community, displayed as `asn:value`.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct Community(pub u32);

impl Display for Community {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.0 >> 16, self.0 & 0xffff)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Community {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Next hop carried in MP_REACH_NLRI.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum NextHopAddress {
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    /// Global address followed by link-local address.
    Ipv6LinkLocal(Ipv6Addr, Ipv6Addr),
}

impl NextHopAddress {
    /// All addresses in the order they appear on the wire.
    pub fn addrs(&self) -> Vec<IpAddr> {
        match self {
            NextHopAddress::Ipv4(v) => vec![IpAddr::V4(*v)],
            NextHopAddress::Ipv6(v) => vec![IpAddr::V6(*v)],
            NextHopAddress::Ipv6LinkLocal(global, local) => {
                vec![IpAddr::V6(*global), IpAddr::V6(*local)]
            }
        }
    }
}

/// Content of an MP_REACH_NLRI or MP_UNREACH_NLRI attribute.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Nlri {
    pub afi: Afi,
    pub safi: Safi,
    pub next_hop: Option<NextHopAddress>,
    pub prefixes: Vec<NetworkPrefix>,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum AttributeValue {
    Origin(Origin),
    AsPath { path: AsPath, is_as4: bool },
    NextHop(IpAddr),
    MultiExitDiscriminator(u32),
    LocalPreference(u32),
    AtomicAggregate,
    Aggregator { asn: Asn, id: Ipv4Addr, is_as4: bool },
    Communities(Vec<Community>),
    MpReachNlri(Nlri),
    MpUnreachNlri(Nlri),
    Unknown { attr_type: u8, bytes: Vec<u8> },
}

impl AttributeValue {
    pub fn attr_type(&self) -> AttrType {
        match self {
            AttributeValue::Origin(_) => AttrType::ORIGIN,
            AttributeValue::AsPath { is_as4: false, .. } => AttrType::AS_PATH,
            AttributeValue::AsPath { is_as4: true, .. } => AttrType::AS4_PATH,
            AttributeValue::NextHop(_) => AttrType::NEXT_HOP,
            AttributeValue::MultiExitDiscriminator(_) => AttrType::MULTI_EXIT_DISCRIMINATOR,
            AttributeValue::LocalPreference(_) => AttrType::LOCAL_PREFERENCE,
            AttributeValue::AtomicAggregate => AttrType::ATOMIC_AGGREGATE,
            AttributeValue::Aggregator { is_as4: false, .. } => AttrType::AGGREGATOR,
            AttributeValue::Aggregator { is_as4: true, .. } => AttrType::AS4_AGGREGATOR,
            AttributeValue::Communities(_) => AttrType::COMMUNITIES,
            AttributeValue::MpReachNlri(_) => AttrType::MP_REACHABLE_NLRI,
            AttributeValue::MpUnreachNlri(_) => AttrType::MP_UNREACHABLE_NLRI,
            AttributeValue::Unknown { attr_type, .. } => AttrType::from(*attr_type),
        }
    }
}

/// Attributes in the order they were found on the wire.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Attributes {
    pub inner: Vec<AttributeValue>,
}

impl Attributes {
    pub fn iter(&self) -> std::slice::Iter<'_, AttributeValue> {
        self.inner.iter()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl From<Vec<AttributeValue>> for Attributes {
    fn from(inner: Vec<AttributeValue>) -> Self {
        Attributes { inner }
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = &'a AttributeValue;
    type IntoIter = std::slice::Iter<'a, AttributeValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_type_catch_all() {
        assert_eq!(AttrType::from(17u8), AttrType::AS4_PATH);
        assert_eq!(AttrType::from(32u8), AttrType::Unknown(32));
    }

    #[test]
    fn test_community_display() {
        assert_eq!(Community((3356 << 16) | 100).to_string(), "3356:100");
    }

    #[test]
    fn test_next_hop_addrs() {
        let global: Ipv6Addr = "2001:db8::1".parse().unwrap();
        let local: Ipv6Addr = "fe80::1".parse().unwrap();
        assert_eq!(
            NextHopAddress::Ipv6LinkLocal(global, local).addrs(),
            vec![IpAddr::V6(global), IpAddr::V6(local)]
        );
    }
}
