use crate::models::*;
use std::net::{IpAddr, Ipv4Addr};

/// Typed view over the attributes of one UPDATE or RIB entry.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct RouteAttributes {
    pub origin: Option<Origin>,
    pub next_hops: Vec<IpAddr>,
    pub as_path: Option<AsPath>,
    pub as4_path: Option<AsPath>,
    pub med: Option<u32>,
    pub local_pref: Option<u32>,
    pub atomic: bool,
    pub aggregator: Option<(Asn, Ipv4Addr)>,
    pub as4_aggregator: Option<(Asn, Ipv4Addr)>,
    pub communities: Option<Vec<Community>>,
    /// Prefixes from MP_REACH_NLRI.
    pub announced: Vec<NetworkPrefix>,
    /// Prefixes from MP_UNREACH_NLRI.
    pub withdrawn: Vec<NetworkPrefix>,
}

impl RouteAttributes {
    pub fn collect(attributes: &Attributes) -> RouteAttributes {
        let mut attrs = RouteAttributes::default();
        for attr in attributes {
            match attr {
                AttributeValue::Origin(v) => attrs.origin = Some(*v),
                AttributeValue::AsPath {
                    path,
                    is_as4: false,
                } => attrs.as_path = Some(path.clone()),
                AttributeValue::AsPath {
                    path,
                    is_as4: true,
                } => attrs.as4_path = Some(path.clone()),
                AttributeValue::NextHop(v) => attrs.next_hops.push(*v),
                AttributeValue::MultiExitDiscriminator(v) => attrs.med = Some(*v),
                AttributeValue::LocalPreference(v) => attrs.local_pref = Some(*v),
                AttributeValue::AtomicAggregate => attrs.atomic = true,
                AttributeValue::Aggregator { asn, id, is_as4 } => match is_as4 {
                    true => attrs.as4_aggregator = Some((*asn, *id)),
                    false => attrs.aggregator = Some((*asn, *id)),
                },
                AttributeValue::Communities(v) => {
                    attrs.communities.get_or_insert_with(Vec::new).extend(v)
                }
                AttributeValue::MpReachNlri(nlri) => {
                    // the MP next hop supersedes NEXT_HOP for multiprotocol routes
                    if let Some(next_hop) = &nlri.next_hop {
                        attrs.next_hops = next_hop.addrs();
                    }
                    attrs.announced.extend(nlri.prefixes.iter().copied());
                }
                AttributeValue::MpUnreachNlri(nlri) => {
                    attrs.withdrawn.extend(nlri.prefixes.iter().copied())
                }
                AttributeValue::Unknown { .. } => {}
            }
        }
        attrs
    }

    /// AS_PATH reconciled with AS4_PATH when both are present.
    pub fn path(&self) -> AsPath {
        match (&self.as_path, &self.as4_path) {
            (Some(as_path), Some(as4_path)) => as_path.merge_as4_path(as4_path),
            (Some(as_path), None) => as_path.clone(),
            (None, Some(as4_path)) => as4_path.clone(),
            (None, None) => AsPath::new(),
        }
    }

    pub fn aggregator(&self) -> Option<(Asn, Ipv4Addr)> {
        self.as4_aggregator.or(self.aggregator)
    }
}
