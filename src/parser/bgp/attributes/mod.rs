mod attr_02_17_as_path;
mod attr_14_15_nlri;

use crate::error::ParserError;
use crate::models::*;
use crate::parser::utils::ReadUtils;
use bytes::{Buf, Bytes};
use log::{debug, warn};
use std::net::IpAddr;

use attr_02_17_as_path::parse_as_path;
use attr_14_15_nlri::parse_nlri;

/// Parse a block of path attributes.
///
/// `afi`, `safi` and `prefixes` are only given for TABLE_DUMP_V2 RIB entries, where
/// MP_REACH_NLRI may come in the abbreviated form of [RFC6396 section 4.3.4] that leaves out the
/// address family and the prefixes.
///
/// A single malformed attribute is logged and dropped; the rest of the block is still used.
///
/// [RFC6396 section 4.3.4]: https://datatracker.ietf.org/doc/html/rfc6396#section-4.3.4
pub fn parse_attributes(
    mut data: Bytes,
    asn_len: AsnLength,
    add_path: bool,
    afi: Option<Afi>,
    safi: Option<Safi>,
    prefixes: Option<&[NetworkPrefix]>,
) -> Result<Attributes, ParserError> {
    let mut attributes: Vec<AttributeValue> = Vec::with_capacity(8);

    // each attribute is at least 3 bytes: flag(1) + type(1) + length(1)
    while data.remaining() >= 3 {
        let flag = AttrFlags::from_bits_retain(data.get_u8());
        let attr_type = data.get_u8();
        let attr_length = match flag.contains(AttrFlags::EXTENDED) {
            false => data.read_u8()? as usize,
            true => data.read_u16()? as usize,
        };

        if data.remaining() < attr_length {
            warn!(
                "attribute {:?} declares {} bytes, only {} left; dropping the rest of the block",
                AttrType::from(attr_type),
                attr_length,
                data.remaining()
            );
            break;
        }
        let attr_data = data.split_to(attr_length);

        let parsed = match AttrType::from(attr_type) {
            AttrType::ORIGIN => parse_origin(attr_data),
            AttrType::AS_PATH => parse_as_path(attr_data, asn_len).map(|path| {
                AttributeValue::AsPath {
                    path,
                    is_as4: false,
                }
            }),
            AttrType::AS4_PATH => parse_as_path(attr_data, AsnLength::Bits32)
                .map(|path| AttributeValue::AsPath { path, is_as4: true }),
            AttrType::NEXT_HOP => parse_next_hop(attr_data),
            AttrType::MULTI_EXIT_DISCRIMINATOR => {
                parse_u32(attr_data).map(AttributeValue::MultiExitDiscriminator)
            }
            AttrType::LOCAL_PREFERENCE => parse_u32(attr_data).map(AttributeValue::LocalPreference),
            AttrType::ATOMIC_AGGREGATE => Ok(AttributeValue::AtomicAggregate),
            AttrType::AGGREGATOR => parse_aggregator(attr_data, false),
            AttrType::AS4_AGGREGATOR => parse_aggregator(attr_data, true),
            AttrType::COMMUNITIES => parse_communities(attr_data),
            AttrType::MP_REACHABLE_NLRI => {
                parse_nlri(attr_data, afi, safi, prefixes, true, add_path)
            }
            AttrType::MP_UNREACHABLE_NLRI => {
                parse_nlri(attr_data, afi, safi, prefixes, false, add_path)
            }
            AttrType::Unknown(_) => {
                debug!("keeping unknown attribute type {} as raw bytes", attr_type);
                Ok(AttributeValue::Unknown {
                    attr_type,
                    bytes: attr_data.to_vec(),
                })
            }
        };

        match parsed {
            Ok(value) => attributes.push(value),
            Err(e) => warn!(
                "dropping {} attribute {}: {}",
                match flag.contains(AttrFlags::PARTIAL) {
                    true => "partial",
                    false => "malformed",
                },
                attr_type,
                e
            ),
        }
    }

    Ok(Attributes::from(attributes))
}

fn parse_origin(mut input: Bytes) -> Result<AttributeValue, ParserError> {
    Ok(AttributeValue::Origin(Origin::try_from(input.read_u8()?)?))
}

fn parse_u32(mut input: Bytes) -> Result<u32, ParserError> {
    input.read_u32()
}

fn parse_next_hop(mut input: Bytes) -> Result<AttributeValue, ParserError> {
    let addr = match input.len() {
        4 => IpAddr::V4(input.read_ipv4_address()?),
        16 => IpAddr::V6(input.read_ipv6_address()?),
        n => {
            return Err(ParserError::ParseError(format!(
                "invalid NEXT_HOP length {}",
                n
            )))
        }
    };
    Ok(AttributeValue::NextHop(addr))
}

/// AGGREGATOR is an ASN followed by a 4-byte BGP identifier. The ASN width follows from the
/// attribute length rather than from the message, which some speakers get wrong.
fn parse_aggregator(mut input: Bytes, is_as4: bool) -> Result<AttributeValue, ParserError> {
    let asn_len = match input.len() {
        6 => AsnLength::Bits16,
        8 => AsnLength::Bits32,
        n => {
            return Err(ParserError::ParseError(format!(
                "invalid AGGREGATOR length {}",
                n
            )))
        }
    };
    let asn = input.read_asn(asn_len)?;
    let id = input.read_ipv4_address()?;
    Ok(AttributeValue::Aggregator { asn, id, is_as4 })
}

fn parse_communities(mut input: Bytes) -> Result<AttributeValue, ParserError> {
    if input.len() % 4 != 0 {
        return Err(ParserError::ParseError(format!(
            "COMMUNITIES length {} is not a multiple of 4",
            input.len()
        )));
    }
    let mut communities = Vec::with_capacity(input.len() / 4);
    while input.remaining() > 0 {
        communities.push(Community(input.read_u32()?));
    }
    Ok(AttributeValue::Communities(communities))
}
