use crate::error::ParserError;
use crate::models::*;
use crate::parser::bgp::parse_attributes;
use crate::parser::utils::{split_n, ReadUtils};
use bytes::Bytes;
use ipnet::IpNet;

/// Parse a legacy TABLE_DUMP message ([RFC6396 section 4.2]).
///
/// ```text
///         0                   1                   2                   3
///         0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |         View Number           |       Sequence Number         |
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |                        Prefix (variable)                      |
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        | Prefix Length |    Status     |
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |                         Originated Time                       |
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |                    Peer IP Address (variable)                 |
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |           Peer AS             |       Attribute Length        |
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |                   BGP Attribute... (variable)
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// [RFC6396 section 4.2]: https://datatracker.ietf.org/doc/html/rfc6396#section-4.2
pub fn parse_table_dump_message(
    sub_type: u16,
    mut data: Bytes,
) -> Result<TableDumpMessage, ParserError> {
    // subtype 1 is IPv4, subtype 2 is IPv6
    let afi = match sub_type {
        1 => Afi::Ipv4,
        2 => Afi::Ipv6,
        _ => {
            return Err(ParserError::ParseError(format!(
                "invalid TABLE_DUMP subtype {}",
                sub_type
            )))
        }
    };

    let view_number = data.read_u16()?;
    let sequence_number = data.read_u16()?;
    let address = data.read_address(&afi)?;
    let prefix_len = data.read_u8()?;
    let prefix = NetworkPrefix::new(IpNet::new(address, prefix_len)?.trunc(), None);
    let status = data.read_u8()?;
    let originated_time = data.read_u32()?;
    let peer_ip = data.read_address(&afi)?;
    let peer_asn = data.read_asn(AsnLength::Bits16)?;

    let attribute_length = data.read_u16()? as usize;
    let attr_data = split_n(&mut data, attribute_length)?;
    let attributes = parse_attributes(attr_data, AsnLength::Bits16, false, None, None, None)?;

    Ok(TableDumpMessage {
        view_number,
        sequence_number,
        prefix,
        status,
        originated_time,
        peer_ip,
        peer_asn,
        attributes,
    })
}
