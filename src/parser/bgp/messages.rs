use crate::error::ParserError;
use crate::models::*;
use crate::parser::bgp::attributes::parse_attributes;
use crate::parser::utils::{parse_nlri_list, split_n, ReadUtils};
use bytes::{Buf, Bytes};
use log::debug;

/// BGP message
///
/// Format:
/// ```text
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// +                                                               +
/// |                                                               |
/// +                                                               +
/// |                           Marker                              |
/// +                                                               +
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |          Length               |      Type     |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Only UPDATE bodies are decoded. OPEN and KEEPALIVE bodies are skipped; NOTIFICATION keeps its
/// error code and subcode.
pub fn parse_bgp_message(
    data: &mut Bytes,
    add_path: bool,
    asn_len: AsnLength,
) -> Result<BgpMessage, ParserError> {
    let total_size = data.len();
    data.has_n_remaining(19)?;
    data.advance(16);
    let length = data.get_u16();
    if !(19..=4096).contains(&length) {
        return Err(ParserError::ParseError(format!(
            "invalid BGP message length {}",
            length
        )));
    }

    let bgp_msg_length = match length as usize > total_size {
        true => {
            return Err(ParserError::TruncatedMsg(format!(
                "BGP message declares {} bytes, only {} available",
                length, total_size
            )))
        }
        false => length as usize - 19,
    };

    let msg_type = BgpMessageType::try_from(data.get_u8())?;
    let mut msg_data = split_n(data, bgp_msg_length)?;

    Ok(match msg_type {
        BgpMessageType::UPDATE => {
            BgpMessage::Update(parse_bgp_update_message(msg_data, add_path, asn_len)?)
        }
        BgpMessageType::NOTIFICATION => {
            let error_code = msg_data.read_u8()?;
            let error_subcode = msg_data.read_u8()?;
            BgpMessage::Notification {
                error_code,
                error_subcode,
            }
        }
        BgpMessageType::OPEN => {
            debug!("skipping OPEN message body ({} bytes)", bgp_msg_length);
            BgpMessage::Open
        }
        BgpMessageType::KEEPALIVE => BgpMessage::KeepAlive,
    })
}

/// Parse a BGP UPDATE message body.
///
/// ```text
/// +-----------------------------------------------------+
/// |   Withdrawn Routes Length (2 octets)                |
/// +-----------------------------------------------------+
/// |   Withdrawn Routes (variable)                       |
/// +-----------------------------------------------------+
/// |   Total Path Attribute Length (2 octets)            |
/// +-----------------------------------------------------+
/// |   Path Attributes (variable)                        |
/// +-----------------------------------------------------+
/// |   Network Layer Reachability Information (variable) |
/// +-----------------------------------------------------+
/// ```
pub fn parse_bgp_update_message(
    mut input: Bytes,
    add_path: bool,
    asn_len: AsnLength,
) -> Result<BgpUpdateMessage, ParserError> {
    // the withdrawn routes and NLRI fields only ever hold IPv4 prefixes
    let afi = Afi::Ipv4;

    let withdrawn_length = input.read_u16()? as usize;
    let withdrawn_bytes = split_n(&mut input, withdrawn_length)?;
    let withdrawn_prefixes = parse_nlri_list(withdrawn_bytes, add_path, &afi)?;

    let attribute_length = input.read_u16()? as usize;
    let attr_data = split_n(&mut input, attribute_length)?;
    let attributes = parse_attributes(attr_data, asn_len, add_path, None, None, None)?;

    let announced_prefixes = parse_nlri_list(input, add_path, &afi)?;

    Ok(BgpUpdateMessage {
        withdrawn_prefixes,
        attributes,
        announced_prefixes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(length: u16, msg_type: u8) -> Vec<u8> {
        let mut bytes = vec![0xff; 16];
        bytes.extend_from_slice(&length.to_be_bytes());
        bytes.push(msg_type);
        bytes
    }

    #[test]
    fn test_parse_keepalive() {
        let mut data = Bytes::from(header(19, 4));
        assert_eq!(
            parse_bgp_message(&mut data, false, AsnLength::Bits32).unwrap(),
            BgpMessage::KeepAlive
        );
    }

    #[test]
    fn test_parse_update_with_withdrawal_and_nlri() {
        let mut body = vec![
            0, 2, 8, 10, // withdrawn: 10.0.0.0/8
            0, 0, // no attributes
            24, 192, 0, 2, // nlri: 192.0.2.0/24
        ];
        let mut bytes = header(19 + body.len() as u16, 2);
        bytes.append(&mut body);
        let mut data = Bytes::from(bytes);

        let BgpMessage::Update(update) =
            parse_bgp_message(&mut data, false, AsnLength::Bits32).unwrap()
        else {
            panic!("expected an UPDATE");
        };
        assert_eq!(update.withdrawn_prefixes[0].to_string(), "10.0.0.0/8");
        assert_eq!(update.announced_prefixes[0].to_string(), "192.0.2.0/24");
        assert!(update.attributes.is_empty());
    }

    #[test]
    fn test_parse_truncated() {
        let mut data = Bytes::from(header(40, 2));
        assert!(matches!(
            parse_bgp_message(&mut data, false, AsnLength::Bits32),
            Err(ParserError::TruncatedMsg(_))
        ));
    }
}
