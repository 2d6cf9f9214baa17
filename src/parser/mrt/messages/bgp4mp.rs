use crate::error::ParserError;
use crate::models::*;
use crate::parser::bgp::parse_bgp_message;
use crate::parser::ReadUtils;
use bytes::Bytes;

/// Parse a BGP4MP or BGP4MP_ET message body.
///
/// The subtype decides the ASN width of the wrapper and of the AS_PATH inside, and whether NLRI
/// carry add-path identifiers.
pub fn parse_bgp4mp(sub_type: u16, input: Bytes) -> Result<Bgp4Mp, ParserError> {
    let msg_type = Bgp4MpType::try_from(sub_type)?;
    let msg = match msg_type {
        Bgp4MpType::StateChange => {
            Bgp4Mp::StateChange(parse_state_change(input, AsnLength::Bits16, msg_type)?)
        }
        Bgp4MpType::StateChangeAs4 => {
            Bgp4Mp::StateChange(parse_state_change(input, AsnLength::Bits32, msg_type)?)
        }
        Bgp4MpType::Message | Bgp4MpType::MessageLocal => {
            Bgp4Mp::Message(parse_message(input, false, AsnLength::Bits16, msg_type)?)
        }
        Bgp4MpType::MessageAs4 | Bgp4MpType::MessageAs4Local => {
            Bgp4Mp::Message(parse_message(input, false, AsnLength::Bits32, msg_type)?)
        }
        Bgp4MpType::MessageAddpath | Bgp4MpType::MessageLocalAddpath => {
            Bgp4Mp::Message(parse_message(input, true, AsnLength::Bits16, msg_type)?)
        }
        Bgp4MpType::MessageAs4Addpath | Bgp4MpType::MessageLocalAs4Addpath => {
            Bgp4Mp::Message(parse_message(input, true, AsnLength::Bits32, msg_type)?)
        }
    };
    Ok(msg)
}

/*
   0                   1                   2                   3
   0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
  |         Peer AS Number        |        Local AS Number        |
  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
  |        Interface Index        |        Address Family         |
  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
  |                      Peer IP Address (variable)               |
  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
  |                      Local IP Address (variable)              |
  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
  |                    BGP Message... (variable)
  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
*/
fn parse_message(
    mut data: Bytes,
    add_path: bool,
    asn_len: AsnLength,
    msg_type: Bgp4MpType,
) -> Result<Bgp4MpMessage, ParserError> {
    let peer_asn = data.read_asn(asn_len)?;
    let local_asn = data.read_asn(asn_len)?;
    let interface_index = data.read_u16()?;
    let afi = data.read_afi()?;
    let peer_ip = data.read_address(&afi)?;
    let local_ip = data.read_address(&afi)?;

    let bgp_message = parse_bgp_message(&mut data, add_path, asn_len)?;

    Ok(Bgp4MpMessage {
        msg_type,
        peer_asn,
        local_asn,
        interface_index,
        peer_ip,
        local_ip,
        bgp_message,
    })
}

/*
  Same layout as above up to the addresses, followed by:
  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
  |            Old State          |          New State            |
  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
*/
fn parse_state_change(
    mut input: Bytes,
    asn_len: AsnLength,
    msg_type: Bgp4MpType,
) -> Result<Bgp4MpStateChange, ParserError> {
    let peer_asn = input.read_asn(asn_len)?;
    let local_asn = input.read_asn(asn_len)?;
    let interface_index = input.read_u16()?;
    let afi = input.read_afi()?;
    let peer_ip = input.read_address(&afi)?;
    let local_ip = input.read_address(&afi)?;
    let old_state = BgpState::try_from(input.read_u16()?)?;
    let new_state = BgpState::try_from(input.read_u16()?)?;
    Ok(Bgp4MpStateChange {
        msg_type,
        peer_asn,
        local_asn,
        interface_index,
        peer_ip,
        local_ip,
        old_state,
        new_state,
    })
}
