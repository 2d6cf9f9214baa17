use crate::error::ParserError;
use crate::models::*;
use crate::parser::utils::{parse_nlri_list, split_n, ReadUtils};
use bytes::{Buf, Bytes};
use log::warn;

/// Parse MP_REACH_NLRI (`reachable`) or MP_UNREACH_NLRI.
///
/// When `prefixes` is given the attribute comes from a TABLE_DUMP_V2 RIB entry. There a leading
/// non-zero byte means the abbreviated form: next hop only, with the family and the prefix taken
/// from the entry itself.
pub(crate) fn parse_nlri(
    mut input: Bytes,
    afi: Option<Afi>,
    safi: Option<Safi>,
    prefixes: Option<&[NetworkPrefix]>,
    reachable: bool,
    add_path: bool,
) -> Result<AttributeValue, ParserError> {
    input.has_n_remaining(1)?;
    let abbreviated = prefixes.is_some() && input[0] != 0;

    let (afi, safi) = match (abbreviated, afi, safi) {
        (true, Some(afi), Some(safi)) => (afi, safi),
        _ => (input.read_afi()?, input.read_safi()?),
    };

    let mut next_hop = None;
    if reachable {
        let next_hop_length = input.read_u8()? as usize;
        next_hop = parse_mp_next_hop(split_n(&mut input, next_hop_length)?)?;
    }

    let prefixes = match (abbreviated, prefixes) {
        (true, Some(prefixes)) => prefixes.to_vec(),
        _ => {
            if reachable {
                // reserved byte
                if input.read_u8()? != 0 {
                    warn!("MP_REACH_NLRI reserved byte is not 0");
                }
            }
            parse_nlri_list(input, add_path, &afi)?
        }
    };

    let nlri = Nlri {
        afi,
        safi,
        next_hop,
        prefixes,
    };
    Ok(match reachable {
        true => AttributeValue::MpReachNlri(nlri),
        false => AttributeValue::MpUnreachNlri(nlri),
    })
}

fn parse_mp_next_hop(mut input: Bytes) -> Result<Option<NextHopAddress>, ParserError> {
    let next_hop = match input.remaining() {
        0 => None,
        4 => Some(NextHopAddress::Ipv4(input.read_ipv4_address()?)),
        16 => Some(NextHopAddress::Ipv6(input.read_ipv6_address()?)),
        32 => Some(NextHopAddress::Ipv6LinkLocal(
            input.read_ipv6_address()?,
            input.read_ipv6_address()?,
        )),
        n => {
            return Err(ParserError::ParseError(format!(
                "invalid MP next hop length {}",
                n
            )))
        }
    };
    Ok(next_hop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_parse_mp_reach_full_form() {
        let mut data = vec![0, 2, 1, 32];
        data.extend_from_slice(&[0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        data.extend_from_slice(&[0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        data.push(0); // reserved
        data.extend_from_slice(&[48, 0x20, 0x01, 0x0d, 0xb8, 0, 1]);

        let AttributeValue::MpReachNlri(nlri) =
            parse_nlri(Bytes::from(data), None, None, None, true, false).unwrap()
        else {
            panic!("expected MP_REACH_NLRI");
        };
        assert_eq!(nlri.afi, Afi::Ipv6);
        assert!(matches!(
            nlri.next_hop,
            Some(NextHopAddress::Ipv6LinkLocal(_, _))
        ));
        assert_eq!(
            nlri.prefixes,
            vec![NetworkPrefix::from_str("2001:db8:1::/48").unwrap()]
        );
    }

    #[test]
    fn test_parse_mp_reach_abbreviated_form() {
        let mut data = vec![16];
        data.extend_from_slice(&[0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 9]);
        let rib_prefix = [NetworkPrefix::from_str("2001:db8::/32").unwrap()];

        let AttributeValue::MpReachNlri(nlri) = parse_nlri(
            Bytes::from(data),
            Some(Afi::Ipv6),
            Some(Safi::Unicast),
            Some(&rib_prefix),
            true,
            false,
        )
        .unwrap() else {
            panic!("expected MP_REACH_NLRI");
        };
        assert_eq!(
            nlri.next_hop,
            Some(NextHopAddress::Ipv6("2001:db8::9".parse().unwrap()))
        );
        assert_eq!(nlri.prefixes, rib_prefix.to_vec());
    }

    #[test]
    fn test_parse_mp_unreach() {
        let data = Bytes::from_static(&[0, 1, 1, 24, 192, 0, 2]);
        let AttributeValue::MpUnreachNlri(nlri) =
            parse_nlri(data, None, None, None, false, false).unwrap()
        else {
            panic!("expected MP_UNREACH_NLRI");
        };
        assert_eq!(nlri.next_hop, None);
        assert_eq!(nlri.prefixes[0].to_string(), "192.0.2.0/24");
    }
}
