/*!
Byte reading helpers shared by the MRT and BGP decoders.
*/
use crate::error::ParserError;
use crate::models::*;
use bytes::{Buf, Bytes};
use ipnet::IpNet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

impl ReadUtils for Bytes {}

/// Bounds-checked reads on top of [Buf]. Every method fails with
/// [ParserError::IoNotEnoughBytes] instead of panicking on short input.
pub trait ReadUtils: Buf {
    #[inline]
    fn has_n_remaining(&self, n: usize) -> Result<(), ParserError> {
        let remaining = self.remaining();
        if remaining < n {
            Err(ParserError::IoNotEnoughBytes {
                needed: n,
                remaining,
            })
        } else {
            Ok(())
        }
    }

    #[inline]
    fn read_u8(&mut self) -> Result<u8, ParserError> {
        self.has_n_remaining(1)?;
        Ok(self.get_u8())
    }

    #[inline]
    fn read_u16(&mut self) -> Result<u16, ParserError> {
        self.has_n_remaining(2)?;
        Ok(self.get_u16())
    }

    #[inline]
    fn read_u32(&mut self) -> Result<u32, ParserError> {
        self.has_n_remaining(4)?;
        Ok(self.get_u32())
    }

    fn read_address(&mut self, afi: &Afi) -> Result<IpAddr, ParserError> {
        match afi {
            Afi::Ipv4 => self.read_ipv4_address().map(IpAddr::V4),
            Afi::Ipv6 => self.read_ipv6_address().map(IpAddr::V6),
        }
    }

    fn read_ipv4_address(&mut self) -> Result<Ipv4Addr, ParserError> {
        let addr = self.read_u32()?;
        Ok(Ipv4Addr::from(addr))
    }

    fn read_ipv6_address(&mut self) -> Result<Ipv6Addr, ParserError> {
        self.has_n_remaining(16)?;
        Ok(Ipv6Addr::from(self.get_u128()))
    }

    #[inline]
    fn read_asn(&mut self, as_length: AsnLength) -> Result<Asn, ParserError> {
        match as_length {
            AsnLength::Bits16 => self.read_u16().map(Asn::new_16bit),
            AsnLength::Bits32 => self.read_u32().map(Asn::new_32bit),
        }
    }

    fn read_asns(&mut self, as_length: AsnLength, count: usize) -> Result<Vec<Asn>, ParserError> {
        let width = match as_length {
            AsnLength::Bits16 => 2,
            AsnLength::Bits32 => 4,
        };
        self.has_n_remaining(count * width)?;
        (0..count).map(|_| self.read_asn(as_length)).collect()
    }

    fn read_afi(&mut self) -> Result<Afi, ParserError> {
        Afi::try_from(self.read_u16()?).map_err(ParserError::from)
    }

    fn read_safi(&mut self) -> Result<Safi, ParserError> {
        Safi::try_from(self.read_u8()?).map_err(ParserError::from)
    }

    /// Reads one NLRI-encoded prefix: an optional 4-byte path id (add-path), a bit length, then
    /// just enough bytes to hold that many bits.
    fn read_nlri_prefix(
        &mut self,
        afi: &Afi,
        add_path: bool,
    ) -> Result<NetworkPrefix, ParserError> {
        let path_id = match add_path {
            true => Some(self.read_u32()?),
            false => None,
        };

        let bit_len = self.read_u8()?;
        if bit_len > afi.address_bits() {
            return Err(ParserError::ParseError(format!(
                "invalid prefix length {} for {:?}",
                bit_len, afi
            )));
        }
        let byte_len = (bit_len as usize).div_ceil(8);
        self.has_n_remaining(byte_len)?;

        let mut buff = [0u8; 16];
        self.copy_to_slice(&mut buff[..byte_len]);
        let addr = match afi {
            Afi::Ipv4 => IpAddr::V4(Ipv4Addr::new(buff[0], buff[1], buff[2], buff[3])),
            Afi::Ipv6 => IpAddr::V6(Ipv6Addr::from(buff)),
        };
        let prefix = IpNet::new(addr, bit_len)?;

        Ok(NetworkPrefix::new(prefix.trunc(), path_id))
    }

    fn read_n_bytes(&mut self, n_bytes: usize) -> Result<Vec<u8>, ParserError> {
        self.has_n_remaining(n_bytes)?;
        Ok(self.copy_to_bytes(n_bytes).into())
    }

    fn read_n_bytes_to_string(&mut self, n_bytes: usize) -> Result<String, ParserError> {
        let buffer = self.read_n_bytes(n_bytes)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Splits `n_bytes` off the front of `input`, failing if fewer are available.
pub(crate) fn split_n(input: &mut Bytes, n_bytes: usize) -> Result<Bytes, ParserError> {
    input.has_n_remaining(n_bytes)?;
    Ok(input.split_to(n_bytes))
}

/// Reads prefixes until `input` is exhausted.
pub fn parse_nlri_list(
    mut input: Bytes,
    add_path: bool,
    afi: &Afi,
) -> Result<Vec<NetworkPrefix>, ParserError> {
    let mut prefixes = vec![];
    while input.remaining() > 0 {
        prefixes.push(input.read_nlri_prefix(afi, add_path)?);
    }
    Ok(prefixes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_read_nlri_prefix() {
        let mut input = Bytes::from_static(&[32, 0x20, 0x01, 0x0d, 0xb8]);
        let prefix = input.read_nlri_prefix(&Afi::Ipv6, false).unwrap();
        assert_eq!(prefix.prefix, IpNet::from_str("2001:db8::/32").unwrap());
        assert_eq!(prefix.path_id, None);

        let mut input = Bytes::from_static(&[0, 0, 0, 9, 24, 192, 0, 2]);
        let prefix = input.read_nlri_prefix(&Afi::Ipv4, true).unwrap();
        assert_eq!(prefix.prefix, IpNet::from_str("192.0.2.0/24").unwrap());
        assert_eq!(prefix.path_id, Some(9));
    }

    #[test]
    fn test_read_nlri_prefix_errors() {
        let mut too_long = Bytes::from_static(&[33, 1, 2, 3, 4, 5]);
        assert!(too_long.read_nlri_prefix(&Afi::Ipv4, false).is_err());

        let mut short = Bytes::from_static(&[24, 192, 0]);
        assert!(matches!(
            short.read_nlri_prefix(&Afi::Ipv4, false),
            Err(ParserError::IoNotEnoughBytes { needed: 3, remaining: 2 })
        ));
    }

    #[test]
    fn test_parse_nlri_list() {
        let input = Bytes::from_static(&[8, 10, 16, 172, 16, 0]);
        let prefixes = parse_nlri_list(input, false, &Afi::Ipv4).unwrap();
        assert_eq!(
            prefixes.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
            vec!["10.0.0.0/8", "172.16.0.0/16"]
        );
    }

    #[test]
    fn test_read_asns() {
        let mut input = Bytes::from_static(&[0, 1, 0, 2, 0, 0]);
        let asns = input.read_asns(AsnLength::Bits16, 2).unwrap();
        assert_eq!(asns, vec![Asn::new_16bit(1), Asn::new_16bit(2)]);
        assert!(input.read_asns(AsnLength::Bits32, 1).is_err());
    }
}
