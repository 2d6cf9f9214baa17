use crate::error::ParserError;
use crate::models::{CommonHeader, EntryType};
use bytes::Buf;
use std::io::Read;

const BGP4MP_ET: u16 = 17;

/// Reads an MRT common header [RFC6396][header].
///
/// [header]: https://tools.ietf.org/html/rfc6396#section-2
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |             Type              |            Subtype            |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             Length                            |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// A clean end of input before the first header byte yields [ParserError::EofExpected]; input
/// ending inside the header yields [ParserError::EofError].
///
/// An unknown entry type yields [ParserError::UnrecognizedMrtType] carrying the body length, so
/// that the caller can skip the body.
pub fn parse_common_header<T: Read>(input: &mut T) -> Result<CommonHeader, ParserError> {
    let mut raw_bytes = [0u8; 12];
    read_header_bytes(input, &mut raw_bytes)?;
    let mut data = &raw_bytes[..];

    let timestamp = data.get_u32();
    let entry_type_raw = data.get_u16();
    let entry_subtype = data.get_u16();
    // the length field does not include the length of the common header
    let mut length = data.get_u32();

    let microsecond_timestamp = match entry_type_raw {
        BGP4MP_ET => {
            // the on-wire length counts the microsecond field, which we read as part of the header
            if length < 4 {
                return Err(ParserError::ParseError(
                    "invalid MRT header length for ET record: length < 4".into(),
                ));
            }
            length -= 4;
            let mut raw_bytes = [0u8; 4];
            input
                .read_exact(&mut raw_bytes)
                .map_err(ParserError::EofError)?;
            Some((&raw_bytes[..]).get_u32())
        }
        _ => None,
    };

    let entry_type = EntryType::try_from(entry_type_raw).map_err(|_| {
        ParserError::UnrecognizedMrtType {
            entry_type: entry_type_raw,
            length,
        }
    })?;

    Ok(CommonHeader {
        timestamp,
        microsecond_timestamp,
        entry_type,
        entry_subtype,
        length,
    })
}

/// Fills `buf`, telling a clean end of stream apart from one in the middle of the header.
fn read_header_bytes<T: Read>(input: &mut T, buf: &mut [u8]) -> Result<(), ParserError> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Err(ParserError::EofExpected),
            Ok(0) => {
                return Err(ParserError::EofError(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("MRT header cut short after {} bytes", filled),
                )))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ParserError::IoError(e)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_parse_common_header() {
        let input = Bytes::from_static(&[
            0, 0, 0, 1, // timestamp
            0, 13, // entry type
            0, 1, // entry subtype
            0, 0, 0, 4, // length
        ]);
        let header = parse_common_header(&mut input.reader()).unwrap();
        assert_eq!(header.timestamp, 1);
        assert_eq!(header.entry_type, EntryType::TABLE_DUMP_V2);
        assert_eq!(header.entry_subtype, 1);
        assert_eq!(header.length, 4);
        assert_eq!(header.microsecond_timestamp, None);
    }

    #[test]
    fn test_parse_common_header_et() {
        let input = Bytes::from_static(&[
            0, 0, 0, 1, // timestamp
            0, 17, // entry type
            0, 4, // entry subtype
            0, 0, 0, 10, // length, including the microsecond field
            0, 0, 0, 5, // microsecond timestamp
        ]);
        let header = parse_common_header(&mut input.reader()).unwrap();
        assert_eq!(header.entry_type, EntryType::BGP4MP_ET);
        assert_eq!(header.length, 6);
        assert_eq!(header.microsecond_timestamp, Some(5));
    }

    #[test]
    fn test_parse_common_header_end_of_stream() {
        let empty = Bytes::new();
        assert!(matches!(
            parse_common_header(&mut empty.reader()),
            Err(ParserError::EofExpected)
        ));

        let cut = Bytes::from_static(&[0, 0, 0, 1, 0]);
        assert!(matches!(
            parse_common_header(&mut cut.reader()),
            Err(ParserError::EofError(_))
        ));
    }

    #[test]
    fn test_parse_common_header_unknown_type() {
        let input = Bytes::from_static(&[0, 0, 0, 1, 0, 99, 0, 0, 0, 0, 0, 7]);
        assert!(matches!(
            parse_common_header(&mut input.reader()),
            Err(ParserError::UnrecognizedMrtType {
                entry_type: 99,
                length: 7
            })
        ));
    }
}
