use super::mrt_header::parse_common_header;
use crate::error::ParserError;
use crate::models::*;
use crate::parser::mrt::messages::{
    parse_bgp4mp, parse_table_dump_message, parse_table_dump_v2_message,
};
use bytes::{Bytes, BytesMut};
use std::io::{self, Read};

/// Reads and decodes one MRT record.
///
/// The whole body is buffered before decoding, so a body that fails to decode never leaves the
/// reader in the middle of a record. See [ParserError::is_fatal].
pub fn parse_mrt_record(input: &mut impl Read) -> Result<MrtRecord, ParserError> {
    let common_header = match parse_common_header(input) {
        Ok(v) => v,
        Err(ParserError::UnrecognizedMrtType { entry_type, length }) => {
            let skipped = io::copy(&mut input.take(length as u64), &mut io::sink())?;
            if skipped < length as u64 {
                return Err(ParserError::EofError(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "MRT body cut short",
                )));
            }
            return Err(ParserError::UnrecognizedMrtType { entry_type, length });
        }
        Err(e) => return Err(e),
    };

    let mut buffer = BytesMut::zeroed(common_header.length as usize);
    input
        .take(common_header.length as u64)
        .read_exact(&mut buffer)
        .map_err(ParserError::EofError)?;

    let message = parse_mrt_body(
        common_header.entry_type,
        common_header.entry_subtype,
        buffer.freeze(),
    )?;
    Ok(MrtRecord {
        common_header,
        message,
    })
}

pub fn parse_mrt_body(
    entry_type: EntryType,
    entry_subtype: u16,
    data: Bytes,
) -> Result<MrtMessage, ParserError> {
    let message = match entry_type {
        EntryType::TABLE_DUMP => {
            MrtMessage::TableDumpMessage(parse_table_dump_message(entry_subtype, data)?)
        }
        EntryType::TABLE_DUMP_V2 => {
            MrtMessage::TableDumpV2Message(parse_table_dump_v2_message(entry_subtype, data)?)
        }
        EntryType::BGP4MP | EntryType::BGP4MP_ET => {
            MrtMessage::Bgp4Mp(parse_bgp4mp(entry_subtype, data)?)
        }
        v => {
            return Err(ParserError::Unsupported(format!(
                "unsupported MRT type: {:?}",
                v
            )));
        }
    };
    Ok(message)
}
