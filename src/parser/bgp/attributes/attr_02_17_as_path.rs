use crate::error::ParserError;
use crate::models::*;
use crate::parser::utils::ReadUtils;
use bytes::{Buf, Bytes};

/// Parse AS_PATH or AS4_PATH: a list of (segment type, ASN count, ASNs) triples.
pub(crate) fn parse_as_path(mut input: Bytes, asn_len: AsnLength) -> Result<AsPath, ParserError> {
    let mut segments = Vec::new();
    while input.remaining() > 0 {
        let segment_type = input.read_u8()?;
        let count = input.read_u8()? as usize;
        let asns = input.read_asns(asn_len, count)?;
        let segment = AsPathSegment::from_type_code(segment_type, asns).ok_or_else(|| {
            ParserError::ParseError(format!("invalid AS path segment type {}", segment_type))
        })?;
        segments.push(segment);
    }
    Ok(AsPath::from_segments(segments))
}
