/*!
error module defines the error types used in rib-replay.
*/
use chrono::{DateTime, Utc};
use num_enum::{TryFromPrimitive, TryFromPrimitiveError};
use std::io;
use thiserror::Error;

/// Errors raised while decoding MRT records and the BGP messages they carry.
#[derive(Debug, Error)]
pub enum ParserError {
    /// This error represents a [num_enum::TryFromPrimitiveError] error for any of a number of
    /// different types.
    ///
    /// ## Occurs during:
    ///  - Parsing of an MRT message body
    #[error("unrecognized value {value} for {type_name}")]
    UnrecognizedEnumVariant { type_name: &'static str, value: u64 },
    /// The MRT header carries a type we do not know. The record body has already been consumed
    /// when this is returned, so the stream stays aligned on the next record.
    ///
    /// ## Occurs during:
    ///  - Parsing of an MRT message header
    #[error("unrecognized type {entry_type} in MRT header")]
    UnrecognizedMrtType { entry_type: u16, length: u32 },
    /// An address mask is larger than the length of the address it is applied to.
    ///
    /// ## Occurs during:
    ///  - Reading network prefixes
    #[error("invalid network prefix mask")]
    InvalidPrefixLength(#[from] ipnet::PrefixLenError),
    /// A general IO error triggered by the internal reader.
    #[error(transparent)]
    IoError(#[from] io::Error),
    /// The stream ended in the middle of a record.
    #[error("unexpected end of stream: {0}")]
    EofError(io::Error),
    /// The stream ended cleanly between two records.
    #[error("end of stream")]
    EofExpected,
    #[cfg(feature = "parser")]
    #[error(transparent)]
    OneIoError(#[from] oneio::OneIoError),
    #[error("not enough bytes left: need {needed}, have {remaining}")]
    IoNotEnoughBytes { needed: usize, remaining: usize },
    #[error("truncated message: {0}")]
    TruncatedMsg(String),
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl<T> From<TryFromPrimitiveError<T>> for ParserError
where
    T: TryFromPrimitive,
    T::Primitive: Into<u64>,
{
    #[inline]
    fn from(value: TryFromPrimitiveError<T>) -> Self {
        ParserError::UnrecognizedEnumVariant {
            type_name: T::NAME,
            value: value.number.into(),
        }
    }
}

impl ParserError {
    /// Whether the error leaves the underlying stream unusable.
    ///
    /// Anything but an I/O level failure only spoils the current record: its body was already
    /// read in full, so the caller can move on to the next one.
    pub fn is_fatal(&self) -> bool {
        match self {
            ParserError::IoError(_) | ParserError::EofError(_) | ParserError::EofExpected => true,
            #[cfg(feature = "parser")]
            ParserError::OneIoError(_) => true,
            _ => false,
        }
    }
}

/// Errors from parsing textual forms of the models.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BgpModelsError {
    #[error("cannot parse prefix: {0}")]
    PrefixParsingError(String),
    #[error("cannot parse AS number: {0}")]
    AsnParsingError(String),
    #[error("cannot parse AS path: {0}")]
    AsPathParsingError(String),
    #[error("cannot parse route flag: {0}")]
    FlagParsingError(String),
}

impl From<ipnet::AddrParseError> for BgpModelsError {
    fn from(value: ipnet::AddrParseError) -> Self {
        BgpModelsError::PrefixParsingError(value.to_string())
    }
}

/// Errors from route extraction, state reconstruction and border inference.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// A record references state the file never provided, e.g. a RIB entry pointing at a peer
    /// index that no peer index table defined.
    #[error("data integrity: {0}")]
    DataIntegrity(String),
    /// A lookup found nothing. Callers treat this as "no information available".
    #[error("not found: {0}")]
    NotFound(String),
    /// No baseline table dump exists at or before the requested time.
    #[error("no baseline available for {0}")]
    NoBaselineAvailable(DateTime<Utc>),
    #[error("invalid time: {0}")]
    InvalidTime(String),
    #[error("invalid time window: {start} is after {end}")]
    InvalidTimeWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// The backing store failed to answer a query, e.g. a lost database connection.
    #[error("historical store: {0}")]
    Store(String),
    /// A trace line that claims to be a trace record but cannot be read as one.
    #[error("malformed trace record: {0}")]
    TraceParsing(String),
    #[error(transparent)]
    Parser(#[from] ParserError),
    #[error(transparent)]
    Io(#[from] io::Error),
}
