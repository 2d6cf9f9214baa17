/*!
MRT dump decoding.

[MrtParser] reads one dump file record by record. Plain, gzip and bzip2 files are all accepted
by [MrtParser::new]; any other [Read] source goes through [MrtParser::from_reader].
*/
use crate::error::ParserError;
use crate::models::MrtRecord;
use std::io::Read;

pub mod bgp;
pub mod iters;
pub mod mrt;
pub mod utils;

pub use iters::RecordIterator;
pub use mrt::{parse_mrt_body, parse_mrt_record};
pub use utils::{parse_nlri_list, ReadUtils};

pub struct MrtParser<R> {
    reader: R,
}

impl MrtParser<Box<dyn Read + Send>> {
    /// Opens a local dump file; compression is picked from the file extension.
    pub fn new(path: &str) -> Result<Self, ParserError> {
        let reader = oneio::get_reader(path)?;
        Ok(MrtParser { reader })
    }
}

impl<R: Read> MrtParser<R> {
    pub fn from_reader(reader: R) -> Self {
        MrtParser { reader }
    }

    /// Decodes the next record. [ParserError::EofExpected] marks the clean end of the dump.
    pub fn next_record(&mut self) -> Result<MrtRecord, ParserError> {
        parse_mrt_record(&mut self.reader)
    }

    pub fn into_record_iter(self) -> RecordIterator<R> {
        RecordIterator::new(self)
    }
}
