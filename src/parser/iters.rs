/*!
Provides the record iterator over an [MrtParser].
*/
use crate::error::ParserError;
use crate::models::MrtRecord;
use crate::parser::MrtParser;
use log::{error, warn};
use std::io::Read;

/// Yields every record that decodes, skipping and counting the ones that do not.
///
/// Iteration ends at the clean end of the dump, or at the first I/O failure, which is logged.
pub struct RecordIterator<R> {
    parser: MrtParser<R>,
    count: u64,
    skipped: u64,
    failed: bool,
}

impl<R> RecordIterator<R> {
    pub(crate) fn new(parser: MrtParser<R>) -> Self {
        RecordIterator {
            parser,
            count: 0,
            skipped: 0,
            failed: false,
        }
    }

    /// Records successfully decoded so far.
    pub fn decoded(&self) -> u64 {
        self.count
    }

    /// Records that could not be decoded and were skipped.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Whether iteration stopped on an I/O error rather than at the end of the dump.
    pub fn failed(&self) -> bool {
        self.failed
    }
}

impl<R: Read> Iterator for RecordIterator<R> {
    type Item = MrtRecord;

    fn next(&mut self) -> Option<MrtRecord> {
        if self.failed {
            return None;
        }
        loop {
            match self.parser.next_record() {
                Ok(record) => {
                    self.count += 1;
                    return Some(record);
                }
                Err(ParserError::EofExpected) => return None,
                Err(e) if e.is_fatal() => {
                    error!("stopping after {} records: {}", self.count, e);
                    self.failed = true;
                    return None;
                }
                Err(e) => {
                    warn!("skipping record {}: {}", self.count + self.skipped, e);
                    self.skipped += 1;
                }
            }
        }
    }
}
