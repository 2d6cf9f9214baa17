use ipnet::IpNet;
use std::collections::HashMap;

/// Disambiguates update records that share a prefix and a timestamp.
///
/// Sequence numbers only order events within one dump file. Call [SequenceGenerator::reset]
/// whenever a new file begins.
#[derive(Debug, Default, Clone)]
pub struct SequenceGenerator {
    state: HashMap<IpNet, (u32, u32)>,
}

impl SequenceGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns 0 for the first event of `prefix` at `timestamp`, then 1, 2, ... for further
    /// events at the same timestamp. A different timestamp starts over at 0.
    pub fn next(&mut self, prefix: &IpNet, timestamp: u32) -> u32 {
        match self.state.get_mut(prefix) {
            Some((last_ts, next)) if *last_ts == timestamp => {
                let seq = *next;
                *next += 1;
                seq
            }
            Some(entry) => {
                *entry = (timestamp, 1);
                0
            }
            None => {
                self.state.insert(*prefix, (timestamp, 1));
                0
            }
        }
    }

    pub fn reset(&mut self) {
        self.state.clear();
    }
}
