use crate::border::BorderConfig;
use crate::error::ReplayError;
use crate::lpm::PrefixTrie;
use crate::models::{Asn, RibRow};
use crate::state::NetworkState;
use ipnet::IpNet;
use log::warn;
use regex::Regex;
use std::collections::BTreeSet;
use std::io::BufRead;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::LazyLock;

/// `<address> <length> <asn>[_<asn>...]`; multi-origin prefixes list their ASNs joined by `_`
/// (or `,` for AS sets).
static MAPPING_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S+)\s+(\d+)\s+([\d_,]+)\s*$").expect("valid regex"));

/// Which ASNs originate which prefixes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixAsnMapping {
    trie: PrefixTrie<BTreeSet<Asn>>,
}

impl PrefixAsnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.trie.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    /// Adds `asns` to the origins of `prefix`.
    pub fn insert<I: IntoIterator<Item = Asn>>(&mut self, prefix: IpNet, asns: I) {
        self.trie
            .get_or_insert_with(prefix, BTreeSet::new)
            .extend(asns);
    }

    /// Mapping from table dump rows: each prefix maps to the origins of the paths announced
    /// for it.
    pub fn from_rib_rows<'a, I>(rows: I, config: &BorderConfig) -> PrefixAsnMapping
    where
        I: IntoIterator<Item = &'a RibRow>,
    {
        let mut mapping = PrefixAsnMapping::new();
        for row in rows {
            if !config.keeps_prefix(&row.prefix) {
                continue;
            }
            let origins = row.path.origin_asns();
            if origins.is_empty() {
                continue;
            }
            mapping.insert(row.prefix, origins);
        }
        mapping
    }

    /// Mapping from the prefixes advertised in a reconstructed state.
    pub fn from_network_state(state: &NetworkState, config: &BorderConfig) -> PrefixAsnMapping {
        let mut mapping = PrefixAsnMapping::new();
        for (prefix, origins) in state.prefixes().iter() {
            if config.keeps_prefix(&prefix) && !origins.is_empty() {
                mapping.insert(prefix, origins.iter().copied());
            }
        }
        mapping
    }

    /// Reads a prefix to AS file. Lines starting with `#` are comments; lines that do not parse
    /// are logged and skipped.
    pub fn read_mapping<R: BufRead>(
        reader: R,
        config: &BorderConfig,
    ) -> Result<PrefixAsnMapping, ReplayError> {
        let mut mapping = PrefixAsnMapping::new();
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_mapping_line(line) {
                Some((prefix, asns)) => {
                    if config.keeps_prefix(&prefix) {
                        mapping.insert(prefix, asns);
                    }
                }
                None => warn!("skipping malformed mapping line {}: {}", number + 1, line),
            }
        }
        Ok(mapping)
    }

    /// Reads a mapping file, plain or compressed.
    #[cfg(feature = "parser")]
    pub fn from_mapping_file(
        path: &str,
        config: &BorderConfig,
    ) -> Result<PrefixAsnMapping, ReplayError> {
        let reader = oneio::get_reader(path).map_err(crate::error::ParserError::from)?;
        PrefixAsnMapping::read_mapping(std::io::BufReader::new(reader), config)
    }

    /// The most specific mapped prefix covering `addr`, with its origins.
    pub fn origins_of(&self, addr: &IpAddr) -> Result<(IpNet, &BTreeSet<Asn>), ReplayError> {
        self.trie.lookup_longest_match(addr)
    }

    /// Origins of exactly `prefix`.
    pub fn origins_of_prefix(&self, prefix: &IpNet) -> Option<&BTreeSet<Asn>> {
        self.trie.get(prefix)
    }

    pub fn iter(&self) -> impl Iterator<Item = (IpNet, &BTreeSet<Asn>)> {
        self.trie.iter()
    }
}

fn parse_mapping_line(line: &str) -> Option<(IpNet, Vec<Asn>)> {
    let caps = MAPPING_LINE.captures(line)?;
    let addr = IpAddr::from_str(&caps[1]).ok()?;
    let len = caps[2].parse::<u8>().ok()?;
    let prefix = IpNet::new(addr, len).ok()?.trunc();
    let asns = caps[3]
        .split(['_', ','])
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u32>().ok().map(Asn::from))
        .collect::<Option<Vec<Asn>>>()?;
    if asns.is_empty() {
        return None;
    }
    Some((prefix, asns))
}
