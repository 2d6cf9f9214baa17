use crate::error::ReplayError;
use crate::lpm::PrefixTrie;
use crate::models::{AsPath, Asn};
use ipnet::IpNet;
use std::collections::{BTreeSet, HashMap};
use std::net::IpAddr;

/// A path announced by a peer, with the position of the announcement among that peer's
/// announcements so that the most recent one can be found again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub path: AsPath,
    pub order: u64,
}

/// One BGP peer of a collector.
///
/// A physical router may show up under several addresses; they are kept together as aliases.
/// `hops_to_border` maps a destination AS to the number of hops between this peer and the
/// border of that AS. Negative distances mean the peer sits inside the AS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    aliases: BTreeSet<IpAddr>,
    advertisements: PrefixTrie<Advertisement>,
    hops_to_border: HashMap<Asn, i32>,
    announced: u64,
}

impl Peer {
    pub fn new(address: IpAddr) -> Peer {
        Peer::with_aliases([address])
    }

    pub fn with_aliases<I: IntoIterator<Item = IpAddr>>(aliases: I) -> Peer {
        Peer {
            aliases: aliases.into_iter().collect(),
            advertisements: PrefixTrie::new(),
            hops_to_border: HashMap::new(),
            announced: 0,
        }
    }

    pub fn add_alias(&mut self, address: IpAddr) {
        self.aliases.insert(address);
    }

    pub fn aliases(&self) -> impl Iterator<Item = &IpAddr> {
        self.aliases.iter()
    }

    pub fn is_known_as(&self, address: &IpAddr) -> bool {
        self.aliases.contains(address)
    }

    /// Records `path` as this peer's route to `prefix`, returning the path it replaces.
    pub fn announce(&mut self, prefix: IpNet, path: AsPath) -> Option<AsPath> {
        self.announced += 1;
        let advertisement = Advertisement {
            path,
            order: self.announced,
        };
        self.advertisements
            .insert(prefix, advertisement)
            .map(|old| old.path)
    }

    pub fn withdraw(&mut self, prefix: &IpNet) -> Option<AsPath> {
        self.advertisements.remove(prefix).map(|old| old.path)
    }

    pub fn has_path_to(&self, prefix: &IpNet) -> bool {
        self.advertisements.contains(prefix)
    }

    pub fn path_to(&self, prefix: &IpNet) -> Result<&AsPath, ReplayError> {
        self.advertisements
            .lookup_exact(prefix)
            .map(|adv| &adv.path)
    }

    /// The most specific advertised prefix covering `prefix`, with its path.
    pub fn longest_match(&self, prefix: &IpNet) -> Option<(IpNet, &AsPath)> {
        self.advertisements
            .longest_match_prefix(prefix)
            .map(|(matched, adv)| (matched, &adv.path))
    }

    pub fn advertisements(&self) -> impl Iterator<Item = (IpNet, &AsPath)> {
        self.advertisements.iter().map(|(prefix, adv)| (prefix, &adv.path))
    }

    pub fn advertisement_count(&self) -> usize {
        self.advertisements.len()
    }

    /// Path of the most recent announcement still in effect.
    pub fn latest_path(&self) -> Option<&AsPath> {
        self.advertisements
            .values()
            .max_by_key(|adv| adv.order)
            .map(|adv| &adv.path)
    }

    /// Union of the origin ASNs of every path still advertised.
    pub fn origin_asns(&self) -> BTreeSet<Asn> {
        self.advertisements
            .values()
            .flat_map(|adv| adv.path.origin_asns())
            .collect()
    }

    pub fn hops_to_as(&self, asn: &Asn) -> Result<i32, ReplayError> {
        self.hops_to_border
            .get(asn)
            .copied()
            .ok_or_else(|| ReplayError::NotFound(format!("no hop distance to AS{}", asn)))
    }

    /// Records a hop distance to the border of `asn`; the smallest distance seen is kept.
    pub fn record_hops(&mut self, asn: Asn, hops: i32) {
        self.hops_to_border
            .entry(asn)
            .and_modify(|known| *known = (*known).min(hops))
            .or_insert(hops);
    }

    pub fn hops_to_border(&self) -> &HashMap<Asn, i32> {
        &self.hops_to_border
    }
}
