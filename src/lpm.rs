/*!
Longest-prefix-match index.

[PrefixTrie] maps network prefixes to values on top of `prefix_trie`'s [PrefixMap]. IPv4 and
IPv6 prefixes live in two separate maps.

```
use rib_replay::lpm::PrefixTrie;

let mut trie = PrefixTrie::new();
trie.insert("2001:db8::/32".parse().unwrap(), "covering");
trie.insert("2001:db8:1::/48".parse().unwrap(), "specific");

let (prefix, value) = trie.longest_match(&"2001:db8:1::1".parse().unwrap()).unwrap();
assert_eq!(prefix.to_string(), "2001:db8:1::/48");
assert_eq!(*value, "specific");
```
*/
use crate::error::ReplayError;
use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use prefix_trie::PrefixMap;
use std::fmt::{Debug, Formatter};
use std::net::IpAddr;

/// Longest-prefix-match map from network prefixes to values, one [PrefixMap] per address family.
///
/// Host bits are ignored: `2001:db8::1/32` and `2001:db8::/32` are the same key.
#[derive(Clone)]
pub struct PrefixTrie<T> {
    v4: PrefixMap<Ipv4Net, T>,
    v6: PrefixMap<Ipv6Net, T>,
    len: usize,
}

impl<T> Default for PrefixTrie<T> {
    fn default() -> Self {
        PrefixTrie {
            v4: PrefixMap::new(),
            v6: PrefixMap::new(),
            len: 0,
        }
    }
}

impl<T: Debug> Debug for PrefixTrie<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<T: PartialEq> PartialEq for PrefixTrie<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl<T: Eq> Eq for PrefixTrie<T> {}

/// Host route covering exactly `addr`.
fn host_prefix(addr: &IpAddr) -> IpNet {
    match addr {
        IpAddr::V4(v4) => IpNet::V4(Ipv4Net::from(*v4)),
        IpAddr::V6(v6) => IpNet::V6(Ipv6Net::from(*v6)),
    }
}

impl<T> PrefixTrie<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts or replaces the value of `prefix`, returning the previous value.
    pub fn insert(&mut self, prefix: IpNet, value: T) -> Option<T> {
        let old = match prefix.trunc() {
            IpNet::V4(p) => self.v4.insert(p, value),
            IpNet::V6(p) => self.v6.insert(p, value),
        };
        if old.is_none() {
            self.len += 1;
        }
        old
    }

    /// Value of `prefix`, inserting one built by `default` first if there is none.
    pub fn get_or_insert_with<F: FnOnce() -> T>(&mut self, prefix: IpNet, default: F) -> &mut T {
        let prefix = prefix.trunc();
        if !self.contains(&prefix) {
            self.len += 1;
        }
        match prefix {
            IpNet::V4(p) => self.v4.entry(p).or_insert_with(default),
            IpNet::V6(p) => self.v6.entry(p).or_insert_with(default),
        }
    }

    pub fn remove(&mut self, prefix: &IpNet) -> Option<T> {
        let removed = match prefix.trunc() {
            IpNet::V4(p) => self.v4.remove(&p),
            IpNet::V6(p) => self.v6.remove(&p),
        };
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    pub fn get(&self, prefix: &IpNet) -> Option<&T> {
        match prefix.trunc() {
            IpNet::V4(p) => self.v4.get(&p),
            IpNet::V6(p) => self.v6.get(&p),
        }
    }

    pub fn get_mut(&mut self, prefix: &IpNet) -> Option<&mut T> {
        match prefix.trunc() {
            IpNet::V4(p) => self.v4.get_mut(&p),
            IpNet::V6(p) => self.v6.get_mut(&p),
        }
    }

    pub fn contains(&self, prefix: &IpNet) -> bool {
        self.get(prefix).is_some()
    }

    /// Exact lookup; a missing prefix is [ReplayError::NotFound].
    pub fn lookup_exact(&self, prefix: &IpNet) -> Result<&T, ReplayError> {
        self.get(prefix)
            .ok_or_else(|| ReplayError::NotFound(format!("prefix {}", prefix)))
    }

    /// Most specific stored prefix covering `addr`.
    pub fn longest_match(&self, addr: &IpAddr) -> Option<(IpNet, &T)> {
        self.longest_match_prefix(&host_prefix(addr))
    }

    /// Most specific stored prefix covering all of `prefix`, `prefix` itself included.
    pub fn longest_match_prefix(&self, prefix: &IpNet) -> Option<(IpNet, &T)> {
        match prefix.trunc() {
            IpNet::V4(p) => self.v4.get_lpm(&p).map(|(p, v)| (IpNet::V4(*p), v)),
            IpNet::V6(p) => self.v6.get_lpm(&p).map(|(p, v)| (IpNet::V6(*p), v)),
        }
    }

    /// Like [PrefixTrie::longest_match], with a missing match as [ReplayError::NotFound].
    pub fn lookup_longest_match(&self, addr: &IpAddr) -> Result<(IpNet, &T), ReplayError> {
        self.longest_match(addr)
            .ok_or_else(|| ReplayError::NotFound(format!("no prefix covers {}", addr)))
    }

    /// All stored prefixes with their values, IPv4 first, each family in lexicographic order
    /// (a prefix comes before the prefixes it covers).
    pub fn iter(&self) -> impl Iterator<Item = (IpNet, &T)> + '_ {
        let v4 = self.v4.iter().map(|(p, v)| (IpNet::V4(*p), v));
        let v6 = self.v6.iter().map(|(p, v)| (IpNet::V6(*p), v));
        v4.chain(v6)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.iter().map(|(_, v)| v)
    }
}

impl<T> FromIterator<(IpNet, T)> for PrefixTrie<T> {
    fn from_iter<I: IntoIterator<Item = (IpNet, T)>>(iter: I) -> Self {
        let mut trie = PrefixTrie::new();
        for (prefix, value) in iter {
            trie.insert(prefix, value);
        }
        trie
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    fn addr(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_more_specific_wins() {
        let mut trie = PrefixTrie::new();
        trie.insert(net("2001:db8::/32"), 32);
        trie.insert(net("2001:db8:1::/48"), 48);

        let (prefix, value) = trie.longest_match(&addr("2001:db8:1::1")).unwrap();
        assert_eq!((prefix, *value), (net("2001:db8:1::/48"), 48));

        let (prefix, value) = trie.longest_match(&addr("2001:db8:2::1")).unwrap();
        assert_eq!((prefix, *value), (net("2001:db8::/32"), 32));

        assert!(matches!(
            trie.lookup_longest_match(&addr("2001:db9::1")),
            Err(ReplayError::NotFound(_))
        ));
    }

    #[test]
    fn test_families_are_separate() {
        let mut trie = PrefixTrie::new();
        trie.insert(net("0.0.0.0/0"), "v4 default");
        assert!(trie.longest_match(&addr("2001:db8::1")).is_none());
        assert_eq!(
            trie.longest_match(&addr("192.0.2.1")).map(|(p, _)| p),
            Some(net("0.0.0.0/0"))
        );
    }

    #[test]
    fn test_exact_lookup_and_host_bits() {
        let mut trie = PrefixTrie::new();
        assert_eq!(trie.insert(net("192.0.2.77/24"), 1), None);
        assert_eq!(trie.insert(net("192.0.2.0/24"), 2), Some(1));
        assert_eq!(trie.len(), 1);
        assert_eq!(trie.lookup_exact(&net("192.0.2.0/24")).unwrap(), &2);
        assert!(trie.lookup_exact(&net("192.0.2.0/25")).is_err());
        assert!(trie.lookup_exact(&net("192.0.0.0/16")).is_err());
    }

    #[test]
    fn test_remove() {
        let mut trie = PrefixTrie::new();
        trie.insert(net("10.0.0.0/8"), 8);
        trie.insert(net("10.1.0.0/16"), 16);
        assert_eq!(trie.remove(&net("10.1.0.0/16")), Some(16));
        assert_eq!(trie.remove(&net("10.1.0.0/16")), None);
        assert_eq!(trie.len(), 1);
        assert_eq!(
            trie.longest_match(&addr("10.1.2.3")).map(|(p, v)| (p, *v)),
            Some((net("10.0.0.0/8"), 8))
        );
        trie.remove(&net("10.0.0.0/8"));
        assert!(trie.is_empty());
        assert_eq!(trie, PrefixTrie::new());
    }

    #[test]
    fn test_longest_match_prefix() {
        let trie: PrefixTrie<u8> = [(net("2001:db8::/32"), 1), (net("2001:db8::/64"), 2)]
            .into_iter()
            .collect();
        assert_eq!(
            trie.longest_match_prefix(&net("2001:db8::/48")).map(|(p, _)| p),
            Some(net("2001:db8::/32"))
        );
        assert_eq!(
            trie.longest_match_prefix(&net("2001:db8::/64")).map(|(p, _)| p),
            Some(net("2001:db8::/64"))
        );
    }

    #[test]
    fn test_iter() {
        let mut trie = PrefixTrie::new();
        for (i, p) in ["2001:db8::/32", "10.0.0.0/8", "0.0.0.0/0", "10.128.0.0/9"]
            .iter()
            .enumerate()
        {
            trie.insert(net(p), i);
        }
        let prefixes: Vec<String> = trie.iter().map(|(p, _)| p.to_string()).collect();
        assert_eq!(
            prefixes,
            vec!["0.0.0.0/0", "10.0.0.0/8", "10.128.0.0/9", "2001:db8::/32"]
        );
        assert_eq!(trie.values().count(), 4);
    }

    #[test]
    fn test_host_bits_are_ignored() {
        let mut trie = PrefixTrie::new();
        trie.insert(net("2001:db8::1/32"), 1);
        assert!(trie.contains(&net("2001:db8::/32")));
        assert_eq!(trie.remove(&net("2001:db8::ff/32")), Some(1));
        assert!(trie.is_empty());
    }

    #[test]
    fn test_get_or_insert_with() {
        let mut trie: PrefixTrie<Vec<u32>> = PrefixTrie::new();
        trie.get_or_insert_with(net("192.0.2.0/24"), Vec::new).push(1);
        trie.get_or_insert_with(net("192.0.2.0/24"), Vec::new).push(2);
        assert_eq!(trie.len(), 1);
        assert_eq!(trie.get(&net("192.0.2.0/24")), Some(&vec![1, 2]));
    }
}
