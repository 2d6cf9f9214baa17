//! AS path segments, the AS4_PATH reconciliation rule, and the bracketed text form.
//!
//! The text form keeps segment types so that a stored path can be parsed back:
//!
//! | segment            | rendering       |
//! |--------------------|-----------------|
//! | AS_SEQUENCE        | `1 2 3`         |
//! | AS_SET             | `{1,2,3}`       |
//! | AS_CONFED_SEQUENCE | `(1 2 3)`       |
//! | AS_CONFED_SET      | `[1,2,3]`       |
use crate::error::BgpModelsError;
use crate::models::Asn;
use itertools::Itertools;
use log::warn;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// One AS path segment, tagged by its RFC 4271 / RFC 5065 segment type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum AsPathSegment {
    AsSequence(Vec<Asn>),
    AsSet(Vec<Asn>),
    ConfedSequence(Vec<Asn>),
    ConfedSet(Vec<Asn>),
}

impl AsPathSegment {
    /// Builds a segment from its wire type code. Returns `None` for unknown codes.
    pub fn from_type_code(code: u8, asns: Vec<Asn>) -> Option<Self> {
        match code {
            1 => Some(AsPathSegment::AsSet(asns)),
            2 => Some(AsPathSegment::AsSequence(asns)),
            3 => Some(AsPathSegment::ConfedSequence(asns)),
            4 => Some(AsPathSegment::ConfedSet(asns)),
            _ => None,
        }
    }

    pub fn asns(&self) -> &[Asn] {
        match self {
            AsPathSegment::AsSequence(v)
            | AsPathSegment::AsSet(v)
            | AsPathSegment::ConfedSequence(v)
            | AsPathSegment::ConfedSet(v) => v,
        }
    }
}

/// A flattened path element.
///
/// Sequence segments contribute one token per ASN, set segments a single token. Path length and
/// the AS4_PATH merge are both defined over tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathToken {
    Asn(Asn),
    Set(Vec<Asn>),
    ConfedAsn(Asn),
    ConfedSet(Vec<Asn>),
}

impl PathToken {
    pub fn asns(&self) -> &[Asn] {
        match self {
            PathToken::Asn(asn) | PathToken::ConfedAsn(asn) => std::slice::from_ref(asn),
            PathToken::Set(v) | PathToken::ConfedSet(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AsPath {
    pub segments: Vec<AsPathSegment>,
}

impl AsPath {
    pub fn new() -> AsPath {
        AsPath { segments: vec![] }
    }

    pub fn from_segments(segments: Vec<AsPathSegment>) -> AsPath {
        AsPath { segments }
    }

    /// A path made of a single AS_SEQUENCE.
    pub fn from_sequence<I: IntoIterator<Item = u32>>(asns: I) -> AsPath {
        let asns: Vec<Asn> = asns.into_iter().map(Asn::from).collect();
        if asns.is_empty() {
            return AsPath::new();
        }
        AsPath::from_segments(vec![AsPathSegment::AsSequence(asns)])
    }

    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(|s| s.asns().is_empty())
    }

    pub fn tokens(&self) -> Vec<PathToken> {
        let mut tokens = vec![];
        for segment in &self.segments {
            match segment {
                AsPathSegment::AsSequence(v) => {
                    tokens.extend(v.iter().copied().map(PathToken::Asn))
                }
                AsPathSegment::ConfedSequence(v) => {
                    tokens.extend(v.iter().copied().map(PathToken::ConfedAsn))
                }
                AsPathSegment::AsSet(v) => tokens.push(PathToken::Set(v.clone())),
                AsPathSegment::ConfedSet(v) => tokens.push(PathToken::ConfedSet(v.clone())),
            }
        }
        tokens
    }

    /// Rebuilds segments from tokens. Adjacent sequence tokens of the same kind are regrouped
    /// into one segment.
    pub fn from_tokens(tokens: Vec<PathToken>) -> AsPath {
        let mut segments: Vec<AsPathSegment> = vec![];
        for token in tokens {
            let segment = match token {
                PathToken::Asn(asn) => {
                    if let Some(AsPathSegment::AsSequence(v)) = segments.last_mut() {
                        v.push(asn);
                        continue;
                    }
                    AsPathSegment::AsSequence(vec![asn])
                }
                PathToken::ConfedAsn(asn) => {
                    if let Some(AsPathSegment::ConfedSequence(v)) = segments.last_mut() {
                        v.push(asn);
                        continue;
                    }
                    AsPathSegment::ConfedSequence(vec![asn])
                }
                PathToken::Set(v) => AsPathSegment::AsSet(v),
                PathToken::ConfedSet(v) => AsPathSegment::ConfedSet(v),
            };
            segments.push(segment);
        }
        AsPath { segments }
    }

    /// Path length where every set counts as one hop.
    pub fn route_len(&self) -> usize {
        self.segments
            .iter()
            .map(|segment| match segment {
                AsPathSegment::AsSequence(v) | AsPathSegment::ConfedSequence(v) => v.len(),
                AsPathSegment::AsSet(_) | AsPathSegment::ConfedSet(_) => 1,
            })
            .sum()
    }

    /// Reconciles a 2-byte AS_PATH with the AS4_PATH attribute of the same update.
    ///
    /// The AS4 path replaces the trailing `len(as4_path)` tokens of `self`:
    /// `self[..len - len4] ++ as4_path`. An AS4 path longer than the 2-byte path is malformed;
    /// the AS4 path is then used alone and a warning is logged.
    pub fn merge_as4_path(&self, as4_path: &AsPath) -> AsPath {
        let tokens = self.tokens();
        let as4_tokens = as4_path.tokens();
        if as4_tokens.len() > tokens.len() {
            warn!(
                "AS4_PATH ({}) is longer than AS_PATH ({}), using AS4_PATH alone",
                as4_path, self
            );
            return as4_path.clone();
        }
        let keep = tokens.len() - as4_tokens.len();
        AsPath::from_tokens(tokens.into_iter().take(keep).chain(as4_tokens).collect())
    }

    /// ASNs of the final path element. A trailing set yields all of its members.
    pub fn origin_asns(&self) -> Vec<Asn> {
        self.tokens()
            .last()
            .map(|token| token.asns().to_vec())
            .unwrap_or_default()
    }

    /// Every ASN mentioned anywhere in the path, in path order.
    pub fn iter_asns(&self) -> impl Iterator<Item = &Asn> {
        self.segments.iter().flat_map(|s| s.asns().iter())
    }
}

impl Display for AsPathSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AsPathSegment::AsSequence(v) => write!(f, "{}", v.iter().join(" ")),
            AsPathSegment::AsSet(v) => write!(f, "{{{}}}", v.iter().join(",")),
            AsPathSegment::ConfedSequence(v) => write!(f, "({})", v.iter().join(" ")),
            AsPathSegment::ConfedSet(v) => write!(f, "[{}]", v.iter().join(",")),
        }
    }
}

impl Display for AsPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            self.segments
                .iter()
                .filter(|s| !s.asns().is_empty())
                .join(" ")
        )
    }
}

fn parse_asn_list(s: &str, separator: char) -> Result<Vec<Asn>, BgpModelsError> {
    s.split(separator)
        .filter(|v| !v.is_empty())
        .map(Asn::from_str)
        .collect()
}

impl FromStr for AsPath {
    type Err = BgpModelsError;

    /// Parses the bracketed text form produced by [Display].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || BgpModelsError::AsPathParsingError(s.to_string());
        let mut tokens = vec![];
        let mut in_confed = false;
        for word in s.split_whitespace() {
            if let Some(inner) = word.strip_prefix('{') {
                let inner = inner.strip_suffix('}').ok_or_else(err)?;
                tokens.push(PathToken::Set(parse_asn_list(inner, ',')?));
                continue;
            }
            if let Some(inner) = word.strip_prefix('[') {
                let inner = inner.strip_suffix(']').ok_or_else(err)?;
                tokens.push(PathToken::ConfedSet(parse_asn_list(inner, ',')?));
                continue;
            }

            let mut word = word;
            if let Some(rest) = word.strip_prefix('(') {
                if in_confed {
                    return Err(err());
                }
                in_confed = true;
                word = rest;
            }
            let closes = match word.strip_suffix(')') {
                Some(rest) => {
                    word = rest;
                    true
                }
                None => false,
            };
            if closes && !in_confed {
                return Err(err());
            }

            let asn = Asn::from_str(word)?;
            tokens.push(match in_confed {
                true => PathToken::ConfedAsn(asn),
                false => PathToken::Asn(asn),
            });
            if closes {
                in_confed = false;
            }
        }
        if in_confed {
            return Err(err());
        }
        Ok(AsPath::from_tokens(tokens))
    }
}
