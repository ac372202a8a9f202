//! Versions: canonical sets of head CIDs.

use std::fmt;
use std::str::FromStr;

use crate::cid::Cid;
use crate::error::CoreError;

/// Separator between CIDs in a version string.
pub const VERSION_SEPARATOR: char = '.';

/// A deduplicated set of head CIDs, sorted by CID string.
///
/// The string form joins the CIDs with `.`; the empty set is the empty
/// string. Two peers holding the same heads produce byte-identical strings.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Version(Vec<Cid>);

impl Version {
    pub fn new(cids: impl IntoIterator<Item = Cid>) -> Self {
        let mut cids: Vec<Cid> = cids.into_iter().collect();
        cids.sort();
        cids.dedup();
        Self(cids)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn cids(&self) -> &[Cid] {
        &self.0
    }

    pub fn contains(&self, cid: &Cid) -> bool {
        self.0.contains(cid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cid> {
        self.0.iter()
    }

    /// Parse a version string. The empty string is the empty version.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        if s.is_empty() {
            return Ok(Self::empty());
        }
        let cids = s
            .split(VERSION_SEPARATOR)
            .map(|part| {
                part.parse::<Cid>()
                    .map_err(|e| CoreError::InvalidVersion(format!("{s:?}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(cids))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, cid) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{VERSION_SEPARATOR}")?;
            }
            write!(f, "{cid}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({self})")
    }
}

impl FromStr for Version {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl FromIterator<Cid> for Version {
    fn from_iter<I: IntoIterator<Item = Cid>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl<'a> IntoIterator for &'a Version {
    type Item = &'a Cid;
    type IntoIter = std::slice::Iter<'a, Cid>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cid::Codec;

    fn cid(n: u8) -> Cid {
        Cid::new(Codec::DagCbor, &[n])
    }

    #[test]
    fn test_empty_version_is_empty_string() {
        assert_eq!(Version::empty().to_string(), "");
        assert!(Version::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_sorted_and_deduplicated() {
        let (a, b, c) = (cid(1), cid(2), cid(3));
        let v = Version::new([c, a, b, a]);
        assert_eq!(v.len(), 3);

        let mut expected = vec![a.to_string(), b.to_string(), c.to_string()];
        expected.sort();
        assert_eq!(v.to_string(), expected.join("."));
    }

    #[test]
    fn test_order_independent() {
        let v1 = Version::new([cid(1), cid(2)]);
        let v2 = Version::new([cid(2), cid(1)]);
        assert_eq!(v1, v2);
        assert_eq!(v1.to_string(), v2.to_string());
    }

    #[test]
    fn test_parse_roundtrip() {
        let v = Version::new([cid(4), cid(5), cid(6)]);
        assert_eq!(Version::parse(&v.to_string()).unwrap(), v);
    }

    #[test]
    fn test_parse_rejects_bad_parts() {
        let good = cid(1).to_string();
        assert!(Version::parse(&format!("{good}.")).is_err());
        assert!(Version::parse("bnotacid").is_err());
    }
}
