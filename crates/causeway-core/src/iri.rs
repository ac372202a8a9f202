//! Resource identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::crypto::PublicKey;
use crate::error::CoreError;

/// Scheme used for resources this crate mints itself.
pub const DEFAULT_SCHEME: &str = "hm";

const MAX_IRI_LEN: usize = 2048;

/// What kind of entity a resource is, derived from the first path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Account,
    Document,
    Group,
    Other,
}

/// An IRI naming a mutable resource, e.g. `hm://d/roadmap`.
///
/// Validation is deliberately shallow: a lowercase scheme, `://`, and a
/// non-empty body without whitespace, query or fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Iri(String);

impl Iri {
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        if s.len() > MAX_IRI_LEN {
            return Err(CoreError::InvalidIri("too long".into()));
        }
        let (scheme, body) = s
            .split_once("://")
            .ok_or_else(|| CoreError::InvalidIri(format!("missing scheme in {s:?}")))?;

        let mut chars = scheme.chars();
        let scheme_ok = chars.next().is_some_and(|c| c.is_ascii_lowercase())
            && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "+-.".contains(c));
        if !scheme_ok {
            return Err(CoreError::InvalidIri(format!("bad scheme {scheme:?}")));
        }
        if body.is_empty() || body.starts_with('/') {
            return Err(CoreError::InvalidIri(format!("empty path in {s:?}")));
        }
        if body
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '?' || c == '#')
        {
            return Err(CoreError::InvalidIri(format!("illegal character in {s:?}")));
        }
        Ok(Self(s.to_owned()))
    }

    /// The account resource owned by `key`.
    pub fn account(key: &PublicKey) -> Self {
        Self(format!("{DEFAULT_SCHEME}://a/{}", key.to_hex()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn scheme(&self) -> &str {
        self.0.split_once("://").map_or("", |(scheme, _)| scheme)
    }

    /// Everything after `://`.
    pub fn path(&self) -> &str {
        self.0.split_once("://").map_or("", |(_, path)| path)
    }

    /// The account key named by an account IRI (`<scheme>://a/<hex>`).
    pub fn account_key(&self) -> Option<PublicKey> {
        let hex = self.path().strip_prefix("a/")?;
        PublicKey::from_hex(hex).ok()
    }

    pub fn kind(&self) -> EntityKind {
        match self.path().split('/').next() {
            Some("a") => EntityKind::Account,
            Some("d") => EntityKind::Document,
            Some("g") => EntityKind::Group,
            _ => EntityKind::Other,
        }
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Iri {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Iri {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Iri> for String {
    fn from(iri: Iri) -> Self {
        iri.0
    }
}

impl AsRef<str> for Iri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;

    #[test]
    fn test_parse_valid() {
        let iri = Iri::parse("hm://d/roadmap/2024").unwrap();
        assert_eq!(iri.scheme(), "hm");
        assert_eq!(iri.path(), "d/roadmap/2024");
        assert_eq!(iri.kind(), EntityKind::Document);
    }

    #[test]
    fn test_parse_invalid() {
        for bad in ["", "roadmap", "HM://d/x", "hm://", "hm:///x", "hm://d/a b", "hm://d/x?v=1", "1x://d"] {
            assert!(Iri::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_account_iri() {
        let pk = Keypair::from_seed(&[3; 32]).public_key();
        let iri = Iri::account(&pk);
        assert_eq!(iri.kind(), EntityKind::Account);
        assert!(iri.as_str().ends_with(&pk.to_hex()));
        assert_eq!(iri.account_key(), Some(pk));
        assert_eq!(Iri::parse("hm://a/nothex").unwrap().account_key(), None);
        assert_eq!(Iri::parse("hm://d/x").unwrap().account_key(), None);
        assert_eq!(Iri::parse(iri.as_str()).unwrap(), iri);
    }

    #[test]
    fn test_serde_validates() {
        let ok: Iri = serde_json::from_str("\"hm://g/team\"").unwrap();
        assert_eq!(ok.kind(), EntityKind::Group);
        assert!(serde_json::from_str::<Iri>("\"nope\"").is_err());
    }
}
