//! Key delegations: an account authorizing another key to act for it.

use std::fmt;

use crate::blob::Blob;
use crate::canonical::{delegation_bytes, delegation_signed_message};
use crate::cid::{Cid, Codec};
use crate::crypto::{Keypair, PublicKey, Signature};
use crate::error::CoreError;

/// What a delegation grants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DelegationPurpose {
    /// The delegate may sign changes on behalf of the issuer.
    Registration,
    /// Any other purpose string; decodes, but never validates.
    Other(String),
}

impl DelegationPurpose {
    pub fn as_str(&self) -> &str {
        match self {
            DelegationPurpose::Registration => "registration",
            DelegationPurpose::Other(s) => s,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "registration" => DelegationPurpose::Registration,
            other => DelegationPurpose::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for DelegationPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A signed `issuer -> delegate` capability. Delegations never expire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDelegation {
    pub issuer: PublicKey,
    pub delegate: PublicKey,
    pub purpose: DelegationPurpose,
    /// Wall-clock milliseconds at issue.
    pub issue_time: u64,
    pub signature: Signature,
}

impl KeyDelegation {
    /// Issue a registration delegation from `issuer` to `delegate`.
    pub fn issue(issuer: &Keypair, delegate: PublicKey, issue_time: u64) -> Self {
        let mut delegation = Self {
            issuer: issuer.public_key(),
            delegate,
            purpose: DelegationPurpose::Registration,
            issue_time,
            signature: Signature::EMPTY,
        };
        delegation.signature = issuer.sign(&delegation.signed_message());
        delegation
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        delegation_bytes(self)
    }

    pub fn to_blob(&self) -> Blob {
        Blob::new(Codec::DagCbor, self.to_bytes())
    }

    pub fn cid(&self) -> Cid {
        Cid::new(Codec::DagCbor, &self.to_bytes())
    }

    pub fn signed_message(&self) -> Vec<u8> {
        delegation_signed_message(self)
    }

    pub fn verify_signature(&self) -> Result<(), CoreError> {
        self.issuer.verify(&self.signed_message(), &self.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::{decode_blob, DecodedBlob};

    #[test]
    fn test_issue_and_verify() {
        let account = Keypair::from_seed(&[1; 32]);
        let device = Keypair::from_seed(&[2; 32]);
        let kd = KeyDelegation::issue(&account, device.public_key(), 1_700_000_000_000);

        assert_eq!(kd.purpose, DelegationPurpose::Registration);
        assert!(kd.verify_signature().is_ok());
    }

    #[test]
    fn test_forged_issuer_fails() {
        let account = Keypair::from_seed(&[1; 32]);
        let mallory = Keypair::from_seed(&[6; 32]);
        let mut kd = KeyDelegation::issue(&mallory, mallory.public_key(), 5);
        kd.issuer = account.public_key();
        assert!(kd.verify_signature().is_err());
    }

    #[test]
    fn test_blob_roundtrip() {
        let account = Keypair::from_seed(&[1; 32]);
        let kd = KeyDelegation::issue(&account, Keypair::from_seed(&[2; 32]).public_key(), 99);
        match decode_blob(&kd.to_blob()).unwrap() {
            DecodedBlob::KeyDelegation(decoded) => assert_eq!(decoded, kd),
            other => panic!("expected delegation, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_purpose_preserved() {
        assert_eq!(DelegationPurpose::parse("registration"), DelegationPurpose::Registration);
        assert_eq!(DelegationPurpose::parse("admin").as_str(), "admin");
    }
}
