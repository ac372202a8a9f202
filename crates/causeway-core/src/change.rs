//! Changes: the signed, immutable unit of mutation.

use bytes::Bytes;

use crate::blob::Blob;
use crate::canonical::{change_bytes, change_signed_message};
use crate::cid::{Cid, Codec};
use crate::crypto::{Keypair, PublicKey, Signature};
use crate::error::CoreError;
use crate::hlc::HlcTimestamp;
use crate::iri::Iri;

/// A signed mutation of one resource.
///
/// `author` is the account the change is attributed to; `signer` is the key
/// that actually signed it. They differ when a device key acts for an
/// account under a [`KeyDelegation`](crate::KeyDelegation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub author: PublicKey,
    pub signer: PublicKey,
    pub resource: Iri,
    pub hlc: HlcTimestamp,
    /// Causal parents, sorted by CID string.
    pub deps: Vec<Cid>,
    /// Opaque to the store; only an applier interprets it.
    pub payload: Bytes,
    /// Optional indexing hint, stored in the structural row's meta column.
    pub hint: Option<String>,
    /// CID of the delegation that authorizes `signer` for `author`.
    pub delegation: Option<Cid>,
    pub signature: Signature,
}

impl Change {
    /// Canonical encoding of the signed change.
    pub fn to_bytes(&self) -> Vec<u8> {
        change_bytes(self)
    }

    /// The change as a dag-cbor blob.
    pub fn to_blob(&self) -> Blob {
        Blob::new(Codec::DagCbor, self.to_bytes())
    }

    pub fn cid(&self) -> Cid {
        Cid::new(Codec::DagCbor, &self.to_bytes())
    }

    pub fn signed_message(&self) -> Vec<u8> {
        change_signed_message(self)
    }

    /// Verify the signature under `signer`. Authority of the signer over
    /// `author` is checked separately against the delegation index.
    pub fn verify_signature(&self) -> Result<(), CoreError> {
        self.signer.verify(&self.signed_message(), &self.signature)
    }

    pub fn is_root(&self) -> bool {
        self.deps.is_empty()
    }

    pub fn is_self_signed(&self) -> bool {
        self.author == self.signer
    }
}

/// Builder for signed changes.
pub struct ChangeBuilder {
    author: PublicKey,
    resource: Iri,
    hlc: HlcTimestamp,
    deps: Vec<Cid>,
    payload: Bytes,
    hint: Option<String>,
    delegation: Option<Cid>,
}

impl ChangeBuilder {
    pub fn new(author: PublicKey, resource: Iri) -> Self {
        Self {
            author,
            resource,
            hlc: HlcTimestamp::ZERO,
            deps: Vec::new(),
            payload: Bytes::new(),
            hint: None,
            delegation: None,
        }
    }

    pub fn hlc(mut self, hlc: HlcTimestamp) -> Self {
        self.hlc = hlc;
        self
    }

    pub fn dep(mut self, dep: Cid) -> Self {
        self.deps.push(dep);
        self
    }

    pub fn deps(mut self, deps: impl IntoIterator<Item = Cid>) -> Self {
        self.deps.extend(deps);
        self
    }

    pub fn payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn delegation(mut self, delegation: Cid) -> Self {
        self.delegation = Some(delegation);
        self
    }

    /// Sort and deduplicate deps, then sign with `keypair`.
    pub fn sign(self, keypair: &Keypair) -> Change {
        let mut deps = self.deps;
        deps.sort();
        deps.dedup();

        let mut change = Change {
            author: self.author,
            signer: keypair.public_key(),
            resource: self.resource,
            hlc: self.hlc,
            deps,
            payload: self.payload,
            hint: self.hint,
            delegation: self.delegation,
            signature: Signature::EMPTY,
        };
        change.signature = keypair.sign(&change.signed_message());
        change
    }
}
