//! In-memory delegation graph.
//!
//! Built by replaying KeyDelegation blobs. The in-memory store keeps one to
//! answer [`DelegationSource`] lookups.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use causeway_core::{validate_delegation, Cid, KeyDelegation, PublicKey};

use crate::authority::{AuthorityChain, ChainSearch, DelegationSource};
use crate::error::Result;

/// Aggregated delegation state.
#[derive(Debug, Default)]
pub struct DelegationGraph {
    /// issuer -> delegates.
    edges: HashMap<PublicKey, BTreeSet<PublicKey>>,

    /// delegate -> issuers, for "on whose behalf may this key act".
    by_delegate: HashMap<PublicKey, BTreeSet<PublicKey>>,

    /// (issuer, delegate) -> CID of the delegation blob proving the edge.
    proofs: HashMap<(PublicKey, PublicKey), Cid>,
}

impl DelegationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and record a delegation. Returns false if the edge was
    /// already known.
    pub fn apply(&mut self, delegation: &KeyDelegation) -> Result<bool> {
        validate_delegation(delegation)?;

        let edge = (delegation.issuer, delegation.delegate);
        if self.proofs.contains_key(&edge) {
            return Ok(false);
        }
        self.proofs.insert(edge, delegation.cid());
        self.edges
            .entry(delegation.issuer)
            .or_default()
            .insert(delegation.delegate);
        self.by_delegate
            .entry(delegation.delegate)
            .or_default()
            .insert(delegation.issuer);
        Ok(true)
    }

    pub fn delegates(&self, issuer: &PublicKey) -> Vec<PublicKey> {
        self.edges
            .get(issuer)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn issuers(&self, delegate: &PublicKey) -> Vec<PublicKey> {
        self.by_delegate
            .get(delegate)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// CID of the delegation proving `issuer -> delegate`, if known.
    pub fn proof(&self, issuer: &PublicKey, delegate: &PublicKey) -> Option<Cid> {
        self.proofs.get(&(*issuer, *delegate)).copied()
    }

    /// Find a chain from `author` to `signer` within `max_depth` hops.
    pub fn authority(
        &self,
        author: &PublicKey,
        signer: &PublicKey,
        max_depth: usize,
    ) -> Option<AuthorityChain> {
        let mut search = ChainSearch::new(*author, *signer, max_depth);
        if let Some(chain) = search.immediate() {
            return Some(chain);
        }
        while let Some((issuer, depth)) = search.next() {
            if let Some(chain) = search.offer(issuer, depth, self.delegates(&issuer)) {
                return Some(chain);
            }
        }
        None
    }

    pub fn is_authorized(&self, author: &PublicKey, signer: &PublicKey, max_depth: usize) -> bool {
        self.authority(author, signer, max_depth).is_some()
    }

    pub fn len(&self) -> usize {
        self.proofs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proofs.is_empty()
    }
}

#[async_trait]
impl DelegationSource for DelegationGraph {
    async fn delegates_of(&self, issuer: &PublicKey) -> Result<Vec<PublicKey>> {
        Ok(self.delegates(issuer))
    }
}
