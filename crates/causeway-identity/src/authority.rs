//! Signer authority: does a delegation chain connect an account to a key?

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use causeway_core::PublicKey;
use tracing::debug;

use crate::error::{IdentityError, Result};

/// Default bound on delegation chain length.
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// Anything that can answer "whom has this key delegated to?".
///
/// Implemented by the stores over their `key_delegations` index and by the
/// in-memory [`DelegationGraph`](crate::DelegationGraph).
#[async_trait]
pub trait DelegationSource: Send + Sync {
    /// Keys `issuer` has directly delegated to.
    async fn delegates_of(&self, issuer: &PublicKey) -> Result<Vec<PublicKey>>;
}

/// A verified path `author -> ... -> signer`. A self-signed change has a
/// chain of length one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityChain(Vec<PublicKey>);

impl AuthorityChain {
    pub fn keys(&self) -> &[PublicKey] {
        &self.0
    }

    /// Number of delegation hops.
    pub fn hops(&self) -> usize {
        self.0.len().saturating_sub(1)
    }
}

/// Breadth-first search state for one authority check.
///
/// Kept separate from any source so the same walk drives both the async
/// store-backed check and the synchronous in-memory one.
pub(crate) struct ChainSearch {
    author: PublicKey,
    signer: PublicKey,
    max_depth: usize,
    queue: VecDeque<(PublicKey, usize)>,
    parent: HashMap<PublicKey, PublicKey>,
}

impl ChainSearch {
    pub(crate) fn new(author: PublicKey, signer: PublicKey, max_depth: usize) -> Self {
        let mut queue = VecDeque::new();
        queue.push_back((author, 0));
        Self {
            author,
            signer,
            max_depth,
            queue,
            parent: HashMap::new(),
        }
    }

    /// Trivial case: the author signed for itself.
    pub(crate) fn immediate(&self) -> Option<AuthorityChain> {
        (self.author == self.signer).then(|| AuthorityChain(vec![self.author]))
    }

    /// Next issuer whose delegates should be looked up.
    pub(crate) fn next(&mut self) -> Option<(PublicKey, usize)> {
        self.queue.pop_front()
    }

    /// Feed the delegates of `issuer` (found at `depth`) into the search.
    pub(crate) fn offer(
        &mut self,
        issuer: PublicKey,
        depth: usize,
        delegates: Vec<PublicKey>,
    ) -> Option<AuthorityChain> {
        for delegate in delegates {
            if delegate == self.author || self.parent.contains_key(&delegate) {
                continue;
            }
            self.parent.insert(delegate, issuer);
            if delegate == self.signer {
                return Some(self.path_to(delegate));
            }
            if depth + 1 < self.max_depth {
                self.queue.push_back((delegate, depth + 1));
            }
        }
        None
    }

    pub(crate) fn unauthorized(&self) -> IdentityError {
        IdentityError::Unauthorized {
            author: self.author,
            signer: self.signer,
        }
    }

    fn path_to(&self, mut key: PublicKey) -> AuthorityChain {
        let mut path = vec![key];
        while let Some(&issuer) = self.parent.get(&key) {
            path.push(issuer);
            key = issuer;
        }
        path.reverse();
        AuthorityChain(path)
    }
}

/// Find a delegation chain from `author` to `signer` of at most `max_depth`
/// hops, or fail with [`IdentityError::Unauthorized`].
pub async fn resolve_authority<D: DelegationSource + ?Sized>(
    source: &D,
    author: &PublicKey,
    signer: &PublicKey,
    max_depth: usize,
) -> Result<AuthorityChain> {
    let mut search = ChainSearch::new(*author, *signer, max_depth);
    if let Some(chain) = search.immediate() {
        return Ok(chain);
    }

    while let Some((issuer, depth)) = search.next() {
        let delegates = source.delegates_of(&issuer).await?;
        if let Some(chain) = search.offer(issuer, depth, delegates) {
            debug!(author = %author, signer = %signer, hops = chain.hops(), "delegation chain found");
            return Ok(chain);
        }
    }

    Err(search.unauthorized())
}
