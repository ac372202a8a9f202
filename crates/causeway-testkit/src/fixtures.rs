//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use causeway_core::{
    Change, ChangeBuilder, ChangeSummary, Cid, HlcTimestamp, Iri, KeyDelegation, Keypair,
    PublicKey,
};
use causeway_store::{InsertResult, Store, StoreError};

/// A test fixture: one keypair writing to one document.
pub struct TestFixture {
    pub keypair: Keypair,
    pub resource: Iri,
}

impl TestFixture {
    /// Create a new test fixture with a random keypair and document.
    pub fn new() -> Self {
        let suffix = hex::encode(rand::random::<[u8; 8]>());
        Self {
            keypair: Keypair::generate(),
            resource: doc_iri(&suffix),
        }
    }

    /// Create with a deterministic keypair from seed, writing to the shared
    /// fixture document.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self {
            keypair: Keypair::from_seed(&seed),
            resource: doc_iri("fixture"),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    /// The account IRI of this fixture's key.
    pub fn account(&self) -> Iri {
        Iri::account(&self.keypair.public_key())
    }

    /// A self-signed change at `ts` milliseconds.
    pub fn change(&self, ts: u64, deps: &[Cid], payload: &[u8]) -> Change {
        ChangeBuilder::new(self.public_key(), self.resource.clone())
            .hlc(HlcTimestamp::new(ts, 0))
            .deps(deps.iter().copied())
            .payload(payload.to_vec())
            .sign(&self.keypair)
    }

    pub fn root(&self, ts: u64, payload: &[u8]) -> Change {
        self.change(ts, &[], payload)
    }

    /// A change attributed to `account`, signed by this fixture's key under
    /// `delegation`.
    pub fn change_for(
        &self,
        account: PublicKey,
        delegation: Cid,
        ts: u64,
        deps: &[Cid],
        payload: &[u8],
    ) -> Change {
        ChangeBuilder::new(account, self.resource.clone())
            .hlc(HlcTimestamp::new(ts, 0))
            .deps(deps.iter().copied())
            .payload(payload.to_vec())
            .delegation(delegation)
            .sign(&self.keypair)
    }

    /// Authorize `delegate` to sign for this fixture's account.
    pub fn delegate_to(&self, delegate: PublicKey, issue_time: u64) -> KeyDelegation {
        KeyDelegation::issue(&self.keypair, delegate, issue_time)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// `hm://d/<name>`
pub fn doc_iri(name: &str) -> Iri {
    Iri::parse(&format!("hm://d/{name}")).unwrap_or_else(|e| panic!("bad fixture iri {name}: {e}"))
}

/// Create multiple test fixtures for multi-party tests, all writing to the
/// same document.
pub fn multi_party_fixtures(count: usize) -> Vec<TestFixture> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = i as u8 + 1;
            TestFixture::with_seed(seed)
        })
        .collect()
}

/// Summaries of `changes`, with every author untrusted.
pub fn summaries(changes: &[Change]) -> Vec<ChangeSummary> {
    changes
        .iter()
        .map(|c| ChangeSummary::from_change(c.cid(), c, false))
        .collect()
}

/// Insert `changes` into a store in the given order. Panics on anything
/// but `Inserted` or `AlreadyExists`.
pub async fn load_changes<S: Store + ?Sized>(
    store: &S,
    changes: &[Change],
) -> Result<(), StoreError> {
    for change in changes {
        match store.insert_change(&change.to_blob(), change, None).await? {
            InsertResult::Inserted | InsertResult::AlreadyExists => {}
            other => panic!("could not load {}: {other:?}", change.cid()),
        }
    }
    Ok(())
}
