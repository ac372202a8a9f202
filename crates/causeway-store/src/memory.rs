//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use causeway_core::{
    Blob, Change, ChangeSummary, Cid, HlcTimestamp, Iri, KeyDelegation, PublicKey, Resource,
    Version,
};
use causeway_identity::{DelegationGraph, DelegationSource};

use crate::error::{Result, StoreError};
use crate::index::{check_dependencies, earliest_root, DepInfo};
use crate::traits::{DeletedResource, InsertResult, NamedVersion, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    blobs: HashMap<Cid, Bytes>,

    /// Indexed changes.
    changes: HashMap<Cid, Change>,

    /// Indexed delegations.
    delegations: HashMap<Cid, KeyDelegation>,

    /// Issuer -> delegate edges of `delegations`, answering authority lookups.
    graph: DelegationGraph,

    resources: BTreeMap<Iri, Resource>,

    deleted: BTreeMap<Iri, DeletedResource>,

    trusted: BTreeSet<PublicKey>,

    named: BTreeMap<NamedKey, Version>,
}

/// (resource, namespace, account, signer)
type NamedKey = (Iri, String, PublicKey, PublicKey);

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Task(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Task(format!("lock poisoned: {e}")))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStoreInner {
    fn is_indexed(&self, cid: &Cid) -> bool {
        self.changes.contains_key(cid) || self.delegations.contains_key(cid)
    }

    fn dep_info(&self, cid: &Cid) -> Option<DepInfo> {
        if let Some(change) = self.changes.get(cid) {
            return Some(DepInfo {
                is_change: true,
                resource: Some(change.resource.clone()),
                ts: change.hlc,
            });
        }
        self.delegations.get(cid).map(|d| DepInfo {
            is_change: false,
            resource: None,
            ts: HlcTimestamp::new(d.issue_time, 0),
        })
    }

    fn ensure_resource(&mut self, iri: &Iri) -> &mut Resource {
        self.resources.entry(iri.clone()).or_insert_with(|| Resource {
            iri: iri.clone(),
            owner: iri.account_key(),
            create_time: None,
        })
    }

    fn refresh_ownership(&mut self, iri: &Iri) {
        let roots = self
            .changes
            .iter()
            .filter(|(_, c)| &c.resource == iri && c.is_root())
            .map(|(cid, c)| (c.hlc, *cid, c.author))
            .collect();
        let Some((ts, _, author)) = earliest_root(roots) else {
            return;
        };
        let resource = self.ensure_resource(iri);
        resource.owner = Some(iri.account_key().unwrap_or(author));
        resource.create_time = Some(ts);
    }

    fn write_named(&mut self, named: &NamedVersion) -> Result<()> {
        for cid in named.version.iter() {
            match self.changes.get(cid) {
                Some(change) if change.resource == named.resource => {}
                _ => {
                    return Err(StoreError::InvalidData(format!(
                        "{cid} is not a change of {}",
                        named.resource
                    )))
                }
            }
        }
        self.named.insert(
            (
                named.resource.clone(),
                named.namespace.clone(),
                named.account,
                named.signer,
            ),
            named.version.clone(),
        );
        Ok(())
    }

    fn summaries<'a>(&self, changes: impl Iterator<Item = (&'a Cid, &'a Change)>) -> Vec<ChangeSummary> {
        let mut out: Vec<ChangeSummary> = changes
            .map(|(cid, c)| ChangeSummary::from_change(*cid, c, self.trusted.contains(&c.author)))
            .collect();
        out.sort_by_key(|s| (s.create_time, s.id));
        out
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn put_blob(&self, blob: &Blob) -> Result<InsertResult> {
        let mut inner = self.write()?;
        if inner.blobs.contains_key(blob.cid()) {
            return Ok(InsertResult::AlreadyExists);
        }
        inner.blobs.insert(*blob.cid(), blob.data().clone());
        Ok(InsertResult::Inserted)
    }

    async fn get_blob(&self, cid: &Cid) -> Result<Option<Bytes>> {
        Ok(self.read()?.blobs.get(cid).cloned())
    }

    async fn has_blob(&self, cid: &Cid) -> Result<bool> {
        Ok(self.read()?.blobs.contains_key(cid))
    }

    async fn insert_change(
        &self,
        blob: &Blob,
        change: &Change,
        named: Option<&NamedVersion>,
    ) -> Result<InsertResult> {
        let mut inner = self.write()?;
        let cid = *blob.cid();

        if inner.is_indexed(&cid) {
            return Ok(InsertResult::AlreadyExists);
        }
        if inner.deleted.contains_key(&change.resource) {
            return Ok(InsertResult::Tombstoned);
        }
        if let Some(rejection) = check_dependencies(change, |dep| Ok(inner.dep_info(dep)))? {
            return Ok(rejection);
        }
        if let Some(named) = named {
            if named.resource != change.resource {
                return Err(StoreError::InvalidData(format!(
                    "named version for {} cannot advance with a change of {}",
                    named.resource, change.resource
                )));
            }
            // Validate against the post-insert state before mutating anything.
            for target in named.version.iter() {
                let ok = *target == cid
                    || inner
                        .changes
                        .get(target)
                        .is_some_and(|c| c.resource == change.resource);
                if !ok {
                    return Err(StoreError::InvalidData(format!(
                        "{target} is not a change of {}",
                        named.resource
                    )));
                }
            }
        }

        inner.ensure_resource(&change.resource);
        inner.blobs.insert(cid, blob.data().clone());
        inner.changes.insert(cid, change.clone());
        if change.is_root() {
            inner.refresh_ownership(&change.resource);
        }
        if let Some(named) = named {
            inner.write_named(named)?;
        }

        debug!(cid = %cid, resource = %change.resource, "indexed change");
        Ok(InsertResult::Inserted)
    }

    async fn insert_delegation(
        &self,
        blob: &Blob,
        delegation: &KeyDelegation,
    ) -> Result<InsertResult> {
        let mut inner = self.write()?;
        let cid = *blob.cid();
        if inner.is_indexed(&cid) {
            return Ok(InsertResult::AlreadyExists);
        }

        inner
            .graph
            .apply(delegation)
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;

        let account_iri = Iri::account(&delegation.issuer);
        if !inner.deleted.contains_key(&account_iri) {
            let account = inner.ensure_resource(&account_iri);
            if account.create_time.is_none() {
                account.create_time = Some(HlcTimestamp::new(delegation.issue_time, 0));
            }
        }
        inner.blobs.insert(cid, blob.data().clone());
        inner.delegations.insert(cid, delegation.clone());

        debug!(cid = %cid, issuer = %delegation.issuer, delegate = %delegation.delegate, "indexed delegation");
        Ok(InsertResult::Inserted)
    }

    async fn get_change(&self, cid: &Cid) -> Result<Option<ChangeSummary>> {
        let inner = self.read()?;
        Ok(inner.changes.get(cid).map(|change| {
            ChangeSummary::from_change(*cid, change, inner.trusted.contains(&change.author))
        }))
    }

    async fn changes_for_resource(&self, iri: &Iri) -> Result<Vec<ChangeSummary>> {
        let inner = self.read()?;
        Ok(inner.summaries(inner.changes.iter().filter(|(_, c)| &c.resource == iri)))
    }

    async fn changes_by_author(&self, author: &PublicKey) -> Result<Vec<ChangeSummary>> {
        let inner = self.read()?;
        Ok(inner.summaries(inner.changes.iter().filter(|(_, c)| &c.author == author)))
    }

    async fn changes_in_range(
        &self,
        from: HlcTimestamp,
        to: HlcTimestamp,
    ) -> Result<Vec<ChangeSummary>> {
        let inner = self.read()?;
        Ok(inner.summaries(
            inner
                .changes
                .iter()
                .filter(|(_, c)| c.hlc >= from && c.hlc < to),
        ))
    }

    async fn get_resource(&self, iri: &Iri) -> Result<Option<Resource>> {
        Ok(self.read()?.resources.get(iri).cloned())
    }

    async fn list_resources(&self, prefix: &str) -> Result<Vec<Iri>> {
        Ok(self
            .read()?
            .resources
            .keys()
            .filter(|iri| iri.as_str().starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete_resource(&self, tombstone: &DeletedResource) -> Result<bool> {
        let mut inner = self.write()?;
        let iri = &tombstone.iri;
        inner.deleted.insert(iri.clone(), tombstone.clone());
        if inner.resources.remove(iri).is_none() {
            return Ok(false);
        }
        let doomed: Vec<Cid> = inner
            .changes
            .iter()
            .filter(|(_, c)| &c.resource == iri)
            .map(|(cid, _)| *cid)
            .collect();
        for cid in &doomed {
            inner.changes.remove(cid);
            inner.blobs.remove(cid);
        }
        inner.named.retain(|(resource, ..), _| resource != iri);

        debug!(resource = %iri, blobs = doomed.len(), "deleted resource");
        Ok(true)
    }

    async fn undelete_resource(&self, iri: &Iri) -> Result<bool> {
        Ok(self.write()?.deleted.remove(iri).is_some())
    }

    async fn is_deleted(&self, iri: &Iri) -> Result<bool> {
        Ok(self.read()?.deleted.contains_key(iri))
    }

    async fn list_deleted_resources(&self) -> Result<Vec<DeletedResource>> {
        Ok(self.read()?.deleted.values().cloned().collect())
    }

    async fn set_trust(&self, account: &PublicKey, trusted: bool) -> Result<bool> {
        let mut inner = self.write()?;
        Ok(if trusted {
            inner.trusted.insert(*account)
        } else {
            inner.trusted.remove(account)
        })
    }

    async fn is_trusted(&self, account: &PublicKey) -> Result<bool> {
        Ok(self.read()?.trusted.contains(account))
    }

    async fn list_trusted(&self) -> Result<Vec<PublicKey>> {
        Ok(self.read()?.trusted.iter().copied().collect())
    }

    async fn get_named_version(
        &self,
        resource: &Iri,
        namespace: &str,
        account: &PublicKey,
        signer: &PublicKey,
    ) -> Result<Option<Version>> {
        let key = (resource.clone(), namespace.to_owned(), *account, *signer);
        Ok(self.read()?.named.get(&key).cloned())
    }

    async fn set_named_version(&self, named: &NamedVersion) -> Result<()> {
        let mut inner = self.write()?;
        if !inner.resources.contains_key(&named.resource) {
            return Err(StoreError::NotFound(named.resource.to_string()));
        }
        inner.write_named(named)
    }

    async fn list_named_versions(&self, resource: &Iri) -> Result<Vec<NamedVersion>> {
        Ok(self
            .read()?
            .named
            .iter()
            .filter(|((iri, ..), _)| iri == resource)
            .map(|((iri, namespace, account, signer), version)| NamedVersion {
                resource: iri.clone(),
                namespace: namespace.clone(),
                account: *account,
                signer: *signer,
                version: version.clone(),
            })
            .collect())
    }
}

#[async_trait]
impl DelegationSource for MemoryStore {
    async fn delegates_of(
        &self,
        issuer: &PublicKey,
    ) -> causeway_identity::Result<Vec<PublicKey>> {
        Ok(self.read()?.graph.delegates(issuer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causeway_core::{ChangeBuilder, Codec, Keypair};

    fn doc() -> Iri {
        Iri::parse("hm://d/notes").unwrap()
    }

    fn change(kp: &Keypair, ts: u64, deps: &[Cid]) -> Change {
        ChangeBuilder::new(kp.public_key(), doc())
            .hlc(HlcTimestamp::new(ts, 0))
            .deps(deps.iter().copied())
            .sign(kp)
    }

    #[tokio::test]
    async fn test_insert_and_scan() {
        let store = MemoryStore::new();
        let kp = Keypair::from_seed(&[1; 32]);
        let root = change(&kp, 10, &[]);
        let child = change(&kp, 20, &[root.cid()]);

        assert_eq!(
            store.insert_change(&child.to_blob(), &child, None).await.unwrap(),
            InsertResult::MissingDependencies(vec![root.cid()])
        );
        store.insert_change(&root.to_blob(), &root, None).await.unwrap();
        store.insert_change(&child.to_blob(), &child, None).await.unwrap();
        assert_eq!(
            store.insert_change(&child.to_blob(), &child, None).await.unwrap(),
            InsertResult::AlreadyExists
        );

        let ids: Vec<Cid> = store
            .changes_for_resource(&doc())
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![root.cid(), child.cid()]);

        let resource = store.get_resource(&doc()).await.unwrap().unwrap();
        assert_eq!(resource.owner, Some(kp.public_key()));
    }

    #[tokio::test]
    async fn test_opaque_blob_is_not_a_dependency() {
        let store = MemoryStore::new();
        let kp = Keypair::from_seed(&[1; 32]);
        let raw = Blob::new(Codec::Raw, &b"attachment"[..]);
        store.put_blob(&raw).await.unwrap();

        let c = change(&kp, 10, &[*raw.cid()]);
        let result = store.insert_change(&c.to_blob(), &c, None).await.unwrap();
        assert_eq!(result, InsertResult::MissingDependencies(vec![*raw.cid()]));
    }

    #[tokio::test]
    async fn test_named_version_validated_before_write() {
        let store = MemoryStore::new();
        let kp = Keypair::from_seed(&[1; 32]);
        let root = change(&kp, 10, &[]);
        let named = NamedVersion {
            resource: doc(),
            namespace: "main".into(),
            account: kp.public_key(),
            signer: kp.public_key(),
            version: Version::new([Cid::new(Codec::DagCbor, b"elsewhere")]),
        };

        assert!(store
            .insert_change(&root.to_blob(), &root, Some(&named))
            .await
            .is_err());
        assert!(!store.has_blob(&root.cid()).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_keeps_delegations() {
        let store = MemoryStore::new();
        let account = Keypair::from_seed(&[1; 32]);
        let device = Keypair::from_seed(&[2; 32]);
        let kd = KeyDelegation::issue(&account, device.public_key(), 5);
        store.insert_delegation(&kd.to_blob(), &kd).await.unwrap();

        let iri = Iri::account(&account.public_key());
        let tombstone = DeletedResource {
            iri: iri.clone(),
            reason: String::new(),
            meta: None,
            delete_time: HlcTimestamp::new(6, 0),
        };
        assert!(store.delete_resource(&tombstone).await.unwrap());
        assert!(store.has_blob(&kd.cid()).await.unwrap());
        assert_eq!(
            store.delegates_of(&account.public_key()).await.unwrap(),
            vec![device.public_key()]
        );
    }

    #[tokio::test]
    async fn test_tombstone_refuses_changes() {
        let store = MemoryStore::new();
        let kp = Keypair::from_seed(&[1; 32]);
        let root = change(&kp, 10, &[]);
        let tombstone = DeletedResource {
            iri: doc(),
            reason: "duplicate".into(),
            meta: None,
            delete_time: HlcTimestamp::new(11, 0),
        };

        assert!(!store.delete_resource(&tombstone).await.unwrap());
        assert_eq!(
            store.insert_change(&root.to_blob(), &root, None).await.unwrap(),
            InsertResult::Tombstoned
        );
        assert_eq!(store.list_deleted_resources().await.unwrap(), vec![tombstone]);

        assert!(store.undelete_resource(&doc()).await.unwrap());
        assert!(!store.is_deleted(&doc()).await.unwrap());
        assert_eq!(
            store.insert_change(&root.to_blob(), &root, None).await.unwrap(),
            InsertResult::Inserted
        );
    }

    #[tokio::test]
    async fn test_delegation_graph_backs_authority() {
        let store = MemoryStore::new();
        let account = Keypair::from_seed(&[1; 32]);
        let laptop = Keypair::from_seed(&[2; 32]);
        let phone = Keypair::from_seed(&[3; 32]);
        for delegate in [&phone, &laptop] {
            let kd = KeyDelegation::issue(&account, delegate.public_key(), 5);
            store.insert_delegation(&kd.to_blob(), &kd).await.unwrap();
        }

        let mut expected = vec![laptop.public_key(), phone.public_key()];
        expected.sort();
        assert_eq!(store.delegates_of(&account.public_key()).await.unwrap(), expected);

        let chain = causeway_identity::resolve_authority(
            &store,
            &account.public_key(),
            &phone.public_key(),
            8,
        )
        .await
        .unwrap();
        assert_eq!(chain.hops(), 1);

        let bogus = KeyDelegation::issue(&account, account.public_key(), 5);
        assert!(matches!(
            store.insert_delegation(&bogus.to_blob(), &bogus).await,
            Err(StoreError::InvalidData(_))
        ));
        assert!(!store.has_blob(&bogus.cid()).await.unwrap());
    }
}
