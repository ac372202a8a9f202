//! The Node: unified API over the blob store, index, resolver and projector.
//!
//! Remote blobs come in through [`Node::ingest`] and take no lock. Local
//! writes go through [`Node::create_change`], serialized per writer.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use bytes::Bytes;
use causeway_core::{
    decode_blob, validate_change, validate_change_structure, validate_delegation, Blob, Change,
    ChangeBuilder, ChangeSummary, Cid, Codec, DecodedBlob, HlcTimestamp, HybridClock, Iri,
    KeyDelegation, Keypair, PublicKey, Version,
};
use causeway_identity::resolve_authority;
use causeway_resolve::{
    materialize, resolve_timeline, resolve_timeline_excluding, Applier, Projection, Timeline,
};
use causeway_store::{DeletedResource, InsertResult, NamedVersion, Store, StoreExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{NodeConfig, OrphanPolicy};
use crate::error::{ErrorKind, NodeError, Result};
use crate::orphans::OrphanBuffer;

/// Result of ingesting a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestResult {
    /// A typed blob was stored and indexed.
    Indexed(Cid),
    /// An opaque blob was stored.
    Stored(Cid),
    /// Already present (idempotent).
    Duplicate(Cid),
    /// Held back until `missing` arrives.
    Buffered { cid: Cid, missing: Vec<Cid> },
}

impl IngestResult {
    pub fn cid(&self) -> Cid {
        match self {
            IngestResult::Indexed(cid)
            | IngestResult::Stored(cid)
            | IngestResult::Duplicate(cid)
            | IngestResult::Buffered { cid, .. } => *cid,
        }
    }
}

/// Which version [`Node::materialize_latest`] replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionPolicy {
    /// Every head.
    Public,
    /// Heads reached by walking back to trusted authors.
    Trusted,
}

/// A local writer: the account changes are attributed to and the key that
/// signs them.
#[derive(Debug, Clone)]
pub struct Writer {
    pub account: PublicKey,
    pub signer: Keypair,
    /// Delegation proving `signer` may act for `account`.
    pub delegation: Option<Cid>,
}

impl Writer {
    /// A writer signing for its own account.
    pub fn new(keypair: Keypair) -> Self {
        Self {
            account: keypair.public_key(),
            signer: keypair,
            delegation: None,
        }
    }

    /// A device key writing for `account` under `delegation`.
    pub fn delegated(account: PublicKey, signer: Keypair, delegation: Cid) -> Self {
        Self {
            account,
            signer,
            delegation: Some(delegation),
        }
    }
}

/// The main Node struct.
///
/// Provides a unified API for:
/// - Ingesting blobs from peers
/// - Creating local changes
/// - Resolving and materializing entities
/// - Managing trust and key delegations
pub struct Node<S: Store> {
    store: Arc<S>,
    config: NodeConfig,
    clock: HybridClock,
    /// One lock per (account, signer).
    writers: Mutex<HashMap<(PublicKey, PublicKey), Arc<Mutex<()>>>>,
    orphans: Mutex<OrphanBuffer>,
}

impl<S: Store> Node<S> {
    pub fn new(store: S, config: NodeConfig) -> Self {
        Self::with_clock(store, config, HybridClock::new())
    }

    /// A node with an explicit clock.
    pub fn with_clock(store: S, config: NodeConfig, clock: HybridClock) -> Self {
        let orphans = OrphanBuffer::new(config.max_orphans);
        Self {
            store: Arc::new(store),
            config,
            clock,
            writers: Mutex::new(HashMap::new()),
            orphans: Mutex::new(orphans),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn clock(&self) -> &HybridClock {
        &self.clock
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Blob Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Store a blob and index it if typed. Idempotent.
    pub async fn put_blob(&self, data: impl Into<Bytes>, codec: Codec) -> Result<Cid> {
        Ok(self.ingest(data, codec).await?.cid())
    }

    /// Ingest a blob from any source.
    pub async fn ingest(&self, data: impl Into<Bytes>, codec: Codec) -> Result<IngestResult> {
        self.ingest_blob(Blob::new(codec, data)).await
    }

    /// Ingest a blob whose CID has already been checked.
    pub async fn ingest_blob(&self, blob: Blob) -> Result<IngestResult> {
        let result = self.ingest_one(&blob).await?;
        self.settle(&result).await?;
        Ok(result)
    }

    pub async fn get_blob(&self, cid: &Cid) -> Result<Bytes> {
        self.store
            .get_blob(cid)
            .await?
            .ok_or_else(|| NodeError::NotFound(cid.to_string()))
    }

    pub async fn has_blob(&self, cid: &Cid) -> Result<bool> {
        Ok(self.store.has_blob(cid).await?)
    }

    /// Number of blobs waiting for dependencies.
    pub async fn buffered_orphans(&self) -> usize {
        self.orphans.lock().await.len()
    }

    async fn ingest_one(&self, blob: &Blob) -> Result<IngestResult> {
        let cid = *blob.cid();
        match decode_blob(blob)? {
            DecodedBlob::Opaque => match self.store.put_blob(blob).await? {
                InsertResult::Inserted => Ok(IngestResult::Stored(cid)),
                _ => Ok(IngestResult::Duplicate(cid)),
            },
            DecodedBlob::KeyDelegation(delegation) => {
                validate_delegation(&delegation)?;
                match self.store.insert_delegation(blob, &delegation).await? {
                    InsertResult::Inserted => {
                        info!(cid = %cid, issuer = %delegation.issuer, delegate = %delegation.delegate, "registered delegation");
                        Ok(IngestResult::Indexed(cid))
                    }
                    _ => Ok(IngestResult::Duplicate(cid)),
                }
            }
            DecodedBlob::Change(change) => self.ingest_change(blob, &change).await,
        }
    }

    async fn ingest_change(&self, blob: &Blob, change: &Change) -> Result<IngestResult> {
        let cid = *blob.cid();
        if self.store.get_change(&cid).await?.is_some() {
            return Ok(IngestResult::Duplicate(cid));
        }

        match self.verify_change(&cid, change).await {
            Err(NodeError::MissingDelegation { delegation, .. })
                if self.config.orphan_policy == OrphanPolicy::Buffer =>
            {
                return Ok(self.buffer(blob, vec![delegation]).await);
            }
            other => other?,
        }

        match self.store.insert_change(blob, change, None).await? {
            InsertResult::Inserted => {
                debug!(cid = %cid, resource = %change.resource, author = %change.author, "ingested change");
                Ok(IngestResult::Indexed(cid))
            }
            InsertResult::AlreadyExists => Ok(IngestResult::Duplicate(cid)),
            InsertResult::MissingDependencies(missing) => match self.config.orphan_policy {
                OrphanPolicy::Buffer => Ok(self.buffer(blob, missing).await),
                OrphanPolicy::Reject => Err(NodeError::MissingDependencies { cid, missing }),
            },
            InsertResult::InvalidDependency { dep, reason } => {
                Err(NodeError::InvalidDependency { cid, dep, reason })
            }
            InsertResult::Tombstoned => Err(NodeError::EntityDeleted(change.resource.clone())),
        }
    }

    async fn buffer(&self, blob: &Blob, missing: Vec<Cid>) -> IngestResult {
        let cid = *blob.cid();
        let evicted = self
            .orphans
            .lock()
            .await
            .insert(blob.clone(), missing.iter().copied());
        if let Some(evicted) = evicted {
            warn!(cid = %evicted, "orphan buffer full, evicted oldest");
        }
        debug!(cid = %cid, missing = missing.len(), "buffered orphan");
        IngestResult::Buffered { cid, missing }
    }

    /// Re-ingest orphans unblocked by `first`, and anything they unblock.
    async fn settle(&self, first: &IngestResult) -> Result<()> {
        let mut queue = VecDeque::new();
        let mut seen = HashSet::new();
        self.follow_up(first, &mut queue).await?;

        while let Some(arrived) = queue.pop_front() {
            if !seen.insert(arrived) {
                continue;
            }
            let ready = self.orphans.lock().await.release(&arrived);
            for blob in ready {
                match self.ingest_one(&blob).await {
                    Ok(result) => self.follow_up(&result, &mut queue).await?,
                    Err(e) => warn!(cid = %blob.cid(), error = %e, "dropped orphan"),
                }
            }
        }
        Ok(())
    }

    async fn follow_up(&self, result: &IngestResult, queue: &mut VecDeque<Cid>) -> Result<()> {
        match result {
            IngestResult::Indexed(cid) => queue.push_back(*cid),
            // A dependency may have landed while this one was being buffered.
            IngestResult::Buffered { missing, .. } => {
                for dep in missing {
                    if self.store.has_blob(dep).await? {
                        queue.push_back(*dep);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Verification
    // ─────────────────────────────────────────────────────────────────────────

    /// Ingest-time checks. With `verify_signatures` off only the structure
    /// is checked here; the rest happens whenever the entity is resolved.
    async fn verify_change(&self, cid: &Cid, change: &Change) -> Result<()> {
        if !self.config.verify_signatures {
            validate_change_structure(change)?;
            return Ok(());
        }
        self.verify_fully(cid, change).await
    }

    async fn verify_fully(&self, cid: &Cid, change: &Change) -> Result<()> {
        validate_change(change)?;
        self.check_authority(cid, change).await
    }

    /// The signer must be the author or reachable from it by delegation.
    async fn check_authority(&self, cid: &Cid, change: &Change) -> Result<()> {
        if change.is_self_signed() {
            return Ok(());
        }
        if let Some(delegation) = change.delegation {
            if !self.store.has_blob(&delegation).await? {
                return Err(NodeError::MissingDelegation {
                    cid: *cid,
                    delegation,
                });
            }
        }
        resolve_authority(
            self.store.as_ref(),
            &change.author,
            &change.signer,
            self.config.max_delegation_depth,
        )
        .await?;
        Ok(())
    }

    /// Re-verify every change of `resource` and resolve its timeline with
    /// failures and their descendants quarantined.
    pub async fn verify_entity(&self, resource: &Iri) -> Result<Timeline> {
        let mut bad = BTreeSet::new();
        for summary in self.store.changes_for_resource(resource).await? {
            let change = self
                .store
                .load_change(&summary.id)
                .await?
                .ok_or_else(|| NodeError::NotFound(summary.id.to_string()))?;
            match self.verify_fully(&summary.id, &change).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::Storage => return Err(e),
                Err(e) => {
                    warn!(cid = %summary.id, resource = %resource, error = %e, "change failed re-verification");
                    bad.insert(summary.id);
                }
            }
        }
        Ok(resolve_timeline_excluding(self.store.as_ref(), resource, &bad).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Local Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a change on top of the writer's named version, or the
    /// entity's public version if the writer has none yet.
    pub async fn create_change(
        &self,
        writer: &Writer,
        resource: &Iri,
        payload: impl Into<Bytes>,
        hint: Option<&str>,
    ) -> Result<Cid> {
        let lock = self.writer_lock(writer).await;
        let _guard = lock.lock().await;

        let named = self
            .store
            .get_named_version(
                resource,
                &self.config.default_namespace,
                &writer.account,
                &writer.signer.public_key(),
            )
            .await?;
        let deps = match named {
            Some(version) => version,
            None => self.public_version(resource).await?,
        };
        self.commit_change(writer, resource, deps, payload.into(), hint)
            .await
    }

    /// Create a change with explicit dependencies.
    pub async fn create_change_with_deps(
        &self,
        writer: &Writer,
        resource: &Iri,
        deps: Version,
        payload: impl Into<Bytes>,
        hint: Option<&str>,
    ) -> Result<Cid> {
        let lock = self.writer_lock(writer).await;
        let _guard = lock.lock().await;
        self.commit_change(writer, resource, deps, payload.into(), hint)
            .await
    }

    async fn writer_lock(&self, writer: &Writer) -> Arc<Mutex<()>> {
        let key = (writer.account, writer.signer.public_key());
        self.writers.lock().await.entry(key).or_default().clone()
    }

    async fn public_version(&self, resource: &Iri) -> Result<Version> {
        if self.store.get_resource(resource).await?.is_none() {
            return Ok(Version::empty());
        }
        Ok(self.get_entity_timeline(resource).await?.public_version)
    }

    async fn commit_change(
        &self,
        writer: &Writer,
        resource: &Iri,
        deps: Version,
        payload: Bytes,
        hint: Option<&str>,
    ) -> Result<Cid> {
        let mut latest = HlcTimestamp::ZERO;
        for dep in deps.iter() {
            let summary = self
                .store
                .get_change(dep)
                .await?
                .ok_or_else(|| NodeError::NotFound(dep.to_string()))?;
            if &summary.resource != resource {
                return Err(NodeError::InvalidArgument(format!(
                    "{dep} is not a change of {resource}"
                )));
            }
            latest = latest.max(summary.create_time);
        }

        let mut builder = ChangeBuilder::new(writer.account, resource.clone())
            .hlc(self.clock.update(latest))
            .deps(deps.iter().copied())
            .payload(payload);
        if let Some(hint) = hint {
            builder = builder.hint(hint);
        }
        if let Some(delegation) = writer.delegation {
            builder = builder.delegation(delegation);
        }
        let change = builder.sign(&writer.signer);
        let blob = change.to_blob();
        let cid = *blob.cid();

        // Local writes are checked in full whatever the ingest setting.
        self.verify_fully(&cid, &change).await?;

        let named = NamedVersion {
            resource: resource.clone(),
            namespace: self.config.default_namespace.clone(),
            account: writer.account,
            signer: writer.signer.public_key(),
            version: Version::new([cid]),
        };
        match self.store.insert_change(&blob, &change, Some(&named)).await? {
            InsertResult::Inserted | InsertResult::AlreadyExists => {}
            InsertResult::MissingDependencies(missing) => {
                return Err(NodeError::MissingDependencies { cid, missing })
            }
            InsertResult::InvalidDependency { dep, reason } => {
                return Err(NodeError::InvalidDependency { cid, dep, reason })
            }
            InsertResult::Tombstoned => return Err(NodeError::EntityDeleted(resource.clone())),
        }

        info!(cid = %cid, resource = %resource, author = %writer.account, hlc = %change.hlc, "committed local change");
        self.settle(&IngestResult::Indexed(cid)).await?;
        Ok(cid)
    }

    /// The version `signer` last produced for `resource` in `namespace`
    /// while writing for `account`.
    pub async fn named_version(
        &self,
        resource: &Iri,
        namespace: &str,
        account: &PublicKey,
        signer: &PublicKey,
    ) -> Result<Option<Version>> {
        Ok(self
            .store
            .get_named_version(resource, namespace, account, signer)
            .await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Query Operations
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn get_change(&self, cid: &Cid) -> Result<ChangeSummary> {
        self.store
            .get_change(cid)
            .await?
            .ok_or_else(|| NodeError::NotFound(cid.to_string()))
    }

    /// Load and decode a full change, payload included.
    pub async fn load_change(&self, cid: &Cid) -> Result<Change> {
        self.store
            .load_change(cid)
            .await?
            .ok_or_else(|| NodeError::NotFound(cid.to_string()))
    }

    /// Resolve the entity. With `verify_signatures` off this re-verifies
    /// every change, as [`Node::verify_entity`] does.
    pub async fn get_entity_timeline(&self, resource: &Iri) -> Result<Timeline> {
        if !self.config.verify_signatures {
            return self.verify_entity(resource).await;
        }
        Ok(resolve_timeline(self.store.as_ref(), resource).await?)
    }

    /// Replay the closure of `version` through `applier`.
    ///
    /// With `verify_signatures` off, a head that fails re-verification or
    /// descends from one is refused.
    pub async fn materialize<A: Applier>(
        &self,
        resource: &Iri,
        version: &Version,
        applier: &A,
    ) -> Result<Projection<A::State>> {
        if !self.config.verify_signatures {
            let timeline = self.verify_entity(resource).await?;
            if let Some(head) = version.iter().find(|c| timeline.quarantined.contains(c)) {
                return Err(NodeError::Quarantined {
                    resource: resource.clone(),
                    cid: *head,
                });
            }
        }
        Ok(materialize(self.store.as_ref(), resource, version, applier).await?)
    }

    /// Resolve the entity and replay its latest version under `policy`.
    pub async fn materialize_latest<A: Applier>(
        &self,
        resource: &Iri,
        policy: VersionPolicy,
        applier: &A,
    ) -> Result<Projection<A::State>> {
        let timeline = self.get_entity_timeline(resource).await?;
        let version = match policy {
            VersionPolicy::Public => timeline.public_version,
            VersionPolicy::Trusted => timeline.trusted_version,
        };
        // Already re-verified above when verification is deferred.
        Ok(materialize(self.store.as_ref(), resource, &version, applier).await?)
    }

    pub async fn list_entities(&self, prefix: &str) -> Result<Vec<Iri>> {
        Ok(self.store.list_resources(prefix).await?)
    }

    /// Delete an entity with its changes and named versions, and refuse
    /// its changes until [`Node::undelete_entity`]. Returns whether anything
    /// was stored for it.
    pub async fn delete_entity(
        &self,
        resource: &Iri,
        reason: &str,
        meta: Option<&str>,
    ) -> Result<bool> {
        let tombstone = DeletedResource {
            iri: resource.clone(),
            reason: reason.to_owned(),
            meta: meta.map(str::to_owned),
            delete_time: self.clock.now(),
        };
        let existed = self.store.delete_resource(&tombstone).await?;
        info!(resource = %resource, reason, existed, "deleted entity");
        Ok(existed)
    }

    /// Lift the tombstone. Deleted changes come back only by re-ingesting
    /// them.
    pub async fn undelete_entity(&self, resource: &Iri) -> Result<bool> {
        let restored = self.store.undelete_resource(resource).await?;
        if restored {
            info!(resource = %resource, "undeleted entity");
        }
        Ok(restored)
    }

    pub async fn list_deleted_entities(&self) -> Result<Vec<DeletedResource>> {
        Ok(self.store.list_deleted_resources().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Trust Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns whether the flag changed.
    pub async fn set_trust(&self, account: &PublicKey, trusted: bool) -> Result<bool> {
        let changed = self.store.set_trust(account, trusted).await?;
        if changed {
            info!(account = %account, trusted, "trust changed");
        }
        Ok(changed)
    }

    pub async fn is_trusted(&self, account: &PublicKey) -> Result<bool> {
        Ok(self.store.is_trusted(account).await?)
    }

    pub async fn list_trusted(&self) -> Result<Vec<PublicKey>> {
        Ok(self.store.list_trusted().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Delegation Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Verify and index a delegation issued elsewhere.
    pub async fn register_delegation(&self, delegation: &KeyDelegation) -> Result<Cid> {
        validate_delegation(delegation)?;
        Ok(self.ingest_blob(delegation.to_blob()).await?.cid())
    }

    /// Issue a delegation from `issuer` to `delegate` and index it.
    pub async fn delegate(&self, issuer: &Keypair, delegate: PublicKey) -> Result<Cid> {
        let issue_time = self.clock.now().physical_ms();
        let delegation = KeyDelegation::issue(issuer, delegate, issue_time);
        self.register_delegation(&delegation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causeway_resolve::{BoxError, FoldFn, ReplayEvent};
    use causeway_store::MemoryStore;

    fn node() -> Node<MemoryStore> {
        Node::new(MemoryStore::new(), NodeConfig::default())
    }

    fn doc() -> Iri {
        Iri::parse("hm://d/node").unwrap()
    }

    fn count() -> FoldFn<usize, impl Fn(usize, &ReplayEvent<'_>) -> std::result::Result<usize, BoxError>> {
        FoldFn::new(|n: usize, _: &ReplayEvent<'_>| Ok(n + 1))
    }

    #[tokio::test]
    async fn test_local_writes_chain_through_named_version() {
        let node = node();
        let writer = Writer::new(Keypair::from_seed(&[1; 32]));

        let first = node.create_change(&writer, &doc(), &b"one"[..], None).await.unwrap();
        let second = node.create_change(&writer, &doc(), &b"two"[..], None).await.unwrap();

        let summary = node.get_change(&second).await.unwrap();
        assert_eq!(summary.deps, vec![first]);

        let named = node
            .named_version(&doc(), "main", &writer.account, &writer.signer.public_key())
            .await
            .unwrap();
        assert_eq!(named, Some(Version::new([second])));

        let timeline = node.get_entity_timeline(&doc()).await.unwrap();
        assert_eq!(timeline.public_version, Version::new([second]));
    }

    #[tokio::test]
    async fn test_duplicate_ingest() {
        let node = node();
        let kp = Keypair::from_seed(&[1; 32]);
        let change = ChangeBuilder::new(kp.public_key(), doc())
            .hlc(HlcTimestamp::new(5, 0))
            .sign(&kp);
        let bytes = change.to_bytes();

        let first = node.ingest(bytes.clone(), Codec::DagCbor).await.unwrap();
        let second = node.ingest(bytes, Codec::DagCbor).await.unwrap();
        assert_eq!(first, IngestResult::Indexed(change.cid()));
        assert_eq!(second, IngestResult::Duplicate(change.cid()));
    }

    #[tokio::test]
    async fn test_opaque_blob_stored_not_indexed() {
        let node = node();
        let cid = node.put_blob(&b"raw bytes"[..], Codec::Raw).await.unwrap();
        assert_eq!(node.get_blob(&cid).await.unwrap().as_ref(), b"raw bytes");
        assert_eq!(node.get_change(&cid).await.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_unauthorized_signer_rejected() {
        let node = node();
        let account = Keypair::from_seed(&[1; 32]);
        let stranger = Keypair::from_seed(&[2; 32]);
        let change = ChangeBuilder::new(account.public_key(), doc())
            .hlc(HlcTimestamp::new(5, 0))
            .sign(&stranger);

        let err = node
            .ingest(change.to_bytes(), Codec::DagCbor)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SignatureInvalid);
        assert!(!node.has_blob(&change.cid()).await.unwrap());
    }

    #[tokio::test]
    async fn test_delegated_writer() {
        let node = node();
        let account = Keypair::from_seed(&[1; 32]);
        let device = Keypair::from_seed(&[2; 32]);
        let proof = node.delegate(&account, device.public_key()).await.unwrap();

        let writer = Writer::delegated(account.public_key(), device, proof);
        let cid = node.create_change(&writer, &doc(), &b"hi"[..], Some("note")).await.unwrap();

        let summary = node.get_change(&cid).await.unwrap();
        assert_eq!(summary.author, account.public_key());
        let change = node.load_change(&cid).await.unwrap();
        assert_eq!(change.hint.as_deref(), Some("note"));
    }

    #[tokio::test]
    async fn test_materialize_latest_counts_closure() {
        let node = node();
        let writer = Writer::new(Keypair::from_seed(&[1; 32]));
        for i in 0..3u8 {
            node.create_change(&writer, &doc(), vec![i], None).await.unwrap();
        }

        let projection = node
            .materialize_latest(&doc(), VersionPolicy::Public, &count())
            .await
            .unwrap();
        assert_eq!(projection.state, 3);
    }

    #[tokio::test]
    async fn test_foreign_dependency_rejected() {
        let node = node();
        let writer = Writer::new(Keypair::from_seed(&[1; 32]));
        let other = Iri::parse("hm://d/other").unwrap();
        let elsewhere = node.create_change(&writer, &other, &b"x"[..], None).await.unwrap();

        let err = node
            .create_change_with_deps(&writer, &doc(), Version::new([elsewhere]), &b"y"[..], None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
