//! Store trait: the abstract interface for blob and index persistence.
//!
//! This trait allows the node to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use bytes::Bytes;
use causeway_core::{
    decode_blob, Blob, Change, ChangeSummary, Cid, DecodedBlob, HlcTimestamp, Iri, KeyDelegation,
    PublicKey, Resource, Version,
};
use causeway_identity::DelegationSource;

use crate::error::{Result, StoreError};

/// Link type of a change's dependency edges.
pub const DEP_LINK: &str = "change/dep";

/// Result of inserting a blob or indexing a typed blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertResult {
    /// The blob was new and is now stored (and indexed, if typed).
    Inserted,
    /// The blob was already present (idempotent - not an error).
    AlreadyExists,
    /// Some dependencies are not indexed yet. Nothing was written.
    MissingDependencies(Vec<Cid>),
    /// A dependency exists but cannot be a parent of this change. Nothing
    /// was written.
    InvalidDependency { dep: Cid, reason: String },
    /// The change targets a deleted resource. Nothing was written.
    Tombstoned,
}

/// A named version pointer:
/// `(resource, namespace, account, signer) -> version`.
///
/// Keyed like the writer lock, so a device key writing for several
/// accounts keeps one pointer per account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedVersion {
    pub resource: Iri,
    pub namespace: String,
    pub account: PublicKey,
    pub signer: PublicKey,
    pub version: Version,
}

/// Tombstone left behind by deleting a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedResource {
    pub iri: Iri,
    pub reason: String,
    /// Free-form context kept with the tombstone, e.g. the entity's title.
    pub meta: Option<String>,
    pub delete_time: HlcTimestamp,
}

/// The Store trait: async interface for the blob store and its indexes.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, `spawn_blocking` is used internally.
///
/// # Design Notes
///
/// - **Idempotent inserts**: Inserting the same blob twice returns `AlreadyExists`.
/// - **Atomic indexing**: A change's blob, structural row, resource, keys,
///   dependency edges and optional named version are written in one
///   transaction or not at all.
/// - **Referential integrity**: A change is indexed only when every
///   dependency is an indexed change of the same resource with a smaller
///   timestamp.
/// - **Tombstones**: Changes of a deleted resource are refused until the
///   resource is undeleted.
/// - **Heads are derived**: Nothing caches heads; they come from the edge
///   table on every read.
#[async_trait]
pub trait Store: DelegationSource + Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Blob Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Store a blob without indexing it.
    async fn put_blob(&self, blob: &Blob) -> Result<InsertResult>;

    /// Get a blob's bytes by CID.
    async fn get_blob(&self, cid: &Cid) -> Result<Option<Bytes>>;

    /// Check if a blob exists.
    async fn has_blob(&self, cid: &Cid) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Structural Index
    // ─────────────────────────────────────────────────────────────────────────

    /// Store and index a change, optionally advancing a named version in
    /// the same transaction.
    ///
    /// The caller has already verified the signature and signer authority.
    async fn insert_change(
        &self,
        blob: &Blob,
        change: &Change,
        named: Option<&NamedVersion>,
    ) -> Result<InsertResult>;

    /// Store and index a key delegation. Ensures the issuer's account
    /// resource exists.
    async fn insert_delegation(&self, blob: &Blob, delegation: &KeyDelegation)
        -> Result<InsertResult>;

    /// Get the indexed summary of a change.
    async fn get_change(&self, cid: &Cid) -> Result<Option<ChangeSummary>>;

    /// All changes of a resource, ordered by timestamp.
    async fn changes_for_resource(&self, iri: &Iri) -> Result<Vec<ChangeSummary>>;

    /// All changes by an author across resources, ordered by timestamp.
    async fn changes_by_author(&self, author: &PublicKey) -> Result<Vec<ChangeSummary>>;

    /// Changes with `from <= ts < to`, ordered by timestamp.
    async fn changes_in_range(
        &self,
        from: HlcTimestamp,
        to: HlcTimestamp,
    ) -> Result<Vec<ChangeSummary>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Resource Operations
    // ─────────────────────────────────────────────────────────────────────────

    async fn get_resource(&self, iri: &Iri) -> Result<Option<Resource>>;

    /// IRIs starting with `prefix`, sorted.
    async fn list_resources(&self, prefix: &str) -> Result<Vec<Iri>>;

    /// Tombstone a resource and delete its change blobs, edges and named
    /// versions. The tombstone is written even if nothing was indexed yet.
    /// Returns whether the resource existed.
    async fn delete_resource(&self, tombstone: &DeletedResource) -> Result<bool>;

    /// Drop the tombstone so the resource's changes can be indexed again.
    /// Returns whether there was one.
    async fn undelete_resource(&self, iri: &Iri) -> Result<bool>;

    async fn is_deleted(&self, iri: &Iri) -> Result<bool>;

    /// Tombstones, sorted by IRI.
    async fn list_deleted_resources(&self) -> Result<Vec<DeletedResource>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Trust Registry
    // ─────────────────────────────────────────────────────────────────────────

    /// Set or clear the trusted flag. Returns whether anything changed.
    async fn set_trust(&self, account: &PublicKey, trusted: bool) -> Result<bool>;

    async fn is_trusted(&self, account: &PublicKey) -> Result<bool>;

    async fn list_trusted(&self) -> Result<Vec<PublicKey>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Named Versions
    // ─────────────────────────────────────────────────────────────────────────

    async fn get_named_version(
        &self,
        resource: &Iri,
        namespace: &str,
        account: &PublicKey,
        signer: &PublicKey,
    ) -> Result<Option<Version>>;

    /// Point a named version somewhere. Every CID must be an indexed change
    /// of the resource.
    async fn set_named_version(&self, named: &NamedVersion) -> Result<()>;

    async fn list_named_versions(&self, resource: &Iri) -> Result<Vec<NamedVersion>>;
}

/// Extension trait for decoding stored typed blobs.
#[async_trait]
pub trait StoreExt: Store {
    /// Load and decode a stored change.
    async fn load_change(&self, cid: &Cid) -> Result<Option<Change>> {
        let Some(data) = self.get_blob(cid).await? else {
            return Ok(None);
        };
        match decode_blob(&Blob::with_cid(*cid, data)?)? {
            DecodedBlob::Change(change) => Ok(Some(change)),
            _ => Err(StoreError::InvalidData(format!("{cid} is not a change"))),
        }
    }

    /// Load and decode a stored key delegation.
    async fn load_delegation(&self, cid: &Cid) -> Result<Option<KeyDelegation>> {
        let Some(data) = self.get_blob(cid).await? else {
            return Ok(None);
        };
        match decode_blob(&Blob::with_cid(*cid, data)?)? {
            DecodedBlob::KeyDelegation(delegation) => Ok(Some(delegation)),
            _ => Err(StoreError::InvalidData(format!("{cid} is not a key delegation"))),
        }
    }
}

impl<S: Store + ?Sized> StoreExt for S {}
