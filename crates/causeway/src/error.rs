//! Error types for the Node.

use causeway_core::{Cid, CoreError, Iri, ValidationError};
use causeway_identity::IdentityError;
use causeway_resolve::ResolveError;
use causeway_store::StoreError;
use thiserror::Error;

/// Coarse error classes surfaced to the sync and API layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown CID, entity or resource.
    NotFound,
    /// Malformed input: bad IRI, CID, blob or dependency.
    InvalidArgument,
    /// A signature or signer authority check failed. Never indexed.
    SignatureInvalid,
    /// Something this blob needs is missing. Retry after fetching it.
    ReferentialGap,
    /// Storage failure.
    Storage,
}

/// Errors that can occur during Node operations.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("decode error: {0}")]
    Core(#[from] CoreError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Dependencies of a change are not indexed yet.
    #[error("change {cid} is missing {} dependencies", .missing.len())]
    MissingDependencies { cid: Cid, missing: Vec<Cid> },

    /// The delegation proof named by a change is not in the store.
    #[error("change {cid} names missing delegation {delegation}")]
    MissingDelegation { cid: Cid, delegation: Cid },

    #[error("change {cid} has invalid dependency {dep}: {reason}")]
    InvalidDependency { cid: Cid, dep: Cid, reason: String },

    /// The entity was deleted locally; its changes are refused.
    #[error("entity {0} is deleted")]
    EntityDeleted(Iri),

    /// The requested head failed deferred verification or builds on a
    /// change that did.
    #[error("{cid} of {resource} is quarantined")]
    Quarantined { resource: Iri, cid: Cid },
}

impl NodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NodeError::Core(CoreError::InvalidSignature | CoreError::InvalidPublicKey) => {
                ErrorKind::SignatureInvalid
            }
            NodeError::Core(_) => ErrorKind::InvalidArgument,
            NodeError::Validation(ValidationError::SignatureFailed) => ErrorKind::SignatureInvalid,
            NodeError::Validation(_) => ErrorKind::InvalidArgument,
            NodeError::Identity(IdentityError::Source(_)) => ErrorKind::Storage,
            NodeError::Identity(_) => ErrorKind::SignatureInvalid,
            NodeError::Store(e) => store_kind(e),
            NodeError::Resolve(ResolveError::NotFound(_)) => ErrorKind::NotFound,
            NodeError::Resolve(ResolveError::ReferentialGap { .. }) => ErrorKind::ReferentialGap,
            NodeError::Resolve(ResolveError::Apply { .. }) => ErrorKind::InvalidArgument,
            NodeError::Resolve(ResolveError::Store(e)) => store_kind(e),
            NodeError::Config(_) => ErrorKind::InvalidArgument,
            NodeError::NotFound(_) => ErrorKind::NotFound,
            NodeError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            NodeError::MissingDependencies { .. } | NodeError::MissingDelegation { .. } => {
                ErrorKind::ReferentialGap
            }
            NodeError::InvalidDependency { .. } => ErrorKind::InvalidArgument,
            NodeError::EntityDeleted(_) => ErrorKind::NotFound,
            NodeError::Quarantined { .. } => ErrorKind::SignatureInvalid,
        }
    }

    /// Whether retrying after fetching more blobs could succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::ReferentialGap
    }
}

fn store_kind(e: &StoreError) -> ErrorKind {
    match e {
        StoreError::NotFound(_) => ErrorKind::NotFound,
        StoreError::InvalidData(_) => ErrorKind::InvalidArgument,
        _ => ErrorKind::Storage,
    }
}

/// Result type for Node operations.
pub type Result<T> = std::result::Result<T, NodeError>;
