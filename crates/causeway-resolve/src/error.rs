//! Error types for the resolve module.

use causeway_core::Cid;
use causeway_store::StoreError;
use thiserror::Error;

/// Boxed error returned by an [`Applier`](crate::Applier).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while resolving or replaying a change graph.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Unknown resource or head.
    #[error("not found: {0}")]
    NotFound(String),

    /// A change in the closure names a dependency that is not present.
    #[error("change {change} depends on missing {missing}")]
    ReferentialGap { change: Cid, missing: Cid },

    /// The applier rejected a change.
    #[error("applying {cid} failed: {source}")]
    Apply {
        cid: Cid,
        #[source]
        source: BoxError,
    },

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for resolve operations.
pub type Result<T> = std::result::Result<T, ResolveError>;
