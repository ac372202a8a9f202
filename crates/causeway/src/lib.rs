//! # Causeway
//!
//! The unified API for Causeway: content-addressed, signed, causally ordered
//! entity histories that converge across peers.
//!
//! ## Overview
//!
//! - **Blobs**: Every piece of data is an immutable blob named by its CID
//! - **Changes**: Signed mutations of one entity, pointing at the changes
//!   they build on
//! - **Timelines**: The resolved view of an entity: public and trusted
//!   versions, owner, roots, per-author heads
//! - **Projections**: Deterministic replay of a version into state
//!
//! ## Key Concepts
//!
//! - **Version**: A set of head CIDs. The empty version is valid.
//! - **Delegation**: An account authorizing a device key to sign for it.
//! - **Trust**: A local flag on accounts. Trusted heads are what the node
//!   shows by default.
//! - **Orphan**: A blob that arrived before its dependencies.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use causeway::{Node, NodeConfig, Writer, VersionPolicy};
//! use causeway::core::{Iri, Keypair};
//! use causeway::resolve::{FoldFn, ReplayEvent};
//! use causeway::store::SqliteStore;
//!
//! async fn example() -> causeway::Result<()> {
//!     let store = SqliteStore::open("causeway.db")?;
//!     let node = Node::new(store, NodeConfig::default());
//!
//!     let writer = Writer::new(Keypair::generate());
//!     let doc = Iri::parse("hm://d/notes")?;
//!     node.create_change(&writer, &doc, &b"hello"[..], None).await?;
//!
//!     let count = FoldFn::new(|n: usize, _: &ReplayEvent<'_>| Ok(n + 1));
//!     let projection = node
//!         .materialize_latest(&doc, VersionPolicy::Public, &count)
//!         .await?;
//!     assert_eq!(projection.state, 1);
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `causeway::core` - Primitives (Cid, Change, Version, ...)
//! - `causeway::identity` - Delegation chains
//! - `causeway::store` - Storage abstraction, SQLite and memory backends
//! - `causeway::resolve` - Timelines and projection

pub mod config;
pub mod error;
pub mod node;
mod orphans;

pub use causeway_core as core;
pub use causeway_identity as identity;
pub use causeway_resolve as resolve;
pub use causeway_store as store;

pub use config::{NodeConfig, OrphanPolicy};
pub use error::{ErrorKind, NodeError, Result};
pub use node::{IngestResult, Node, VersionPolicy, Writer};

pub use causeway_core::{
    Blob, Change, ChangeBuilder, ChangeSummary, Cid, Codec, HlcTimestamp, Iri, KeyDelegation,
    Keypair, PublicKey, Version,
};
pub use causeway_resolve::{Applier, Projection, Timeline};
pub use causeway_store::DeletedResource;
