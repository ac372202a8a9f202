//! # Causeway Store
//!
//! Persistence for Causeway: a content-addressed blob store with a
//! structural index over the typed blobs in it.
//!
//! ## Overview
//!
//! The [`Store`] trait keeps blobs, indexes changes and key delegations,
//! records dependency edges, tracks resources and their owners, holds the
//! trusted-account registry and the named version pointers. The primary
//! implementation is [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use causeway_store::{SqliteStore, Store};
//! use causeway_core::{ChangeBuilder, HlcTimestamp, Iri, Keypair};
//!
//! async fn example() -> causeway_store::Result<()> {
//!     let store = SqliteStore::open("causeway.db")?;
//!
//!     let kp = Keypair::generate();
//!     let change = ChangeBuilder::new(kp.public_key(), Iri::parse("hm://d/notes")?)
//!         .hlc(HlcTimestamp::new(1, 0))
//!         .sign(&kp);
//!     store.insert_change(&change.to_blob(), &change, None).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent inserts**: Inserting the same blob twice returns `AlreadyExists`
//! - **Dependencies first**: A change is indexed only after its parents
//! - **Cascading deletes**: Deleting a resource removes its change blobs,
//!   edges and named versions and leaves a tombstone that refuses them on
//!   re-ingest; delegations survive

mod index;

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{DeletedResource, InsertResult, NamedVersion, Store, StoreExt, DEP_LINK};
