//! # Causeway Testkit
//!
//! Testing utilities for Causeway.
//!
//! ## Overview
//!
//! - **Fixtures**: Keypairs bound to a document, with helpers for building
//!   signed changes and delegations
//! - **Generators**: Proptest strategies for valid change DAGs and for
//!   delivery orders over them
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use causeway_testkit::generators::dag_with_shuffle;
//!
//! proptest! {
//!     #[test]
//!     fn delivery_order_is_irrelevant((dag, shuffled) in dag_with_shuffle(12, 3)) {
//!         // ingest both, compare timelines
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use causeway_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new();
//! let root = fixture.root(1, b"initial data");
//! let next = fixture.change(2, &[root.cid()], b"more");
//! assert_eq!(next.deps, vec![root.cid()]);
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{doc_iri, load_changes, multi_party_fixtures, summaries, TestFixture};
pub use generators::{
    build_dag, causal_order, change_dag, dag_with_causal_order, dag_with_shuffle,
};
