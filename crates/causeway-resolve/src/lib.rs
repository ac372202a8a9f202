//! # Causeway Resolve
//!
//! Turns an entity's change graph into versions and state.
//!
//! ## Overview
//!
//! - [`Timeline`] resolves the public version (all heads), the trusted
//!   version (heads reached by walking back to trusted authors), the
//!   canonical change order, roots, owner and per-author versions.
//! - [`project`] and [`materialize`] replay the dependency closure of a
//!   version through an [`Applier`], in the same canonical order, so every
//!   peer holding that closure reaches the same state and replay digest.
//!
//! Resolution is pure; the `async` helpers only load from a
//! [`Store`](causeway_store::Store).

pub mod error;
pub mod projector;
pub mod timeline;

pub use error::{BoxError, ResolveError, Result};
pub use projector::{
    load_closure, materialize, project, replay_order, Applier, FoldFn, Projection, ReplayEvent,
};
pub use timeline::{
    author_heads, public_heads, resolve_timeline, resolve_timeline_excluding, trusted_heads,
    Timeline,
};
